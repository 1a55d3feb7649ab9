//! # Font Byte Cache
//!
//! Keeps raw font files in memory so switching back to a recently used font
//! does not touch storage. The cache is bounded by a byte budget rather than an
//! entry count: font files range from a few KB to several MB, and the board has
//! little RAM to spare.
//!
//! ## Policy
//! - **Hit**: the entry becomes most recently used and its buffer is handed out
//!   without any I/O
//! - **Miss**: least recently used entries are evicted until the new file fits,
//!   then the file is read into a fresh buffer owned by the cache
//! - **Too large / allocation failure**: the file is read into a transient
//!   buffer that the font engine owns and the cache never sees
//!
//! Invariant: the sum of resident entry sizes never exceeds the budget.

use crate::font_store::FontStorage;
use crate::FontRecord;
use log::{debug, info, warn};
use lru::LruCache;
use std::io;
use std::rc::Rc;
use thiserror::Error;

/// Shared handle to a font file's bytes.
pub type FontBytes = Rc<Vec<u8>>;

/// Errors returned by [`FontCache::acquire`].
#[derive(Error, Debug)]
pub enum CacheError {
    /// The font file could not be read (missing media, corrupt card, ...)
    #[error("font storage: {0}")]
    Storage(#[from] io::Error),
}

/// Where the bytes handed to the font engine came from.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// Buffer owned by the cache
    Cached(FontBytes),
    /// Read straight from storage, not retained by the cache
    Direct(Vec<u8>),
}

impl FontSource {
    pub fn is_cached(&self) -> bool {
        matches!(self, FontSource::Cached(_))
    }

    pub fn len(&self) -> usize {
        match self {
            FontSource::Cached(bytes) => bytes.len(),
            FontSource::Direct(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into a shareable byte handle for the font engine.
    pub fn into_bytes(self) -> FontBytes {
        match self {
            FontSource::Cached(bytes) => bytes,
            FontSource::Direct(bytes) => Rc::new(bytes),
        }
    }
}

/// Byte-budgeted LRU cache of font files, keyed by font index.
pub struct FontCache<S> {
    storage: S,
    entries: LruCache<usize, FontBytes>,
    total_bytes: usize,
    budget_bytes: usize,
    max_entry_bytes: usize,
}

impl<S: FontStorage> FontCache<S> {
    /// Create an empty cache.
    ///
    /// Files larger than `max_entry_bytes` (or the budget itself) are never cached.
    pub fn new(storage: S, budget_bytes: usize, max_entry_bytes: usize) -> Self {
        Self {
            storage,
            entries: LruCache::unbounded(),
            total_bytes: 0,
            budget_bytes,
            max_entry_bytes: max_entry_bytes.min(budget_bytes),
        }
    }

    /// Get the bytes of font `index`, from memory when possible.
    pub fn acquire(&mut self, index: usize, record: &FontRecord) -> Result<FontSource, CacheError> {
        if let Some(bytes) = self.entries.get(&index) {
            debug!("Font cache hit: {} ({} bytes)", record.display_name, bytes.len());
            return Ok(FontSource::Cached(Rc::clone(bytes)));
        }

        let declared = self.storage.file_size(record)?;
        let declared = usize::try_from(declared).unwrap_or(usize::MAX);
        if declared > self.max_entry_bytes {
            info!(
                "Font {} is {} bytes, over the {} byte cache limit; loading uncached",
                record.display_name, declared, self.max_entry_bytes
            );
            return self.read_direct(record);
        }

        self.evict_for(declared);

        let mut buf = Vec::new();
        if buf.try_reserve_exact(declared).is_err() {
            warn!(
                "Could not allocate {} bytes for {}; loading uncached",
                declared, record.display_name
            );
            return self.read_direct(record);
        }
        self.storage.read_into(record, &mut buf)?;

        // The file may have changed size between the stat and the read
        if buf.len() > self.max_entry_bytes {
            warn!(
                "Font {} grew to {} bytes while loading; not caching",
                record.display_name,
                buf.len()
            );
            return Ok(FontSource::Direct(buf));
        }
        self.evict_for(buf.len());

        self.total_bytes += buf.len();
        let bytes = Rc::new(buf);
        self.entries.put(index, Rc::clone(&bytes));
        info!(
            "Font cache miss: {} cached ({} bytes, {} / {} used)",
            record.display_name,
            bytes.len(),
            self.total_bytes,
            self.budget_bytes
        );
        Ok(FontSource::Cached(bytes))
    }

    /// Drop every cached buffer.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            info!(
                "Clearing font cache ({} fonts, {} bytes)",
                self.entries.len(),
                self.total_bytes
            );
        }
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Sum of resident entry sizes.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Number of cached fonts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether font `index` is resident, without touching recency.
    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains(&index)
    }

    /// Cached font indices from most to least recently used.
    pub fn recency(&self) -> Vec<usize> {
        self.entries.iter().map(|(index, _)| *index).collect()
    }

    fn evict_for(&mut self, incoming: usize) {
        while self.total_bytes + incoming > self.budget_bytes {
            match self.entries.pop_lru() {
                Some((index, bytes)) => {
                    self.total_bytes -= bytes.len();
                    debug!("Evicted font {} ({} bytes)", index, bytes.len());
                }
                None => break,
            }
        }
    }

    fn read_direct(&mut self, record: &FontRecord) -> Result<FontSource, CacheError> {
        let mut buf = Vec::new();
        self.storage.read_into(record, &mut buf)?;
        Ok(FontSource::Direct(buf))
    }
}
