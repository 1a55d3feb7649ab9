//! Font discovery and raw file access.
//!
//! The cache only ever talks to storage through [`FontStorage`], which keeps
//! cache tests independent of the filesystem.

use crate::FontRecord;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Read access to font files.
pub trait FontStorage {
    /// Size of the font file in bytes.
    fn file_size(&mut self, record: &FontRecord) -> io::Result<u64>;

    /// Append the full contents of the font file to `buf`.
    fn read_into(&mut self, record: &FontRecord, buf: &mut Vec<u8>) -> io::Result<()>;
}

/// Fonts stored as plain files.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryStorage;

impl FontStorage for DirectoryStorage {
    fn file_size(&mut self, record: &FontRecord) -> io::Result<u64> {
        Ok(fs::metadata(&record.path)?.len())
    }

    fn read_into(&mut self, record: &FontRecord, buf: &mut Vec<u8>) -> io::Result<()> {
        File::open(&record.path)?.read_to_end(buf)?;
        Ok(())
    }
}

fn is_font_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".ttf") || lower.ends_with(".otf")
}

/// Scan a directory for font files.
///
/// Picks up `.ttf` and `.otf` in any letter case, skips macOS resource forks
/// (`._*`) and subdirectories, and sorts by file name so font indices are
/// stable between boots.
pub fn scan_fonts<P: AsRef<Path>>(dir: P) -> io::Result<Vec<FontRecord>> {
    let mut records = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("._") {
            debug!("Skipping hidden file: {}", name);
            continue;
        }
        if is_font_file(&name) {
            records.push(FontRecord::from_path(entry.path()));
        }
    }
    records.sort_by(|a, b| a.path.cmp(&b.path));
    info!(
        "Found {} fonts in {}",
        records.len(),
        dir.as_ref().display()
    );
    Ok(records)
}
