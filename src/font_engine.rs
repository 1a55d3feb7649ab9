//! # Font Engine
//!
//! Wraps the outline font stack behind the narrow surface the specimen needs:
//! load a face from bytes, look up glyphs, walk outlines, rasterize coverage
//! bitmaps, and manage per-pixel-size raster caches.
//!
//! ## Face lifecycle
//! At most one face is active. A new face is parsed and its raster caches are
//! created *before* the old face is touched; only once that succeeds are the
//! old face's raster caches torn down and the old face dropped. A failure at
//! any step leaves the previous face loaded and usable.
//!
//! The cost is a short overlap during [`FontEngine::load`]: two parsed faces
//! and two sets of (still empty) raster caches are resident at once. Font
//! bytes are not duplicated, since a cached face shares the [`FontCache`]
//! buffer, but an uncached font adds its whole file on top of the cache
//! budget until the old face is dropped.
//!
//! [`FontCache`]: crate::font_cache::FontCache
//!
//! ## Capability access
//! Callers get the active face through [`FontEngine::active_face`], and the
//! TrueType implementation exposes its parsed tables through
//! [`TrueTypeFace::ttf`]. Nothing outside this module reaches into the
//! rasterizer's internals.

use crate::font_cache::{FontBytes, FontSource};
use crate::outline::{GlyphOutline, OutlineCollector};
use crate::resolver::GlyphSource;
use kurbo::Rect;
use log::{debug, info, warn};
use lru::LruCache;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use thiserror::Error;

/// Largest pixel size a raster cache may be created for.
pub const MAX_RENDER_PIXEL_SIZE: u32 = 4096;

/// Glyphs kept per transient raster cache.
pub const TRANSIENT_RENDER_CAPACITY: usize = 12;

/// Errors from loading faces or managing raster caches.
#[derive(Error, Debug)]
pub enum FontError {
    /// The bytes are not a font the engine understands
    #[error("font parse failed: {0}")]
    Parse(String),

    /// A raster cache could not be created for this size
    #[error("render cache for {pixel_size}px (capacity {capacity}) could not be created")]
    RenderCache { pixel_size: u32, capacity: usize },

    #[error("no font loaded")]
    NotLoaded,
}

/// 8-bit coverage bitmap of one glyph, row-major, `width * height` samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RasterGlyph {
    pub width: usize,
    pub height: usize,
    pub coverage: Vec<u8>,
}

/// Everything the renderer asks of a loaded face.
pub trait FontFace: GlyphSource {
    fn units_per_em(&self) -> u16;

    /// Design-unit bounding box of a glyph; `None` for empty glyphs.
    fn glyph_bounds(&self, glyph: u16) -> Option<Rect>;

    /// Outline of a glyph in design units; `None` for empty glyphs.
    fn outline(&self, glyph: u16) -> Option<GlyphOutline>;

    /// Antialiased coverage bitmap at `pixel_size` pixels per em.
    fn rasterize(&self, glyph: u16, pixel_size: u32) -> RasterGlyph;
}

/// Turns font bytes into a face.
pub trait FaceLoader {
    type Face: FontFace;

    fn load(&self, bytes: FontBytes) -> Result<Self::Face, FontError>;
}

/// A raster cache to create when a face is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSpec {
    pub pixel_size: u32,
    pub capacity: usize,
}

/// Rasterized glyphs for one pixel size.
struct RenderCache {
    glyphs: LruCache<u16, RasterGlyph>,
}

impl RenderCache {
    fn create(spec: RenderSpec) -> Result<Self, FontError> {
        let invalid = FontError::RenderCache {
            pixel_size: spec.pixel_size,
            capacity: spec.capacity,
        };
        if spec.pixel_size == 0 || spec.pixel_size > MAX_RENDER_PIXEL_SIZE {
            return Err(invalid);
        }
        let capacity = NonZeroUsize::new(spec.capacity).ok_or(invalid)?;
        Ok(Self {
            glyphs: LruCache::new(capacity),
        })
    }
}

/// The loaded face plus its raster caches.
struct ActiveFont<F> {
    index: usize,
    face: F,
    renders: BTreeMap<u32, RenderCache>,
    planned: Vec<u32>,
}

impl<F> ActiveFont<F> {
    fn create_render(&mut self, spec: RenderSpec) -> Result<(), FontError> {
        let cache = RenderCache::create(spec)?;
        debug!(
            "Created render cache: {}px x {} glyphs",
            spec.pixel_size, spec.capacity
        );
        self.renders.insert(spec.pixel_size, cache);
        Ok(())
    }

    fn destroy_render(&mut self, pixel_size: u32) {
        if self.renders.remove(&pixel_size).is_some() {
            debug!("Destroyed render cache: {}px", pixel_size);
        }
    }

    /// Drop caches that were created on demand rather than at load time.
    fn destroy_transient_renders(&mut self) {
        let transient: Vec<u32> = self
            .renders
            .keys()
            .copied()
            .filter(|size| !self.planned.contains(size))
            .collect();
        for size in transient {
            self.destroy_render(size);
        }
    }

    /// Tear down every raster cache. Must run before the face is dropped.
    fn release_renders(&mut self) {
        let sizes: Vec<u32> = self.renders.keys().copied().collect();
        for size in sizes {
            self.destroy_render(size);
        }
    }
}

/// Owner of the single active face.
pub struct FontEngine<L: FaceLoader> {
    loader: L,
    active: Option<ActiveFont<L::Face>>,
}

impl<L: FaceLoader> FontEngine<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            active: None,
        }
    }

    /// Load font `index` from `source` and create the planned raster caches.
    ///
    /// On error the previously active face (if any) stays loaded.
    pub fn load(
        &mut self,
        index: usize,
        source: FontSource,
        plan: &[RenderSpec],
    ) -> Result<(), FontError> {
        let cached = source.is_cached();
        let face = self.loader.load(source.into_bytes())?;
        let mut staged = ActiveFont {
            index,
            face,
            renders: BTreeMap::new(),
            planned: plan.iter().map(|spec| spec.pixel_size).collect(),
        };
        for spec in plan {
            if let Err(e) = staged.create_render(*spec) {
                warn!("Font {} rejected: {}", index, e);
                staged.release_renders();
                return Err(e);
            }
        }

        self.unload();
        info!(
            "Font {} loaded ({})",
            index,
            if cached { "from cache" } else { "from storage" }
        );
        self.active = Some(staged);
        Ok(())
    }

    /// Release the active face, raster caches first.
    pub fn unload(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!("Unloading font {}", active.index);
            active.release_renders();
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    /// Index of the font currently loaded.
    pub fn active_index(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.index)
    }

    /// The active face, for glyph lookups and outline access.
    pub fn active_face(&self) -> Option<&L::Face> {
        self.active.as_ref().map(|active| &active.face)
    }

    /// Pixel sizes that currently have a raster cache.
    pub fn render_sizes(&self) -> Vec<u32> {
        self.active
            .as_ref()
            .map(|active| active.renders.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Rasterize a glyph through the cache for `pixel_size`.
    ///
    /// A size without a cache gets a transient one; any previous transient
    /// cache is destroyed first so only one on-demand size is resident.
    pub fn rasterize(&mut self, glyph: u16, pixel_size: u32) -> Result<&RasterGlyph, FontError> {
        self.rasterize_for(pixel_size, glyph, pixel_size)
    }

    /// Rasterize a glyph at `pixel_size` through the cache for `cache_size`.
    ///
    /// The specimen view fits every glyph to one target size, so the pixel
    /// size is fixed per glyph and the target-size cache can hold each glyph
    /// at whatever size it was fitted to.
    pub fn rasterize_for(
        &mut self,
        cache_size: u32,
        glyph: u16,
        pixel_size: u32,
    ) -> Result<&RasterGlyph, FontError> {
        let active = self.active.as_mut().ok_or(FontError::NotLoaded)?;
        if !active.renders.contains_key(&cache_size) {
            active.destroy_transient_renders();
            active.create_render(RenderSpec {
                pixel_size: cache_size,
                capacity: TRANSIENT_RENDER_CAPACITY,
            })?;
        }
        let ActiveFont { face, renders, .. } = active;
        let cache = renders.get_mut(&cache_size).ok_or(FontError::NotLoaded)?;
        Ok(cache
            .glyphs
            .get_or_insert(glyph, || face.rasterize(glyph, pixel_size)))
    }
}

/// A TrueType/OpenType face: `ttf-parser` for tables and outlines, `fontdue`
/// for coverage rasterization.
pub struct TrueTypeFace {
    bytes: FontBytes,
    raster: fontdue::Font,
    units_per_em: u16,
    first_char: Option<u32>,
}

impl TrueTypeFace {
    pub fn parse(bytes: FontBytes) -> Result<Self, FontError> {
        let (units_per_em, first_char) = {
            let face = ttf_parser::Face::parse(&bytes, 0)
                .map_err(|e| FontError::Parse(e.to_string()))?;
            (face.units_per_em(), first_mapped_char(&face))
        };
        let raster = fontdue::Font::from_bytes(bytes.as_slice(), fontdue::FontSettings::default())
            .map_err(|e| FontError::Parse(e.to_string()))?;
        Ok(Self {
            bytes,
            raster,
            units_per_em,
            first_char,
        })
    }

    /// Parsed view of the face's tables.
    pub fn ttf(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.bytes, 0).ok()
    }
}

/// Lowest codepoint in any Unicode cmap subtable that maps to a real glyph.
fn first_mapped_char(face: &ttf_parser::Face<'_>) -> Option<u32> {
    let cmap = face.tables().cmap?;
    let mut first: Option<u32> = None;
    for subtable in cmap.subtables {
        if !subtable.is_unicode() {
            continue;
        }
        subtable.codepoints(|codepoint| {
            let mapped = subtable
                .glyph_index(codepoint)
                .is_some_and(|glyph| glyph.0 != 0);
            if mapped && first.map_or(true, |f| codepoint < f) {
                first = Some(codepoint);
            }
        });
    }
    first
}

impl GlyphSource for TrueTypeFace {
    fn glyph_index(&self, codepoint: u32) -> u16 {
        char::from_u32(codepoint).map_or(0, |c| self.raster.lookup_glyph_index(c))
    }

    fn first_char(&self) -> Option<u32> {
        self.first_char
    }
}

impl FontFace for TrueTypeFace {
    fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    fn glyph_bounds(&self, glyph: u16) -> Option<Rect> {
        let rect = self.ttf()?.glyph_bounding_box(ttf_parser::GlyphId(glyph))?;
        Some(Rect::new(
            rect.x_min.into(),
            rect.y_min.into(),
            rect.x_max.into(),
            rect.y_max.into(),
        ))
    }

    fn outline(&self, glyph: u16) -> Option<GlyphOutline> {
        let face = self.ttf()?;
        let mut collector = OutlineCollector::new();
        face.outline_glyph(ttf_parser::GlyphId(glyph), &mut collector)?;
        Some(collector.finish())
    }

    fn rasterize(&self, glyph: u16, pixel_size: u32) -> RasterGlyph {
        let (metrics, coverage) = self.raster.rasterize_indexed(glyph, pixel_size as f32);
        RasterGlyph {
            width: metrics.width,
            height: metrics.height,
            coverage,
        }
    }
}

/// Loader for [`TrueTypeFace`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TrueTypeLoader;

impl FaceLoader for TrueTypeLoader {
    type Face = TrueTypeFace;

    fn load(&self, bytes: FontBytes) -> Result<TrueTypeFace, FontError> {
        TrueTypeFace::parse(bytes)
    }
}
