//! Test doubles for the font engine and the board.

use crate::board::Board;
use crate::font_cache::FontBytes;
use crate::font_engine::{FaceLoader, FontError, FontFace, RasterGlyph};
use crate::input::ButtonSample;
use crate::outline::{GlyphOutline, OutlineCollector};
use crate::power::{WakeCause, WakeSources};
use crate::resolver::GlyphSource;
use kurbo::Rect;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use ttf_parser::OutlineBuilder;

/// Face with a fixed character set. Every mapped glyph shares one outline: a
/// 500×700 box whose right edge is a quadratic curve, with a cubic bowl
/// inside.
#[derive(Clone, Debug, Default)]
pub struct FakeFace {
    chars: BTreeMap<u32, u16>,
    raster_calls: Cell<usize>,
}

impl FakeFace {
    pub fn with_chars(chars: impl IntoIterator<Item = u32>) -> Self {
        Self {
            chars: chars.into_iter().zip(1u16..).collect(),
            raster_calls: Cell::new(0),
        }
    }

    /// Printable ASCII.
    pub fn latin() -> Self {
        Self::with_chars(0x20..=0x7E)
    }

    /// Greek capitals only.
    pub fn greek() -> Self {
        Self::with_chars(0x391..=0x3A9)
    }

    /// No mapped characters at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// How many glyphs were rasterized.
    pub fn raster_calls(&self) -> usize {
        self.raster_calls.get()
    }
}

impl GlyphSource for FakeFace {
    fn glyph_index(&self, codepoint: u32) -> u16 {
        self.chars.get(&codepoint).copied().unwrap_or(0)
    }

    fn first_char(&self) -> Option<u32> {
        self.chars.keys().next().copied()
    }
}

impl FontFace for FakeFace {
    fn units_per_em(&self) -> u16 {
        1000
    }

    fn glyph_bounds(&self, glyph: u16) -> Option<Rect> {
        (glyph != 0).then(|| Rect::new(0.0, 0.0, 500.0, 700.0))
    }

    fn outline(&self, glyph: u16) -> Option<GlyphOutline> {
        if glyph == 0 {
            return None;
        }
        let mut builder = OutlineCollector::new();
        builder.move_to(0.0, 0.0);
        builder.line_to(500.0, 0.0);
        builder.quad_to(600.0, 350.0, 500.0, 700.0);
        builder.line_to(0.0, 700.0);
        builder.close();
        builder.move_to(100.0, 100.0);
        builder.curve_to(150.0, 300.0, 350.0, 300.0, 400.0, 100.0);
        builder.close();
        Some(builder.finish())
    }

    fn rasterize(&self, _glyph: u16, pixel_size: u32) -> RasterGlyph {
        self.raster_calls.set(self.raster_calls.get() + 1);
        let width = (pixel_size * 500 / 1000) as usize;
        let height = (pixel_size * 700 / 1000) as usize;
        RasterGlyph {
            width,
            height,
            coverage: vec![255; width * height],
        }
    }
}

/// Picks the face by the first byte of the font file.
#[derive(Default)]
pub struct FakeLoader {
    pub faces: HashMap<u8, FakeFace>,
}

impl FaceLoader for FakeLoader {
    type Face = FakeFace;

    fn load(&self, bytes: FontBytes) -> Result<FakeFace, FontError> {
        let id = bytes
            .first()
            .copied()
            .ok_or_else(|| FontError::Parse("empty font file".to_string()))?;
        self.faces
            .get(&id)
            .cloned()
            .ok_or_else(|| FontError::Parse(format!("unknown face {id}")))
    }
}

pub const NEXT: ButtonSample = ButtonSample {
    previous: false,
    next: true,
    center: false,
};

pub const PREVIOUS: ButtonSample = ButtonSample {
    previous: true,
    next: false,
    center: false,
};

pub const BOTH: ButtonSample = ButtonSample {
    previous: true,
    next: true,
    center: false,
};

pub const CENTER: ButtonSample = ButtonSample {
    previous: false,
    next: false,
    center: true,
};

/// A button held from `at` for `hold` milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct Press {
    pub at: u64,
    pub hold: u64,
    pub sample: ButtonSample,
}

/// Board with a virtual clock that only moves on delays, and scripted buttons.
#[derive(Debug)]
pub struct FakeBoard {
    pub now: u64,
    pub wake: WakeCause,
    pub battery_mv: u32,
    pub presses: Vec<Press>,
    pub battery_reads: usize,
    pub suspended: Option<WakeSources>,
    pub powered_off: Option<WakeSources>,
}

impl FakeBoard {
    pub fn new(wake: WakeCause) -> Self {
        Self {
            now: 0,
            wake,
            battery_mv: 4000,
            presses: Vec::new(),
            battery_reads: 0,
            suspended: None,
            powered_off: None,
        }
    }

    pub fn with_battery(mut self, millivolts: u32) -> Self {
        self.battery_mv = millivolts;
        self
    }

    pub fn press(mut self, at: u64, hold: u64, sample: ButtonSample) -> Self {
        self.presses.push(Press { at, hold, sample });
        self
    }
}

impl Board for FakeBoard {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u64) {
        self.now += ms;
        assert!(self.now < 600_000, "engine never went to sleep");
    }

    fn wake_cause(&self) -> WakeCause {
        self.wake
    }

    fn battery_millivolts(&mut self) -> u32 {
        self.battery_reads += 1;
        self.battery_mv
    }

    fn buttons(&mut self) -> ButtonSample {
        self.presses
            .iter()
            .filter(|p| p.at <= self.now && self.now < p.at + p.hold)
            .fold(ButtonSample::default(), |acc, p| ButtonSample {
                previous: acc.previous || p.sample.previous,
                next: acc.next || p.sample.next,
                center: acc.center || p.sample.center,
            })
    }

    fn entropy(&mut self) -> u64 {
        42
    }

    fn suspend(&mut self, sources: WakeSources) {
        self.suspended = Some(sources);
    }

    fn power_off(&mut self, sources: WakeSources) {
        self.powered_off = Some(sources);
    }
}
