//! # Unicode Range Catalog
//!
//! The fixed list of codepoint ranges a specimen glyph can be drawn from. The
//! configuration enables ranges by catalog position, so the order of
//! [`CATALOG`] is part of the on-disk configuration format: append, never
//! reorder.
//!
//! The first entries are the ranges almost every font covers; the later ones
//! are there for fonts with broader coverage and are disabled by default.

/// An inclusive range of codepoints with a human readable label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnicodeRange {
    pub start: u32,
    pub end: u32,
    pub label: &'static str,
}

impl UnicodeRange {
    pub const fn new(start: u32, end: u32, label: &'static str) -> Self {
        Self { start, end, label }
    }

    /// Iterate the codepoints of the range in ascending order.
    pub fn codepoints(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn contains(&self, codepoint: u32) -> bool {
        (self.start..=self.end).contains(&codepoint)
    }

    /// Number of codepoints in the range.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// How many catalog entries are enabled when the configuration says nothing.
pub const DEFAULT_ENABLED_RANGES: usize = 6;

/// Every range the specimen knows about, indexed by position.
pub const CATALOG: [UnicodeRange; 28] = [
    UnicodeRange::new(0x0041, 0x005A, "Latin Uppercase"),
    UnicodeRange::new(0x0061, 0x007A, "Latin Lowercase"),
    UnicodeRange::new(0x0030, 0x0039, "Digits"),
    UnicodeRange::new(0x0021, 0x002F, "Basic Punctuation 1"),
    UnicodeRange::new(0x003A, 0x0040, "Basic Punctuation 2"),
    UnicodeRange::new(0x005B, 0x0060, "Basic Punctuation 3"),
    UnicodeRange::new(0x007B, 0x007E, "Basic Punctuation 4"),
    UnicodeRange::new(0x00A1, 0x00BF, "Latin-1 Punctuation"),
    UnicodeRange::new(0x00C0, 0x00FF, "Latin-1 Letters"),
    UnicodeRange::new(0x0100, 0x017F, "Latin Extended-A"),
    UnicodeRange::new(0x0180, 0x024F, "Latin Extended-B"),
    UnicodeRange::new(0x0250, 0x02AF, "IPA Extensions"),
    UnicodeRange::new(0x0391, 0x03A9, "Greek Uppercase"),
    UnicodeRange::new(0x03B1, 0x03C9, "Greek Lowercase"),
    UnicodeRange::new(0x0410, 0x042F, "Cyrillic Uppercase"),
    UnicodeRange::new(0x0430, 0x044F, "Cyrillic Lowercase"),
    UnicodeRange::new(0x05D0, 0x05EA, "Hebrew"),
    UnicodeRange::new(0x0621, 0x064A, "Arabic"),
    UnicodeRange::new(0x0905, 0x0939, "Devanagari"),
    UnicodeRange::new(0x0E01, 0x0E2E, "Thai"),
    UnicodeRange::new(0x2010, 0x2027, "General Punctuation"),
    UnicodeRange::new(0x20A0, 0x20C0, "Currency Symbols"),
    UnicodeRange::new(0x2100, 0x214F, "Letterlike Symbols"),
    UnicodeRange::new(0x2190, 0x21FF, "Arrows"),
    UnicodeRange::new(0x2200, 0x22FF, "Mathematical Operators"),
    UnicodeRange::new(0x2500, 0x257F, "Box Drawing"),
    UnicodeRange::new(0x25A0, 0x25FF, "Geometric Shapes"),
    UnicodeRange::new(0x2600, 0x26FF, "Miscellaneous Symbols"),
];

/// Default per-range enable flags: the first [`DEFAULT_ENABLED_RANGES`] entries.
pub fn default_enabled() -> Vec<bool> {
    (0..CATALOG.len())
        .map(|i| i < DEFAULT_ENABLED_RANGES)
        .collect()
}

/// The enabled subset of the catalog, in catalog order.
///
/// Flags beyond the end of `enabled` fall back to the default for that
/// position, so a configuration written by an older build with a shorter
/// catalog keeps working.
pub fn enabled_ranges(enabled: &[bool]) -> Vec<UnicodeRange> {
    CATALOG
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            enabled
                .get(*i)
                .copied()
                .unwrap_or(*i < DEFAULT_ENABLED_RANGES)
        })
        .map(|(_, range)| *range)
        .collect()
}
