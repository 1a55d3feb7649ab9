//! # Glyph Availability Resolver
//!
//! Finds a codepoint the active font can actually draw. Fonts on the card
//! range from full pan-Unicode families to single-script display faces, so the
//! preferred codepoint is only a hint.
//!
//! ## Resolution order
//! 1. The preferred codepoint, if the font maps it to a real glyph
//! 2. The first mapped codepoint of the first enabled range that has one,
//!    scanning each range in ascending order
//! 3. The font's first mapped character
//! 4. [`Exhausted`]
//!
//! The scan is linear on purpose: catalog ranges hold at most a few hundred
//! codepoints and a cmap lookup is cheap.

use crate::unicode_ranges::UnicodeRange;
use log::debug;
use thiserror::Error;

/// Codepoint to glyph lookup, as provided by a loaded font face.
pub trait GlyphSource {
    /// Glyph index for `codepoint`; 0 (`.notdef`) means "not in the font".
    fn glyph_index(&self, codepoint: u32) -> u16;

    /// Lowest codepoint the font maps to a real glyph.
    fn first_char(&self) -> Option<u32>;

    fn has_glyph(&self, codepoint: u32) -> bool {
        self.glyph_index(codepoint) != 0
    }
}

/// The font has no glyph for any enabled range and no mapped characters at all.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("font has no renderable glyph")]
pub struct Exhausted;

/// Pick the codepoint to display. See the module docs for the order.
pub fn resolve<'a, G, I>(preferred: u32, enabled_ranges: I, font: &G) -> Result<u32, Exhausted>
where
    G: GlyphSource + ?Sized,
    I: IntoIterator<Item = &'a UnicodeRange>,
{
    if font.has_glyph(preferred) {
        return Ok(preferred);
    }

    for range in enabled_ranges {
        if let Some(codepoint) = range.codepoints().find(|cp| font.has_glyph(*cp)) {
            debug!(
                "U+{:04X} missing, using U+{:04X} from {}",
                preferred, codepoint, range.label
            );
            return Ok(codepoint);
        }
    }

    match font.first_char() {
        Some(codepoint) => {
            debug!(
                "No enabled range matches, using first character U+{:04X}",
                codepoint
            );
            Ok(codepoint)
        }
        None => Err(Exhausted),
    }
}

/// Codepoint used when no range is enabled at all.
pub const FALLBACK_CODEPOINT: u32 = 0x0041;

/// Uniformly random enabled range, then a uniformly random codepoint in it.
pub fn random_preferred(enabled_ranges: &[UnicodeRange], rng: &mut fastrand::Rng) -> u32 {
    if enabled_ranges.is_empty() {
        return FALLBACK_CODEPOINT;
    }
    let range = &enabled_ranges[rng.usize(..enabled_ranges.len())];
    let codepoint = rng.u32(range.start..=range.end);
    debug!("Random glyph: U+{:04X} from {}", codepoint, range.label);
    codepoint
}
