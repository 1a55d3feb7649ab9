//! # Paper Specimen Core Library
//!
//! This library drives a battery-powered e-paper typography specimen: it picks a
//! font and a character, renders it either as a filled bitmap or as an annotated
//! vector outline, pushes the result to a slow-refresh panel, and then powers the
//! board down until the next timer or button wake.
//!
//! ## Design Philosophy
//!
//! ### Memory Efficiency
//! - **Byte-budgeted font cache**: raw font files stay resident only while the
//!   total fits the configured budget (1.5 MiB by default)
//! - **One active face**: loading a font tears down the previous face's raster
//!   caches before the face itself is released
//! - **Packed 4-bit canvas**: two pixels per byte, 540×960 ≈ 253 KB
//!
//! ### Display Technology
//! E-paper accumulates ghosting with every fast update. The refresh controller
//! coalesces fast partial updates and inserts a full-quality update every fifth
//! push or ten seconds after the first pending partial.
//!
//! ### Power Cycle
//! 1. **Wake**: cold start, timer wake or button wake
//! 2. **Render**: resolve a glyph the active font can draw, rasterize, push
//! 3. **Idle**: poll buttons until the idle rule says it is time to sleep
//! 4. **Suspend**: persist the snapshot, arm button + timer wake, sleep
//!
//! ## Core Types
//! - [`ViewMode`]: bitmap or outline rendering
//! - [`RenderState`]: which font, which codepoint, which view
//! - [`FontRecord`]: a font file discovered on storage

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod board;
pub mod canvas;
pub mod config;
pub mod display;
pub mod engine;
pub mod font_cache;
pub mod font_engine;
pub mod font_store;
pub mod input;
pub mod outline;
pub mod power;
pub mod refresh;
pub mod renderer;
pub mod resolver;
pub mod unicode_ranges;

/// How the current glyph is drawn.
///
/// Persisted in the suspend snapshot, so the serialized names are part of the
/// snapshot format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Antialiased coverage bitmap, mapped onto 16 gray levels
    #[default]
    Bitmap,
    /// Flattened outline with construction lines and point markers
    Outline,
}

impl ViewMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Bitmap => ViewMode::Outline,
            ViewMode::Outline => ViewMode::Bitmap,
        }
    }
}

/// What is on screen right now.
///
/// Mutated by button handlers and by the wake logic; everything else only
/// reads it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderState {
    /// Index into the enabled font list
    pub font_index: usize,
    /// Unicode scalar value being displayed
    pub codepoint: u32,
    /// Bitmap or outline view
    pub view_mode: ViewMode,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            font_index: 0,
            codepoint: 0x0041,
            view_mode: ViewMode::Bitmap,
        }
    }
}

/// A font file found on storage.
///
/// Created by [`font_store::scan_fonts`], filtered by the configuration at
/// boot and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontRecord {
    /// Location of the font file
    pub path: PathBuf,
    /// Human readable name shown in the top label (file stem)
    pub display_name: String,
    /// Whether the configuration lets this font take part in the rotation
    pub enabled: bool,
}

impl FontRecord {
    /// Build a record from a path, deriving the display name from the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            display_name,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests;
