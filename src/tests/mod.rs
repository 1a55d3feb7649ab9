//! # Cross-Module Test Suite
//!
//! Shared fakes plus whole-cycle scenarios that drive the [`crate::engine`]
//! with a virtual clock. Unit tests for single modules live next to the code.

pub mod fakes;

mod engine_scenarios;

use crate::{FontRecord, ViewMode};

#[test]
fn display_name_is_file_stem() {
    let record = FontRecord::from_path("/fonts/Inter-Regular.ttf");
    assert_eq!(record.display_name, "Inter-Regular");
    assert!(record.enabled);
}

#[test]
fn view_mode_toggles_back_and_forth() {
    assert_eq!(ViewMode::Bitmap.toggled(), ViewMode::Outline);
    assert_eq!(ViewMode::Outline.toggled(), ViewMode::Bitmap);
}
