//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! specimen-config.toml file. The `specimen` section is the record produced by
//! the on-device setup menu (wake interval, wake behaviour, enabled fonts and
//! Unicode ranges); the `device` section holds board-level settings that
//! rarely change.
//!
//! The engine treats the loaded [`Config`] as read-only for the whole run.

use crate::unicode_ranges;
use crate::FontRecord;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, relative to the working directory.
pub const CONFIG_FILE: &str = "specimen-config.toml";

/// Timer wake intervals the setup menu offers, in minutes.
pub const WAKE_INTERVALS_MINUTES: [u32; 6] = [5, 10, 15, 30, 60, 120];

/// Interval used when the file holds a value outside [`WAKE_INTERVALS_MINUTES`].
pub const DEFAULT_WAKE_INTERVAL_MINUTES: u32 = 15;

/// Errors that can occur while saving the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("config serialization: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration loaded from specimen-config.toml
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Specimen behaviour chosen in the setup menu
    #[serde(default)]
    pub specimen: SpecimenConfig,
    /// Board and engine settings
    #[serde(default)]
    pub device: DeviceConfig,
}

/// The configuration record the setup menu produces.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpecimenConfig {
    /// Minutes between timer wakes while suspended
    pub wake_interval_minutes: u32,
    /// Timer wakes may switch to a random font
    pub allow_different_font_on_wake: bool,
    /// Timer wakes may switch between bitmap and outline view
    pub allow_different_mode_on_wake: bool,
    /// Per-font enable flags, by position in the sorted font directory.
    /// Fonts past the end of the list are enabled.
    pub font_enabled: Vec<bool>,
    /// Per-range enable flags, by position in the Unicode range catalog
    pub range_enabled: Vec<bool>,
}

impl Default for SpecimenConfig {
    fn default() -> Self {
        Self {
            wake_interval_minutes: DEFAULT_WAKE_INTERVAL_MINUTES,
            allow_different_font_on_wake: true,
            allow_different_mode_on_wake: false,
            font_enabled: Vec::new(),
            range_enabled: unicode_ranges::default_enabled(),
        }
    }
}

/// Board level settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Directory scanned for .ttf/.otf files
    pub fonts_dir: PathBuf,
    /// Where the suspend snapshot is retained between wakes
    pub snapshot_path: PathBuf,
    /// Canvas width in pixels (portrait)
    pub width: u32,
    /// Canvas height in pixels (portrait)
    pub height: u32,
    /// Largest dimension of the specimen glyph, in pixels
    pub glyph_size: u32,
    /// Total bytes of font files kept resident
    pub cache_budget_bytes: usize,
    /// Larger font files are always loaded straight from storage
    pub max_cacheable_font_bytes: usize,
    /// Battery voltage reported as 0 %
    pub battery_empty_mv: u32,
    /// Battery voltage reported as 100 %
    pub battery_full_mv: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from("fonts"),
            snapshot_path: PathBuf::from("/tmp/paper_specimen_snapshot.json"),
            width: 540,
            height: 960,
            glyph_size: 375,
            cache_budget_bytes: 1_572_864,
            max_cacheable_font_bytes: 1_048_576,
            battery_empty_mv: 3300,
            battery_full_mv: 4200,
        }
    }
}

impl Config {
    /// Load configuration from specimen-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        "Loaded configuration from {}",
                        path.as_ref().display()
                    );
                    config.normalized()
                }
                Err(e) => {
                    warn!("Invalid config file format: {}", e);
                    warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to specimen-config.toml
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(CONFIG_FILE)
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Replace values the engine cannot honour with their defaults.
    fn normalized(mut self) -> Self {
        if !WAKE_INTERVALS_MINUTES.contains(&self.specimen.wake_interval_minutes) {
            warn!(
                "Wake interval {} min is not supported, using {} min",
                self.specimen.wake_interval_minutes, DEFAULT_WAKE_INTERVAL_MINUTES
            );
            self.specimen.wake_interval_minutes = DEFAULT_WAKE_INTERVAL_MINUTES;
        }
        self
    }
}

impl SpecimenConfig {
    /// Apply the per-font enable flags to a directory scan and keep the
    /// enabled fonts, preserving scan order.
    pub fn enabled_fonts(&self, scanned: Vec<FontRecord>) -> Vec<FontRecord> {
        scanned
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.enabled = self.font_enabled.get(i).copied().unwrap_or(true);
                record
            })
            .filter(|record| record.enabled)
            .collect()
    }
}
