//! # Paper Specimen Entry Point
//!
//! Wires the engine to its collaborators and runs one wake cycle. On a host
//! the board and panel are simulated; `--stdout` prints every full-quality
//! frame as ASCII art so the output can be checked without hardware.
//!
//! ```text
//! paper-specimen [--stdout] [--wake cold|timer|input] [--battery-mv N] [--config PATH]
//! ```

use anyhow::{bail, Context};
use log::{info, warn};
use paper_specimen::board::SimulatedBoard;
use paper_specimen::config::{Config, CONFIG_FILE};
use paper_specimen::display::SimulatedPanel;
use paper_specimen::engine::{CycleOutcome, Engine};
use paper_specimen::font_engine::TrueTypeLoader;
use paper_specimen::font_store::{scan_fonts, DirectoryStorage};
use paper_specimen::power::{FileStore, WakeCause};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Width of the ASCII rendering in development mode.
const ASCII_COLUMNS: u32 = 90;

/// Battery reading used when none is given (about 78 %).
const DEFAULT_BATTERY_MV: u32 = 4000;

#[derive(Debug, PartialEq)]
struct Options {
    stdout: bool,
    wake: WakeCause,
    battery_mv: u32,
    config_path: PathBuf,
}

fn parse_wake(value: &str) -> anyhow::Result<WakeCause> {
    match value {
        "cold" => Ok(WakeCause::ColdStart),
        "timer" => Ok(WakeCause::TimerWake),
        "input" => Ok(WakeCause::InputWake),
        other => bail!("unknown wake cause '{}' (expected cold, timer or input)", other),
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options {
        stdout: false,
        wake: WakeCause::ColdStart,
        battery_mv: DEFAULT_BATTERY_MV,
        config_path: PathBuf::from(CONFIG_FILE),
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout" => options.stdout = true,
            "--wake" => {
                let value = args.next().context("--wake needs a value")?;
                options.wake = parse_wake(&value)?;
            }
            "--battery-mv" => {
                let value = args.next().context("--battery-mv needs a value")?;
                options.battery_mv = value
                    .parse()
                    .with_context(|| format!("invalid battery reading '{}'", value))?;
            }
            "--config" => {
                options.config_path = args.next().context("--config needs a path")?.into();
            }
            other => warn!("Ignoring unknown argument {}", other),
        }
    }
    Ok(options)
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args(env::args().skip(1))?;
    let config = Config::load_from_path(&options.config_path);

    let fonts_dir = &config.device.fonts_dir;
    fs::create_dir_all(fonts_dir)
        .with_context(|| format!("creating fonts directory {}", fonts_dir.display()))?;
    let found = scan_fonts(fonts_dir)
        .with_context(|| format!("scanning fonts directory {}", fonts_dir.display()))?;
    let fonts = config.specimen.enabled_fonts(found);
    info!("{} fonts enabled in {}", fonts.len(), fonts_dir.display());

    let panel = if options.stdout {
        SimulatedPanel::with_ascii(ASCII_COLUMNS)
    } else {
        SimulatedPanel::new()
    };
    let board = SimulatedBoard::new(options.wake, options.battery_mv);
    let store = FileStore::new(&config.device.snapshot_path);

    let mut engine = Engine::new(
        &config,
        fonts,
        board,
        panel,
        DirectoryStorage,
        TrueTypeLoader,
        store,
    );
    match engine.run().context("specimen cycle failed")? {
        CycleOutcome::Suspended(sources) => {
            info!(
                "Suspended; next timer wake in {:?} min",
                sources.timer_minutes
            );
            Ok(())
        }
        CycleOutcome::PoweredOff { reason, .. } => {
            info!("Powered off ({:?})", reason);
            Ok(())
        }
        CycleOutcome::Halted(reason) => bail!("halted: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        let options = parse_args(args(&[])).unwrap();
        assert!(!options.stdout);
        assert_eq!(options.wake, WakeCause::ColdStart);
        assert_eq!(options.battery_mv, DEFAULT_BATTERY_MV);
        assert_eq!(options.config_path, PathBuf::from(CONFIG_FILE));
    }

    #[test]
    fn development_flags_are_parsed() {
        let options = parse_args(args(&[
            "--stdout",
            "--wake",
            "timer",
            "--battery-mv",
            "3340",
            "--config",
            "/tmp/specimen.toml",
        ]))
        .unwrap();
        assert!(options.stdout);
        assert_eq!(options.wake, WakeCause::TimerWake);
        assert_eq!(options.battery_mv, 3340);
        assert_eq!(options.config_path, PathBuf::from("/tmp/specimen.toml"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse_args(args(&["--wake", "noon"])).is_err());
        assert!(parse_args(args(&["--battery-mv", "lots"])).is_err());
        assert!(parse_args(args(&["--wake"])).is_err());
    }
}
