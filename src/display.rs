//! E-paper panel interface
//!
//! The engine only needs three things from the panel: push the canvas with a
//! fast or a full-quality waveform, re-drive the current image at full quality
//! to clear ghosting, and switch the controller's power state.

use crate::canvas::Canvas;
use log::{debug, info};
use thiserror::Error;

/// Waveform used for an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// Fast update, leaves faint ghosting behind
    Partial,
    /// Slow update that clears accumulated ghosting
    Full,
}

/// Power state of the panel controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelPower {
    Active,
    /// Controller idle, image retained, quick to resume
    Standby,
    /// Lowest power; requires a full re-init
    DeepSleep,
}

/// Panel communication failed.
#[derive(Error, Debug)]
#[error("display error: {0}")]
pub struct DisplayError(pub String);

/// A panel the canvas can be pushed to.
pub trait DisplaySurface {
    /// Transfer the canvas and update the panel with `mode`.
    fn push(&mut self, canvas: &Canvas, mode: UpdateMode) -> Result<(), DisplayError>;

    /// Re-drive the image already on the panel with the full-quality waveform.
    fn update_full(&mut self) -> Result<(), DisplayError>;

    fn set_power(&mut self, power: PanelPower) -> Result<(), DisplayError>;
}

/// One thing the panel was asked to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelEvent {
    Push(UpdateMode),
    UpdateFull,
    Power(PanelPower),
}

/// Panel stand-in for development and tests.
///
/// Keeps the last pushed frame and a log of every request. With
/// `ascii_columns` set, each full-quality update prints the frame to stdout.
#[derive(Debug, Default)]
pub struct SimulatedPanel {
    pub events: Vec<PanelEvent>,
    pub frame: Option<Canvas>,
    pub ascii_columns: Option<u32>,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print frames as ASCII art with the given width.
    pub fn with_ascii(columns: u32) -> Self {
        Self {
            ascii_columns: Some(columns),
            ..Self::default()
        }
    }

    /// Number of full-quality updates, whether pushed or re-driven.
    pub fn full_updates(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PanelEvent::Push(UpdateMode::Full) | PanelEvent::UpdateFull))
            .count()
    }

    pub fn partial_updates(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PanelEvent::Push(UpdateMode::Partial)))
            .count()
    }

    fn print_frame(&self) {
        if let (Some(columns), Some(frame)) = (self.ascii_columns, &self.frame) {
            println!("{}", frame.to_ascii(columns));
        }
    }
}

impl DisplaySurface for SimulatedPanel {
    fn push(&mut self, canvas: &Canvas, mode: UpdateMode) -> Result<(), DisplayError> {
        debug!(
            "Panel push ({:?}): {} inked pixels",
            mode,
            canvas.inked_pixels()
        );
        self.frame = Some(canvas.clone());
        self.events.push(PanelEvent::Push(mode));
        if mode == UpdateMode::Full {
            self.print_frame();
        }
        Ok(())
    }

    fn update_full(&mut self) -> Result<(), DisplayError> {
        debug!("Panel full-quality refresh");
        self.events.push(PanelEvent::UpdateFull);
        self.print_frame();
        Ok(())
    }

    fn set_power(&mut self, power: PanelPower) -> Result<(), DisplayError> {
        info!("Panel power: {:?}", power);
        self.events.push(PanelEvent::Power(power));
        Ok(())
    }
}
