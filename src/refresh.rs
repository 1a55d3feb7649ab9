//! # Refresh Controller
//!
//! Decides when a fast partial update is good enough and when the panel needs a
//! full-quality update to clear ghosting.
//!
//! ## State machine
//! ```text
//! Idle --render--> PartialsAccumulating --(5th partial | 10 s elapsed)--> Idle
//! ```
//! - Every render is pushed with the fast waveform
//! - The first partial after a full update starts the ghosting timer
//! - The fifth partial, or any render or poll at least ten seconds after the
//!   first pending partial, triggers a full-quality update and resets
//!
//! A forced update (cold start, notices) is pushed at full quality directly.

use crate::canvas::Canvas;
use crate::display::{DisplayError, DisplaySurface, UpdateMode};
use log::{debug, info};

/// Partials allowed before a full update is forced.
pub const MAX_PARTIALS_BEFORE_FULL: u8 = 5;

/// Age of the first pending partial that forces a full update.
pub const FULL_REFRESH_TIMEOUT_MS: u64 = 10_000;

/// Where the controller is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    PartialsAccumulating,
}

/// How a render ended up on the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshKind {
    Partial,
    Full,
}

/// Partial/full coalescing state.
#[derive(Debug, Clone)]
pub struct RefreshController {
    partial_count: u8,
    first_pending_at: u64,
    has_pending: bool,
    force_full: bool,
    last_full_at: u64,
}

impl RefreshController {
    /// A controller whose last full update happened at `now`.
    pub fn new(now: u64) -> Self {
        Self {
            partial_count: 0,
            first_pending_at: now,
            has_pending: false,
            force_full: false,
            last_full_at: now,
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        if self.has_pending {
            RefreshPhase::PartialsAccumulating
        } else {
            RefreshPhase::Idle
        }
    }

    pub fn partial_count(&self) -> u8 {
        self.partial_count
    }

    /// Timestamp of the most recent full-quality update.
    pub fn last_full_at(&self) -> u64 {
        self.last_full_at
    }

    /// Make the next render go out at full quality.
    pub fn force_full_next(&mut self) {
        self.force_full = true;
    }

    /// Push a freshly rendered canvas and classify the update.
    pub fn on_render_complete<D: DisplaySurface + ?Sized>(
        &mut self,
        display: &mut D,
        canvas: &Canvas,
        now: u64,
    ) -> Result<RefreshKind, DisplayError> {
        if self.force_full {
            display.push(canvas, UpdateMode::Full)?;
            info!("Forced full refresh");
            self.reset(now);
            return Ok(RefreshKind::Full);
        }

        display.push(canvas, UpdateMode::Partial)?;

        if !self.has_pending {
            self.first_pending_at = now;
            self.has_pending = true;
            debug!("First partial after full, ghosting timer started");
        }
        self.partial_count += 1;

        let elapsed = now.saturating_sub(self.first_pending_at);
        if self.partial_count >= MAX_PARTIALS_BEFORE_FULL || elapsed >= FULL_REFRESH_TIMEOUT_MS {
            info!(
                "Full refresh triggered (count={}, {}ms since first partial)",
                self.partial_count, elapsed
            );
            display.update_full()?;
            self.reset(now);
            return Ok(RefreshKind::Full);
        }
        Ok(RefreshKind::Partial)
    }

    /// Issue a full update if a partial has been pending for too long.
    ///
    /// Called every loop iteration; returns whether a full update went out.
    pub fn poll<D: DisplaySurface + ?Sized>(
        &mut self,
        display: &mut D,
        now: u64,
    ) -> Result<bool, DisplayError> {
        if self.has_pending && now.saturating_sub(self.first_pending_at) >= FULL_REFRESH_TIMEOUT_MS {
            info!("Auto full refresh after timeout, clearing ghosting");
            display.update_full()?;
            self.reset(now);
            return Ok(true);
        }
        Ok(false)
    }

    fn reset(&mut self, now: u64) {
        self.partial_count = 0;
        self.has_pending = false;
        self.force_full = false;
        self.last_full_at = now;
    }
}
