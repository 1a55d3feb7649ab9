//! # Power Scheduler
//!
//! Decides when the board suspends and carries the small amount of state that
//! has to survive a suspend.
//!
//! ## States
//! ```text
//! Running <--input-- SuspendPending --commit--> Suspended (end of run)
//!    |                     ^
//!    +---idle rule met-----+
//! ```
//! `Suspended` is terminal: the process ends and the next wake starts a fresh
//! run that reads the wake cause and the retained snapshot.
//!
//! ## Suspend rules (checked every loop iteration)
//! - **Unattended** (timer wake, no input since): suspend once the last full
//!   refresh is at least 600 ms old
//! - **Attended**: suspend once both the last full refresh and the last input
//!   are at least 10 s old
//!
//! ## Retained snapshot
//! [`RetainedStore`] is the save/restore contract: [`RetainedStore::save`]
//! runs exactly once right before suspend and [`RetainedStore::load`] exactly
//! once right after wake. A cold start clears it.

use crate::{RenderState, ViewMode};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Idle time after the last full refresh before an attended session sleeps.
pub const IDLE_TIMEOUT_MS: u64 = 10_000;

/// Settle time after the last full refresh before an unattended session sleeps.
pub const UNATTENDED_SETTLE_MS: u64 = 600;

/// Timer wakes below this battery percentage power off instead of rendering.
pub const LOW_BATTERY_PERCENT: f32 = 5.0;

/// Why this run started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeCause {
    /// Reset or first power-on; no retained state
    ColdStart,
    /// Wake timer expired
    TimerWake,
    /// Button pressed while suspended
    InputWake,
}

/// State carried across a suspend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentSnapshot {
    /// False means "no previous session"
    pub valid: bool,
    pub font_index: usize,
    pub codepoint: u32,
    pub view_mode: ViewMode,
    /// Total awake time across sessions, for the debug overlay
    pub accumulated_uptime_ms: u64,
    pub debug_mode: bool,
}

impl PersistentSnapshot {
    /// The render state recorded in the snapshot.
    pub fn render_state(&self) -> RenderState {
        RenderState {
            font_index: self.font_index,
            codepoint: self.codepoint,
            view_mode: self.view_mode,
        }
    }
}

/// Errors from the retained store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot IO: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Storage that survives suspend but not a cold reset.
pub trait RetainedStore {
    /// Read the snapshot; an empty store yields an invalid snapshot.
    fn load(&mut self) -> Result<PersistentSnapshot, StoreError>;

    fn save(&mut self, snapshot: &PersistentSnapshot) -> Result<(), StoreError>;

    /// Forget everything (cold start).
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// On-disk record written by [`FileStore`].
#[derive(Debug, Serialize, Deserialize)]
struct RetainedRecord {
    snapshot: PersistentSnapshot,
    saved_at: DateTime<Utc>,
}

/// JSON file store, for boards that retain a filesystem (or tmpfs) across sleep.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RetainedStore for FileStore {
    fn load(&mut self) -> Result<PersistentSnapshot, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(PersistentSnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };
        let record: RetainedRecord = serde_json::from_str(&contents)?;
        let asleep = Utc::now().signed_duration_since(record.saved_at);
        info!(
            "Snapshot restored (saved {}s ago)",
            asleep.num_seconds().max(0)
        );
        Ok(record.snapshot)
    }

    fn save(&mut self, snapshot: &PersistentSnapshot) -> Result<(), StoreError> {
        let record = RetainedRecord {
            snapshot: *snapshot,
            saved_at: Utc::now(),
        };
        fs::write(&self.path, serde_json::to_string(&record)?)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Retained store held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub snapshot: Option<PersistentSnapshot>,
    pub saves: usize,
}

impl RetainedStore for MemoryStore {
    fn load(&mut self) -> Result<PersistentSnapshot, StoreError> {
        Ok(self.snapshot.unwrap_or_default())
    }

    fn save(&mut self, snapshot: &PersistentSnapshot) -> Result<(), StoreError> {
        self.snapshot = Some(*snapshot);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }
}

/// Wake sources armed before the board goes down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakeSources {
    /// Edge-triggered wake on the center button
    pub input_pin: bool,
    /// Timer wake after this many minutes
    pub timer_minutes: Option<u32>,
}

impl WakeSources {
    /// Normal suspend: button and timer.
    pub fn suspend(wake_interval_minutes: u32) -> Self {
        Self {
            input_pin: true,
            timer_minutes: Some(wake_interval_minutes),
        }
    }

    /// Manual shutdown: button only.
    pub fn input_only() -> Self {
        Self {
            input_pin: true,
            timer_minutes: None,
        }
    }

    /// Low-battery power-off: nothing.
    pub fn none() -> Self {
        Self {
            input_pin: false,
            timer_minutes: None,
        }
    }
}

/// Scheduler phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerPhase {
    Running,
    SuspendPending,
    Suspended,
}

/// Suspend decision state for one run.
#[derive(Debug, Clone)]
pub struct PowerScheduler {
    phase: PowerPhase,
    wake_cause: WakeCause,
    unattended: bool,
    session_start: u64,
    last_full_refresh: u64,
    last_input: u64,
    accumulated_uptime_ms: u64,
}

impl PowerScheduler {
    /// Start a run at `now`, carrying uptime from a valid snapshot.
    pub fn new(wake_cause: WakeCause, snapshot: &PersistentSnapshot, now: u64) -> Self {
        let accumulated_uptime_ms = if snapshot.valid {
            snapshot.accumulated_uptime_ms
        } else {
            0
        };
        Self {
            phase: PowerPhase::Running,
            wake_cause,
            unattended: false,
            session_start: now,
            last_full_refresh: now,
            last_input: now,
            accumulated_uptime_ms,
        }
    }

    pub fn phase(&self) -> PowerPhase {
        self.phase
    }

    pub fn wake_cause(&self) -> WakeCause {
        self.wake_cause
    }

    pub fn is_unattended(&self) -> bool {
        self.unattended
    }

    /// This run renders without a user present and should sleep right away.
    pub fn mark_unattended(&mut self) {
        self.unattended = true;
    }

    pub fn note_full_refresh(&mut self, now: u64) {
        self.last_full_refresh = now;
    }

    pub fn last_full_refresh(&self) -> u64 {
        self.last_full_refresh
    }

    /// User input: cancels unattended mode and any pending suspend.
    pub fn note_input(&mut self, now: u64) {
        self.last_input = now;
        if self.unattended {
            debug!("Input during unattended cycle, switching to idle rules");
        }
        self.unattended = false;
        if self.phase == PowerPhase::SuspendPending {
            self.phase = PowerPhase::Running;
        }
    }

    /// Evaluate the suspend rules at `now`.
    pub fn should_suspend(&mut self, now: u64) -> bool {
        if self.phase == PowerPhase::Suspended {
            return false;
        }
        let due = if self.unattended {
            now.saturating_sub(self.last_full_refresh) >= UNATTENDED_SETTLE_MS
        } else {
            // Input that ended without a panel update still restarts the timeout
            let reference = self.last_full_refresh.max(self.last_input);
            now.saturating_sub(reference) >= IDLE_TIMEOUT_MS
        };
        self.phase = if due {
            PowerPhase::SuspendPending
        } else {
            PowerPhase::Running
        };
        due
    }

    /// Whether a timer wake should power off instead of rendering.
    pub fn battery_critical(percent: f32) -> bool {
        percent < LOW_BATTERY_PERCENT
    }

    /// Total uptime including this session so far.
    pub fn uptime_ms(&self, now: u64) -> u64 {
        self.accumulated_uptime_ms + now.saturating_sub(self.session_start)
    }

    /// Commit to suspending and build the snapshot to retain.
    pub fn commit_suspend(
        &mut self,
        state: &RenderState,
        debug_mode: bool,
        now: u64,
    ) -> PersistentSnapshot {
        self.accumulated_uptime_ms = self.uptime_ms(now);
        self.session_start = now;
        self.phase = PowerPhase::Suspended;
        PersistentSnapshot {
            valid: true,
            font_index: state.font_index,
            codepoint: state.codepoint,
            view_mode: state.view_mode,
            accumulated_uptime_ms: self.accumulated_uptime_ms,
            debug_mode,
        }
    }
}
