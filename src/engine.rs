//! # Specimen Engine
//!
//! Owns every piece of mutable state for one run, from wake to suspend.
//!
//! ## Run sequence
//! 1. Read the wake cause; restore the retained snapshot or clear it (cold start)
//!    and bring the panel out of standby after a wake from suspend
//! 2. Take the wake path:
//!    - **Cold start**: first font, random glyph, forced full update
//!    - **Input wake**: restore font, glyph and view, render once
//!    - **Timer wake**: power off on a critical battery, otherwise pick a
//!      random glyph (and font / view when allowed), render with a full
//!      update and go back to sleep right away
//! 3. Poll buttons every 50 ms until the power scheduler says to suspend
//! 4. Save the snapshot, put the panel in standby, arm the wake sources
//!
//! [`Engine::run`] returns how the run ended. On hardware nothing comes after
//! a suspend or power-off.

use crate::board::Board;
use crate::canvas::Canvas;
use crate::config::{Config, SpecimenConfig};
use crate::display::{DisplayError, DisplaySurface, PanelPower, UpdateMode};
use crate::font_cache::{CacheError, FontCache};
use crate::font_engine::{FaceLoader, FontEngine, FontError};
use crate::font_store::FontStorage;
use crate::input::{BatteryMonitor, Command, Controls};
use crate::power::{
    PersistentSnapshot, PowerScheduler, RetainedStore, StoreError, WakeCause, WakeSources,
};
use crate::refresh::{RefreshController, RefreshKind};
use crate::renderer::{DebugOverlay, Frame, Renderer};
use crate::resolver::{random_preferred, resolve, GlyphSource};
use crate::unicode_ranges::{enabled_ranges, UnicodeRange};
use crate::{FontRecord, RenderState, ViewMode};
use log::{debug, error, info, warn};
use thiserror::Error;

/// Pause after handling input so a single press is not read twice.
pub const INPUT_SETTLE_MS: u64 = 300;

/// Button poll period while idle.
pub const IDLE_POLL_MS: u64 = 50;

/// How long the low-battery notice stays up before power is cut.
pub const LOW_BATTERY_NOTICE_MS: u64 = 2_000;

/// Failures that end a run early.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a font could not be made active.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Font(#[from] FontError),
}

/// Conditions that stop the device with a notice on screen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    #[error("no enabled fonts")]
    NoFonts,

    #[error("initial font could not be loaded: {0}")]
    FontLoad(String),
}

impl HaltReason {
    fn notice(&self) -> (&'static str, [&'static str; 2]) {
        match self {
            HaltReason::NoFonts => (
                "NO FONTS ENABLED",
                ["Add .ttf or .otf files, or delete", "specimen-config.toml"],
            ),
            HaltReason::FontLoad(_) => ("FONT LOAD ERROR", ["Check the log output", "for details"]),
        }
    }
}

/// Why the board was powered off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerOffReason {
    LowBattery,
    UserShutdown,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Suspended(WakeSources),
    PoweredOff {
        reason: PowerOffReason,
        sources: WakeSources,
    },
    /// A fatal notice is on screen; the board waits for a reset
    Halted(HaltReason),
}

/// The specimen appliance.
pub struct Engine<B, D, S, L, R>
where
    B: Board,
    D: DisplaySurface,
    S: FontStorage,
    L: FaceLoader,
    R: RetainedStore,
{
    board: B,
    display: D,
    store: R,
    settings: SpecimenConfig,
    fonts: Vec<FontRecord>,
    ranges: Vec<UnicodeRange>,
    cache: FontCache<S>,
    font_engine: FontEngine<L>,
    renderer: Renderer,
    canvas: Canvas,
    refresh: RefreshController,
    scheduler: PowerScheduler,
    controls: Controls,
    battery: BatteryMonitor,
    state: RenderState,
    debug_mode: bool,
    rng: fastrand::Rng,
}

impl<B, D, S, L, R> Engine<B, D, S, L, R>
where
    B: Board,
    D: DisplaySurface,
    S: FontStorage,
    L: FaceLoader,
    R: RetainedStore,
{
    /// Assemble an engine. `fonts` is the enabled font list, already filtered
    /// by the configuration.
    pub fn new(
        config: &Config,
        fonts: Vec<FontRecord>,
        mut board: B,
        display: D,
        storage: S,
        loader: L,
        store: R,
    ) -> Self {
        let device = &config.device;
        let seed = board.entropy();
        let now = board.now_ms();
        Self {
            board,
            display,
            store,
            settings: config.specimen.clone(),
            ranges: enabled_ranges(&config.specimen.range_enabled),
            fonts,
            cache: FontCache::new(
                storage,
                device.cache_budget_bytes,
                device.max_cacheable_font_bytes,
            ),
            font_engine: FontEngine::new(loader),
            renderer: Renderer::new(device.width, device.height, device.glyph_size),
            canvas: Canvas::new(device.width, device.height),
            refresh: RefreshController::new(now),
            scheduler: PowerScheduler::new(WakeCause::ColdStart, &PersistentSnapshot::default(), now),
            controls: Controls::new(),
            battery: BatteryMonitor::new(device.battery_empty_mv, device.battery_full_mv),
            state: RenderState::default(),
            debug_mode: false,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn font_cache(&self) -> &FontCache<S> {
        &self.cache
    }

    /// Run from wake to suspend (or power-off, or halt).
    pub fn run(&mut self) -> Result<CycleOutcome, EngineError> {
        let wake = self.board.wake_cause();
        let now = self.board.now_ms();
        info!("Wake: {:?} with {} fonts enabled", wake, self.fonts.len());

        let snapshot = match wake {
            WakeCause::ColdStart => {
                self.store.clear()?;
                PersistentSnapshot::default()
            }
            WakeCause::TimerWake | WakeCause::InputWake => self.store.load()?,
        };
        self.scheduler = PowerScheduler::new(wake, &snapshot, now);
        self.refresh = RefreshController::new(now);
        if wake != WakeCause::ColdStart {
            // The panel was left in standby at suspend
            self.display.set_power(PanelPower::Active)?;
        }

        if self.fonts.is_empty() {
            return self.halt(HaltReason::NoFonts);
        }

        let early_exit = match wake {
            WakeCause::InputWake | WakeCause::TimerWake if !snapshot.valid => {
                warn!("No retained state after {:?}, starting cold", wake);
                self.cold_start()?
            }
            WakeCause::ColdStart => self.cold_start()?,
            WakeCause::InputWake => {
                self.input_wake(&snapshot)?;
                None
            }
            WakeCause::TimerWake => self.timer_wake(&snapshot)?,
        };
        if let Some(outcome) = early_exit {
            return Ok(outcome);
        }

        self.event_loop()
    }

    fn cold_start(&mut self) -> Result<Option<CycleOutcome>, EngineError> {
        self.state = RenderState::default();
        self.debug_mode = false;
        if let Err(e) = self.load_font(0) {
            error!("Initial font {} failed: {}", self.fonts[0].display_name, e);
            return self.halt(HaltReason::FontLoad(e.to_string())).map(Some);
        }
        self.state.codepoint = random_preferred(&self.ranges, &mut self.rng);
        self.refresh.force_full_next();
        self.show_resolved()?;
        Ok(None)
    }

    fn input_wake(&mut self, snapshot: &PersistentSnapshot) -> Result<(), EngineError> {
        self.state = snapshot.render_state();
        self.debug_mode = snapshot.debug_mode;
        if self.state.font_index >= self.fonts.len() {
            warn!(
                "Saved font index {} out of range, resetting to 0",
                self.state.font_index
            );
            self.state.font_index = 0;
        }
        info!(
            "Restored font {}/{}, U+{:04X}, {:?}",
            self.state.font_index + 1,
            self.fonts.len(),
            self.state.codepoint,
            self.state.view_mode
        );
        if self.load_first_available(self.state.font_index) {
            self.show_resolved()?;
        }
        Ok(())
    }

    fn timer_wake(
        &mut self,
        snapshot: &PersistentSnapshot,
    ) -> Result<Option<CycleOutcome>, EngineError> {
        let battery = self.measure_battery();
        if PowerScheduler::battery_critical(battery) {
            return self.low_battery_shutdown(battery).map(Some);
        }

        self.state = snapshot.render_state();
        self.debug_mode = snapshot.debug_mode;
        if self.settings.allow_different_font_on_wake {
            self.state.font_index = self.rng.usize(..self.fonts.len());
        } else if self.state.font_index >= self.fonts.len() {
            self.state.font_index = 0;
        }
        if self.settings.allow_different_mode_on_wake {
            self.state.view_mode = if self.rng.bool() {
                ViewMode::Bitmap
            } else {
                ViewMode::Outline
            };
        }
        self.state.codepoint = random_preferred(&self.ranges, &mut self.rng);
        info!(
            "Timer wake: font {}/{}, {:?}",
            self.state.font_index + 1,
            self.fonts.len(),
            self.state.view_mode
        );

        if self.load_first_available(self.state.font_index) {
            self.refresh.force_full_next();
            self.show_resolved()?;
        }
        self.scheduler.mark_unattended();
        Ok(None)
    }

    fn event_loop(&mut self) -> Result<CycleOutcome, EngineError> {
        loop {
            let now = self.board.now_ms();
            let sample = self.board.buttons();
            let commands = self.controls.poll(sample, now);
            if !commands.is_empty() {
                self.scheduler.note_input(now);
                for command in commands {
                    if let Some(outcome) = self.handle(command)? {
                        return Ok(outcome);
                    }
                }
                self.board.delay_ms(INPUT_SETTLE_MS);
            }

            let now = self.board.now_ms();
            if self.refresh.poll(&mut self.display, now)? {
                self.scheduler.note_full_refresh(now);
            }
            if self.scheduler.should_suspend(now) {
                return self.suspend();
            }
            self.board.delay_ms(IDLE_POLL_MS);
        }
    }

    fn handle(&mut self, command: Command) -> Result<Option<CycleOutcome>, EngineError> {
        debug!("Command: {:?}", command);
        match command {
            Command::NextFont => self.switch_font(1)?,
            Command::PreviousFont => self.switch_font(-1)?,
            Command::RandomGlyph => {
                self.state.codepoint = random_preferred(&self.ranges, &mut self.rng);
                self.show_resolved()?;
            }
            Command::ToggleViewMode => {
                self.state.view_mode = self.state.view_mode.toggled();
                info!("View mode: {:?}", self.state.view_mode);
                self.render_current()?;
            }
            Command::ToggleDebug => {
                self.debug_mode = !self.debug_mode;
                info!("Debug overlay {}", if self.debug_mode { "on" } else { "off" });
                self.render_current()?;
            }
            Command::Shutdown => return self.shutdown().map(Some),
        }
        Ok(None)
    }

    /// Step through the font list looking for a font that has the current
    /// codepoint. Without a match the font one step away is used and the
    /// resolver picks what it can show.
    fn switch_font(&mut self, step: isize) -> Result<(), EngineError> {
        let count = self.fonts.len();
        let current = self.state.font_index;
        let wanted = self.state.codepoint;
        let offset = |n: usize| (current as isize + step * n as isize).rem_euclid(count as isize) as usize;
        let target = offset(1);

        let mut found = false;
        for n in 1..count.max(2) {
            let index = offset(n);
            if let Err(e) = self.load_font(index) {
                warn!("Skipping font {}: {}", self.fonts[index].display_name, e);
                continue;
            }
            if self
                .font_engine
                .active_face()
                .is_some_and(|face| face.has_glyph(wanted))
            {
                found = true;
                break;
            }
        }

        if !found {
            debug!("No font has U+{:04X}, falling back to font {}", wanted, target + 1);
            if let Err(e) = self.load_font(target) {
                warn!("Font {} unavailable: {}", self.fonts[target].display_name, e);
                if self.load_font(current).is_err() {
                    return Ok(());
                }
            }
        }
        info!(
            "Font {}/{}: {}",
            self.state.font_index + 1,
            count,
            self.fonts[self.state.font_index].display_name
        );
        self.show_resolved()
    }

    /// Make font `index` the active one.
    fn load_font(&mut self, index: usize) -> Result<(), LoadError> {
        if self.font_engine.active_index() == Some(index) {
            self.state.font_index = index;
            return Ok(());
        }
        let record = &self.fonts[index];
        let source = self.cache.acquire(index, record)?;
        self.font_engine
            .load(index, source, &self.renderer.render_plan())?;
        self.state.font_index = index;
        Ok(())
    }

    /// Load `start`, or the first font after it that loads.
    fn load_first_available(&mut self, start: usize) -> bool {
        let count = self.fonts.len();
        for n in 0..count {
            let index = (start + n) % count;
            match self.load_font(index) {
                Ok(()) => return true,
                Err(e) => warn!("Font {} failed to load: {}", self.fonts[index].display_name, e),
            }
        }
        error!("No font could be loaded");
        false
    }

    /// Resolve the current codepoint and render it. A font with nothing to
    /// show hands over to the next one.
    fn show_resolved(&mut self) -> Result<(), EngineError> {
        let count = self.fonts.len();
        let start = self.state.font_index;
        for n in 0..count {
            let index = (start + n) % count;
            if n > 0 && self.load_font(index).is_err() {
                continue;
            }
            let Some(face) = self.font_engine.active_face() else {
                continue;
            };
            match resolve(self.state.codepoint, &self.ranges, face) {
                Ok(codepoint) => {
                    self.state.codepoint = codepoint;
                    return self.render_current();
                }
                Err(e) => warn!("{}: {}", self.fonts[index].display_name, e),
            }
        }
        error!("No font has a renderable glyph, nothing drawn");
        Ok(())
    }

    fn render_current(&mut self) -> Result<(), EngineError> {
        let overlay = if self.debug_mode {
            let now = self.board.now_ms();
            Some(DebugOverlay {
                battery_percent: self.measure_battery(),
                uptime_ms: self.scheduler.uptime_ms(now),
                partial_count: self.refresh.partial_count(),
            })
        } else {
            None
        };
        let frame = Frame {
            font_name: &self.fonts[self.state.font_index].display_name,
            codepoint: self.state.codepoint,
            view_mode: self.state.view_mode,
            overlay,
        };
        if let Err(e) = self
            .renderer
            .render(&mut self.canvas, &mut self.font_engine, &frame)
        {
            warn!("Render failed: {}", e);
            return Ok(());
        }

        let now = self.board.now_ms();
        let kind = self
            .refresh
            .on_render_complete(&mut self.display, &self.canvas, now)?;
        if kind == RefreshKind::Full {
            self.scheduler.note_full_refresh(now);
        }
        Ok(())
    }

    fn measure_battery(&mut self) -> f32 {
        let battery = self.battery;
        battery.measure(|| self.board.battery_millivolts())
    }

    fn suspend(&mut self) -> Result<CycleOutcome, EngineError> {
        let now = self.board.now_ms();
        let snapshot = self
            .scheduler
            .commit_suspend(&self.state, self.debug_mode, now);
        self.store.save(&snapshot)?;
        self.display.set_power(PanelPower::Standby)?;
        let sources = WakeSources::suspend(self.settings.wake_interval_minutes);
        info!(
            "Suspending after {}ms awake, timer wake in {} min",
            now, self.settings.wake_interval_minutes
        );
        self.board.suspend(sources);
        Ok(CycleOutcome::Suspended(sources))
    }

    fn shutdown(&mut self) -> Result<CycleOutcome, EngineError> {
        info!("Shutdown requested, timer wake disabled");
        let now = self.board.now_ms();
        let snapshot = self
            .scheduler
            .commit_suspend(&self.state, self.debug_mode, now);
        self.store.save(&snapshot)?;
        self.display.set_power(PanelPower::DeepSleep)?;
        let sources = WakeSources::input_only();
        self.board.power_off(sources);
        Ok(CycleOutcome::PoweredOff {
            reason: PowerOffReason::UserShutdown,
            sources,
        })
    }

    fn low_battery_shutdown(&mut self, percent: f32) -> Result<CycleOutcome, EngineError> {
        warn!("Battery at {:.1}%, shutting down", percent);
        self.renderer.draw_low_battery(&mut self.canvas);
        self.display.push(&self.canvas, UpdateMode::Full)?;
        self.board.delay_ms(LOW_BATTERY_NOTICE_MS);
        self.display.set_power(PanelPower::DeepSleep)?;
        let sources = WakeSources::none();
        self.board.power_off(sources);
        Ok(CycleOutcome::PoweredOff {
            reason: PowerOffReason::LowBattery,
            sources,
        })
    }

    fn halt(&mut self, reason: HaltReason) -> Result<CycleOutcome, EngineError> {
        error!("Halted: {}", reason);
        let (title, lines) = reason.notice();
        self.renderer.draw_notice(&mut self.canvas, title, &lines);
        self.display.push(&self.canvas, UpdateMode::Full)?;
        Ok(CycleOutcome::Halted(reason))
    }
}
