//! Board services the engine needs: clock, buttons, battery ADC, entropy and
//! the low-power transitions.
//!
//! On the device these map onto the MCU's timer, GPIO, ADC and sleep
//! controller. [`SimulatedBoard`] stands in for development on a host.

use crate::input::ButtonSample;
use crate::power::{WakeCause, WakeSources};
use log::info;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Hardware services consumed by the engine.
pub trait Board {
    /// Milliseconds since this run started.
    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u64);

    fn wake_cause(&self) -> WakeCause;

    /// One raw battery ADC reading in millivolts.
    fn battery_millivolts(&mut self) -> u32;

    /// Current button levels.
    fn buttons(&mut self) -> ButtonSample;

    /// Seed material for the glyph randomizer.
    fn entropy(&mut self) -> u64;

    /// Arm `sources` and enter low-power suspend. Ends the run.
    fn suspend(&mut self, sources: WakeSources);

    /// Arm `sources` and cut power. Ends the run.
    fn power_off(&mut self, sources: WakeSources);
}

/// Host stand-in: wall clock, no buttons pressed, fixed battery reading.
#[derive(Debug)]
pub struct SimulatedBoard {
    started: Instant,
    wake_cause: WakeCause,
    battery_mv: u32,
    /// Sources armed by the last suspend or power-off
    pub armed: Option<WakeSources>,
}

impl SimulatedBoard {
    pub fn new(wake_cause: WakeCause, battery_mv: u32) -> Self {
        Self {
            started: Instant::now(),
            wake_cause,
            battery_mv,
            armed: None,
        }
    }
}

impl Board for SimulatedBoard {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn wake_cause(&self) -> WakeCause {
        self.wake_cause
    }

    fn battery_millivolts(&mut self) -> u32 {
        self.battery_mv
    }

    fn buttons(&mut self) -> ButtonSample {
        ButtonSample::default()
    }

    fn entropy(&mut self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn suspend(&mut self, sources: WakeSources) {
        info!(
            "Simulated suspend: input wake {}, timer {:?} min",
            sources.input_pin, sources.timer_minutes
        );
        self.armed = Some(sources);
    }

    fn power_off(&mut self, sources: WakeSources) {
        info!(
            "Simulated power-off: input wake {}, timer {:?} min",
            sources.input_pin, sources.timer_minutes
        );
        self.armed = Some(sources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_board_reports_configuration() {
        let mut board = SimulatedBoard::new(WakeCause::TimerWake, 3900);
        assert_eq!(board.wake_cause(), WakeCause::TimerWake);
        assert_eq!(board.battery_millivolts(), 3900);
        assert_eq!(board.buttons(), ButtonSample::default());
        board.suspend(WakeSources::suspend(30));
        assert_eq!(board.armed, Some(WakeSources::suspend(30)));
    }
}
