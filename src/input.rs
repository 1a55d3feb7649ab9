//! # Buttons and Battery
//!
//! Buttons are sampled once per loop iteration and turned into commands by
//! comparing consecutive samples. Nothing here is interrupt driven, so the
//! timing is fully determined by the timestamps passed in.
//!
//! ## Controls
//! - **Previous / next** (wheel down / up): one command per press edge
//! - **Both together**: toggle the debug overlay
//! - **Center push**: short press = random glyph, long press (≥ 800 ms) =
//!   toggle bitmap/outline view, hold ≥ 5 s = shut down (fires while held)

use log::debug;

/// Hold time that turns a press into a long press.
pub const LONG_PRESS_MS: u64 = 800;

/// Hold time that triggers shutdown, fired as soon as it is crossed.
pub const SHUTDOWN_HOLD_MS: u64 = 5_000;

/// Raw button levels for one loop iteration (`true` = pressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonSample {
    pub previous: bool,
    pub next: bool,
    pub center: bool,
}

/// Classified press of the multi-function button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Short,
    Long,
    Shutdown,
}

/// What the user asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    PreviousFont,
    NextFont,
    RandomGlyph,
    ToggleViewMode,
    ToggleDebug,
    Shutdown,
}

/// Rising-edge detector for a discrete button.
#[derive(Debug, Default, Clone)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    /// True on the sample where the button goes from released to pressed.
    pub fn rising(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.last;
        self.last = pressed;
        edge
    }
}

/// Press-duration classifier for the multi-function button.
#[derive(Debug, Default, Clone)]
pub struct ButtonTracker {
    pressed: bool,
    pressed_at: u64,
    shutdown_fired: bool,
}

impl ButtonTracker {
    pub fn update(&mut self, pressed: bool, now: u64) -> Option<Gesture> {
        match (self.pressed, pressed) {
            (false, true) => {
                self.pressed = true;
                self.pressed_at = now;
                self.shutdown_fired = false;
                None
            }
            (true, true) => {
                if !self.shutdown_fired && now.saturating_sub(self.pressed_at) >= SHUTDOWN_HOLD_MS {
                    self.shutdown_fired = true;
                    return Some(Gesture::Shutdown);
                }
                None
            }
            (true, false) => {
                self.pressed = false;
                if self.shutdown_fired {
                    return None;
                }
                let held = now.saturating_sub(self.pressed_at);
                if held >= LONG_PRESS_MS {
                    Some(Gesture::Long)
                } else {
                    Some(Gesture::Short)
                }
            }
            (false, false) => None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// Turns button samples into commands.
#[derive(Debug, Default, Clone)]
pub struct Controls {
    previous: EdgeDetector,
    next: EdgeDetector,
    center: ButtonTracker,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample; returns the commands it completes, in the order they
    /// should be handled.
    pub fn poll(&mut self, sample: ButtonSample, now: u64) -> Vec<Command> {
        let mut commands = Vec::new();

        let previous = self.previous.rising(sample.previous);
        let next = self.next.rising(sample.next);
        if (previous || next) && sample.previous && sample.next {
            commands.push(Command::ToggleDebug);
        } else if previous {
            commands.push(Command::PreviousFont);
        } else if next {
            commands.push(Command::NextFont);
        }

        match self.center.update(sample.center, now) {
            Some(Gesture::Short) => commands.push(Command::RandomGlyph),
            Some(Gesture::Long) => commands.push(Command::ToggleViewMode),
            Some(Gesture::Shutdown) => commands.push(Command::Shutdown),
            None => {}
        }

        if !commands.is_empty() {
            debug!("Input at {}ms: {:?}", now, commands);
        }
        commands
    }
}

/// Maps averaged battery voltage onto a 0–100 % scale.
#[derive(Debug, Clone, Copy)]
pub struct BatteryMonitor {
    pub empty_mv: u32,
    pub full_mv: u32,
    /// Readings averaged per measurement
    pub samples: usize,
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self {
            empty_mv: 3300,
            full_mv: 4200,
            samples: 8,
        }
    }
}

impl BatteryMonitor {
    pub fn new(empty_mv: u32, full_mv: u32) -> Self {
        Self {
            empty_mv,
            full_mv,
            ..Self::default()
        }
    }

    /// Linear percentage for a voltage, clamped to 0–100.
    pub fn percentage(&self, millivolts: u32) -> f32 {
        if millivolts >= self.full_mv {
            return 100.0;
        }
        if millivolts <= self.empty_mv || self.full_mv <= self.empty_mv {
            return 0.0;
        }
        (millivolts - self.empty_mv) as f32 / (self.full_mv - self.empty_mv) as f32 * 100.0
    }

    /// Average `samples` readings from `read` and convert to a percentage.
    pub fn measure(&self, mut read: impl FnMut() -> u32) -> f32 {
        let count = self.samples.max(1);
        let total: u64 = (0..count).map(|_| u64::from(read())).sum();
        let average = (total / count as u64) as u32;
        let percentage = self.percentage(average);
        debug!("Battery: {}mV average -> {:.1}%", average, percentage);
        percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center(pressed: bool) -> ButtonSample {
        ButtonSample {
            center: pressed,
            ..ButtonSample::default()
        }
    }

    #[test]
    fn short_and_long_press_are_classified_on_release() {
        let mut controls = Controls::new();
        assert!(controls.poll(center(true), 0).is_empty());
        assert!(controls.poll(center(true), 500).is_empty());
        assert_eq!(controls.poll(center(false), 799), vec![Command::RandomGlyph]);

        assert!(controls.poll(center(true), 1_000).is_empty());
        assert_eq!(controls.poll(center(false), 1_800), vec![Command::ToggleViewMode]);
    }

    #[test]
    fn shutdown_fires_while_held_and_only_once() {
        let mut tracker = ButtonTracker::default();
        assert_eq!(tracker.update(true, 0), None);
        assert_eq!(tracker.update(true, 4_999), None);
        assert_eq!(tracker.update(true, 5_000), Some(Gesture::Shutdown));
        assert_eq!(tracker.update(true, 6_000), None);
        // Release after shutdown does not also count as a long press
        assert_eq!(tracker.update(false, 6_500), None);
        assert!(!tracker.is_pressed());
    }

    #[test]
    fn font_buttons_fire_on_press_edge_only() {
        let mut controls = Controls::new();
        let next = ButtonSample {
            next: true,
            ..ButtonSample::default()
        };
        assert_eq!(controls.poll(next, 0), vec![Command::NextFont]);
        assert!(controls.poll(next, 50).is_empty());
        assert!(controls.poll(ButtonSample::default(), 100).is_empty());
        assert_eq!(controls.poll(next, 150), vec![Command::NextFont]);
    }

    #[test]
    fn both_font_buttons_toggle_debug() {
        let mut controls = Controls::new();
        let previous = ButtonSample {
            previous: true,
            ..ButtonSample::default()
        };
        let both = ButtonSample {
            previous: true,
            next: true,
            center: false,
        };
        assert_eq!(controls.poll(previous, 0), vec![Command::PreviousFont]);
        assert_eq!(controls.poll(both, 50), vec![Command::ToggleDebug]);
        assert!(controls.poll(both, 100).is_empty());
    }

    #[test]
    fn battery_percentage_is_linear_and_clamped() {
        let battery = BatteryMonitor::default();
        assert_eq!(battery.percentage(4300), 100.0);
        assert_eq!(battery.percentage(3200), 0.0);
        assert!((battery.percentage(3750) - 50.0).abs() < 1e-4);
        // 5 % threshold
        assert!(battery.percentage(3344) < 5.0);
        assert!(battery.percentage(3346) > 5.0);
    }

    #[test]
    fn battery_measurement_averages_readings() {
        let battery = BatteryMonitor::default();
        let mut readings = [3700u32, 3800].into_iter().cycle();
        let percentage = battery.measure(|| readings.next().unwrap_or(0));
        assert!((percentage - 50.0).abs() < 1e-4);
    }
}
