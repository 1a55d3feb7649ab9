//! Whole wake cycles against the fake board, simulated panel and in-memory
//! storage.

use super::fakes::{FakeBoard, FakeFace, FakeLoader, BOTH, CENTER, NEXT, PREVIOUS};
use crate::config::Config;
use crate::display::{PanelEvent, PanelPower, SimulatedPanel, UpdateMode};
use crate::engine::{CycleOutcome, Engine, HaltReason, PowerOffReason};
use crate::font_cache::tests::MemoryStorage;
use crate::power::{MemoryStore, PersistentSnapshot, WakeCause, WakeSources};
use crate::unicode_ranges::{enabled_ranges, CATALOG};
use crate::ViewMode;

type TestEngine = Engine<FakeBoard, SimulatedPanel, MemoryStorage, FakeLoader, MemoryStore>;

/// Build an engine whose font `i` is `faces[i]`.
fn engine(faces: Vec<FakeFace>, board: FakeBoard, store: MemoryStore) -> TestEngine {
    let (storage, fonts) = MemoryStorage::with_sizes(&vec![1_000; faces.len()]);
    let mut loader = FakeLoader::default();
    for (i, face) in faces.into_iter().enumerate() {
        loader.faces.insert(i as u8, face);
    }
    Engine::new(
        &Config::default(),
        fonts,
        board,
        SimulatedPanel::new(),
        storage,
        loader,
        store,
    )
}

fn retained(font_index: usize, codepoint: u32, view_mode: ViewMode) -> MemoryStore {
    MemoryStore {
        snapshot: Some(PersistentSnapshot {
            valid: true,
            font_index,
            codepoint,
            view_mode,
            accumulated_uptime_ms: 0,
            debug_mode: false,
        }),
        saves: 0,
    }
}

/// Panel events without the power transitions.
fn updates(engine: &TestEngine) -> Vec<PanelEvent> {
    engine
        .display()
        .events
        .iter()
        .copied()
        .filter(|e| !matches!(e, PanelEvent::Power(_)))
        .collect()
}

/// Cold start pushes the first frame at full quality, then every fifth font
/// switch clears ghosting, and ten idle seconds after the last full update the
/// device suspends with button and timer wake armed.
#[test]
fn cold_start_session_coalesces_partials_and_suspends() {
    let mut board = FakeBoard::new(WakeCause::ColdStart);
    for i in 0..10 {
        board = board.press(1_000 + 500 * i, 100, NEXT);
    }
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::latin()],
        board,
        MemoryStore::default(),
    );

    let outcome = engine.run().unwrap();
    assert_eq!(outcome, CycleOutcome::Suspended(WakeSources::suspend(15)));

    let partial = PanelEvent::Push(UpdateMode::Partial);
    let mut expected = vec![PanelEvent::Push(UpdateMode::Full)];
    for _ in 0..2 {
        expected.extend([partial; 5]);
        expected.push(PanelEvent::UpdateFull);
    }
    assert_eq!(updates(&engine), expected);

    // Last press (and its full update) at 5.5 s, suspend ten seconds later
    assert_eq!(engine.board().now, 15_500);
    assert_eq!(engine.board().suspended, Some(WakeSources::suspend(15)));
    assert_eq!(
        engine.display().events.last(),
        Some(&PanelEvent::Power(PanelPower::Standby))
    );

    let saved = engine.store().snapshot.unwrap();
    assert!(saved.valid);
    assert_eq!(saved.font_index, 0, "ten switches between two fonts");
    assert_eq!(saved.accumulated_uptime_ms, 15_500);
    assert_eq!(engine.store().saves, 1);
    let ranges = enabled_ranges(&Config::default().specimen.range_enabled);
    assert!(ranges.iter().any(|r| r.contains(saved.codepoint)));
}

/// A cold start drops whatever a previous session retained.
#[test]
fn cold_start_ignores_retained_state() {
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::latin()],
        FakeBoard::new(WakeCause::ColdStart),
        retained(1, 0x5A, ViewMode::Outline),
    );
    engine.run().unwrap();
    let saved = engine.store().snapshot.unwrap();
    assert_eq!(saved.font_index, 0);
    assert_eq!(saved.view_mode, ViewMode::Bitmap);
    assert_eq!(saved.accumulated_uptime_ms, 10_000);
}

/// A timer wake renders a fresh specimen at full quality and goes straight
/// back to sleep after the settle delay.
#[test]
fn timer_wake_renders_once_and_suspends_quickly() {
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::latin(), FakeFace::latin()],
        FakeBoard::new(WakeCause::TimerWake),
        retained(0, 0x41, ViewMode::Bitmap),
    );
    let outcome = engine.run().unwrap();
    assert_eq!(outcome, CycleOutcome::Suspended(WakeSources::suspend(15)));
    assert_eq!(updates(&engine), vec![PanelEvent::Push(UpdateMode::Full)]);
    assert_eq!(
        engine.display().events.first(),
        Some(&PanelEvent::Power(PanelPower::Active))
    );
    assert_eq!(engine.board().now, 600);
    assert!(engine.board().battery_reads > 0);
    assert_eq!(engine.store().saves, 1);
}

/// Pressing a button during an unattended cycle switches to the normal idle
/// rules.
#[test]
fn input_during_timer_wake_keeps_device_awake() {
    let board = FakeBoard::new(WakeCause::TimerWake).press(300, 100, CENTER);
    let mut engine = engine(
        vec![FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    // The short press renders a partial at 400 ms; its full update comes ten
    // seconds later and the idle timeout ten seconds after that
    assert_eq!(engine.board().now, 20_400);
}

/// A critical battery on timer wake shows the notice and powers off with no
/// wake source armed.
#[test]
fn low_battery_timer_wake_powers_off() {
    let mut engine = engine(
        vec![FakeFace::latin()],
        FakeBoard::new(WakeCause::TimerWake).with_battery(3_340),
        retained(0, 0x41, ViewMode::Bitmap),
    );
    let outcome = engine.run().unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::PoweredOff {
            reason: PowerOffReason::LowBattery,
            sources: WakeSources::none(),
        }
    );
    assert_eq!(
        engine.display().events,
        vec![
            PanelEvent::Power(PanelPower::Active),
            PanelEvent::Push(UpdateMode::Full),
            PanelEvent::Power(PanelPower::DeepSleep),
        ]
    );
    assert_eq!(engine.board().powered_off, Some(WakeSources::none()));
    assert_eq!(engine.store().saves, 0);
    assert!(engine.canvas().inked_pixels() > 0);
}

/// A button wake restores the retained view and clamps a font index that no
/// longer exists.
#[test]
fn input_wake_restores_snapshot() {
    let mut store = retained(7, 0x42, ViewMode::Outline);
    if let Some(snapshot) = store.snapshot.as_mut() {
        snapshot.debug_mode = true;
        snapshot.accumulated_uptime_ms = 5_000;
    }
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::latin()],
        FakeBoard::new(WakeCause::InputWake),
        store,
    );
    engine.run().unwrap();

    let state = engine.state();
    assert_eq!(state.font_index, 0);
    assert_eq!(state.codepoint, 0x42);
    assert_eq!(state.view_mode, ViewMode::Outline);
    assert!(engine.debug_mode());
    // Debug overlay reads the battery
    assert!(engine.board().battery_reads > 0);

    // Panel leaves standby, the restored frame goes out as a partial, the
    // controller clears it ten seconds later and the device sleeps after
    // another ten
    assert_eq!(
        engine.display().events,
        vec![
            PanelEvent::Power(PanelPower::Active),
            PanelEvent::Push(UpdateMode::Partial),
            PanelEvent::UpdateFull,
            PanelEvent::Power(PanelPower::Standby),
        ]
    );
    assert_eq!(engine.board().now, 20_000);
    assert_eq!(engine.store().snapshot.unwrap().accumulated_uptime_ms, 25_000);
}

/// A wake with nothing retained falls back to the cold-start path.
#[test]
fn input_wake_without_snapshot_starts_cold() {
    let mut engine = engine(
        vec![FakeFace::latin()],
        FakeBoard::new(WakeCause::InputWake),
        MemoryStore::default(),
    );
    engine.run().unwrap();
    assert_eq!(updates(&engine)[0], PanelEvent::Push(UpdateMode::Full));
}

#[test]
fn zero_fonts_halts_with_notice() {
    let mut engine = engine(
        Vec::new(),
        FakeBoard::new(WakeCause::ColdStart),
        MemoryStore::default(),
    );
    assert_eq!(engine.run().unwrap(), CycleOutcome::Halted(HaltReason::NoFonts));
    assert_eq!(engine.display().events, vec![PanelEvent::Push(UpdateMode::Full)]);
    assert!(engine.canvas().inked_pixels() > 0);
    assert!(engine.board().suspended.is_none());
}

#[test]
fn unreadable_initial_font_halts() {
    // Font 0's bytes map to no known face
    let (storage, fonts) = MemoryStorage::with_sizes(&[1_000]);
    let mut engine = Engine::new(
        &Config::default(),
        fonts,
        FakeBoard::new(WakeCause::ColdStart),
        SimulatedPanel::new(),
        storage,
        FakeLoader::default(),
        MemoryStore::default(),
    );
    assert!(matches!(
        engine.run().unwrap(),
        CycleOutcome::Halted(HaltReason::FontLoad(_))
    ));
}

/// Font switching skips fonts that lack the current codepoint, in either
/// direction.
#[test]
fn font_switch_searches_for_current_codepoint() {
    let board = FakeBoard::new(WakeCause::InputWake)
        .press(1_000, 100, NEXT)
        .press(2_000, 100, PREVIOUS);
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::greek(), FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    // 0 -> (skip greek) -> 2 -> (skip greek) -> 0
    assert_eq!(engine.state().font_index, 0);
    assert_eq!(engine.state().codepoint, 0x41);
    assert_eq!(updates(&engine).len(), 4, "restore, two switches, one full");
}

#[test]
fn font_switch_stops_on_the_first_match() {
    let board = FakeBoard::new(WakeCause::InputWake).press(1_000, 100, NEXT);
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::greek(), FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    assert_eq!(engine.state().font_index, 2);
}

/// When no other font has the codepoint the next font is used anyway and
/// the resolver picks something it can show.
#[test]
fn font_switch_without_match_uses_next_font() {
    let board = FakeBoard::new(WakeCause::InputWake).press(1_000, 100, NEXT);
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::greek()],
        board,
        retained(1, 0x391, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    assert_eq!(engine.state().font_index, 0);
    assert_eq!(engine.state().codepoint, CATALOG[0].start);
}

/// A font with no renderable glyph hands over to the next one.
#[test]
fn exhausted_font_is_skipped() {
    let mut engine = engine(
        vec![FakeFace::empty(), FakeFace::latin()],
        FakeBoard::new(WakeCause::ColdStart),
        MemoryStore::default(),
    );
    engine.run().unwrap();
    assert_eq!(engine.state().font_index, 1);
    assert_eq!(updates(&engine)[0], PanelEvent::Push(UpdateMode::Full));
}

/// With every font exhausted nothing is drawn, and the device still sleeps.
#[test]
fn all_fonts_exhausted_renders_nothing() {
    let mut engine = engine(
        vec![FakeFace::empty()],
        FakeBoard::new(WakeCause::ColdStart),
        MemoryStore::default(),
    );
    let outcome = engine.run().unwrap();
    assert!(matches!(outcome, CycleOutcome::Suspended(_)));
    assert!(updates(&engine).is_empty());
    assert_eq!(engine.board().now, 10_000);
}

/// A press that draws nothing still lets the idle timeout run from the press.
#[test]
fn press_without_a_render_still_suspends() {
    let board = FakeBoard::new(WakeCause::InputWake).press(1_000, 100, CENTER);
    let mut engine = engine(
        vec![FakeFace::empty()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    let outcome = engine.run().unwrap();
    assert_eq!(outcome, CycleOutcome::Suspended(WakeSources::suspend(15)));
    assert!(updates(&engine).is_empty());
    // Released at 1.1 s, asleep ten seconds later
    assert_eq!(engine.board().now, 11_100);
    assert_eq!(engine.store().saves, 1);
}

#[test]
fn long_press_toggles_view_mode() {
    let board = FakeBoard::new(WakeCause::InputWake).press(1_000, 1_000, CENTER);
    let mut engine = engine(
        vec![FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    assert_eq!(engine.state().view_mode, ViewMode::Outline);
    assert_eq!(engine.state().codepoint, 0x41);
}

#[test]
fn both_font_buttons_toggle_persisted_debug_mode() {
    let board = FakeBoard::new(WakeCause::InputWake).press(1_000, 100, BOTH);
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    assert!(engine.debug_mode());
    assert_eq!(engine.state().font_index, 0, "no font switch");
    assert!(engine.store().snapshot.unwrap().debug_mode);
}

/// Holding the multi-function button for five seconds powers off with only
/// the button wake armed.
#[test]
fn long_hold_shuts_down_without_timer_wake() {
    let board = FakeBoard::new(WakeCause::InputWake).press(1_000, 8_000, CENTER);
    let mut engine = engine(
        vec![FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    let outcome = engine.run().unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::PoweredOff {
            reason: PowerOffReason::UserShutdown,
            sources: WakeSources::input_only(),
        }
    );
    assert_eq!(engine.board().now, 6_000);
    assert_eq!(engine.board().powered_off, Some(WakeSources::input_only()));
    assert!(engine.board().suspended.is_none());
    assert_eq!(engine.store().saves, 1);
    assert_eq!(
        engine.display().events.last(),
        Some(&PanelEvent::Power(PanelPower::DeepSleep))
    );
}

/// Switching back to a recently used font is served from the byte cache.
#[test]
fn font_bytes_stay_cached_between_switches() {
    let mut board = FakeBoard::new(WakeCause::InputWake);
    for i in 0..4 {
        board = board.press(1_000 + 500 * i, 100, NEXT);
    }
    let mut engine = engine(
        vec![FakeFace::latin(), FakeFace::latin()],
        board,
        retained(0, 0x41, ViewMode::Bitmap),
    );
    engine.run().unwrap();
    let cache = engine.font_cache();
    assert_eq!(cache.len(), 2);
    assert!(cache.total_bytes() <= cache.budget_bytes());
}
