use std::string::{String, ToString};

use rand::rngs::mock::StepRng;

use super::*;
use crate::{
    connectivity::tests::{NoopDelay, ScriptedNetwork},
    fortune::FORTUNES,
    persist::{MemoryStore, QUOTE_SLOT, STORE_BYTES},
    pipeline::tests::{LIVE_BODY, MapLibrary, QUOTE_URL, candidates, io, settings},
};

type TestDevice =
    QuoteDevice<ScriptedNetwork, MapLibrary, MemoryStore<STORE_BYTES>, NoopDelay, StepRng>;

const RELEASED: ButtonLevels = ButtonLevels::RELEASED;
const B1: ButtonLevels = ButtonLevels {
    button1: true,
    button2: false,
};
const B2: ButtonLevels = ButtonLevels {
    button1: false,
    button2: true,
};
const BOTH: ButtonLevels = ButtonLevels {
    button1: true,
    button2: true,
};

fn device(config: Settings, network: ScriptedNetwork, library: MapLibrary) -> TestDevice {
    let store = PersistentStore::new(MemoryStore::new());
    let mut device = QuoteDevice::new(
        config,
        io(network, library),
        store,
        candidates(&["home"]),
        QUOTE_URL,
    );
    // Clear the wake press guard.
    device.tick(RELEASED, 0);
    device
}

fn offline_device(files: &[(u16, &'static str)]) -> TestDevice {
    device(
        settings(OperationMode::Standard, true),
        ScriptedNetwork::reachable(&[]),
        MapLibrary::with(files),
    )
}

/// Holds `levels` from `start_ms` for `held_ms`, sampling every 50 ms, then
/// releases. Returns the result of the last tick.
fn press(device: &mut TestDevice, levels: ButtonLevels, start_ms: u64, held_ms: u64) -> TickResult {
    let mut t = start_ms;
    while t < start_ms + held_ms {
        if device.tick(levels, t) == TickResult::Sleep {
            return TickResult::Sleep;
        }
        t += 50;
    }
    device.tick(RELEASED, start_ms + held_ms)
}

fn screen(device: &TestDevice, now_ms: u64) -> (String, String) {
    let mut out = None;
    device.with_screen(now_ms, |screen| {
        out = Some(match screen {
            Screen::Text { primary, secondary } => (primary.to_string(), secondary.to_string()),
            Screen::Scrolling { text, .. } => (text.to_string(), String::new()),
        })
    });
    out.unwrap()
}

#[test]
fn boots_to_ready_screen_and_ignores_the_wake_press() {
    let store = PersistentStore::new(MemoryStore::new());
    let mut device: TestDevice = QuoteDevice::new(
        settings(OperationMode::Standard, true),
        io(ScriptedNetwork::reachable(&[]), MapLibrary::default()),
        store,
        candidates(&[]),
        QUOTE_URL,
    );

    assert_eq!(device.tick(B1, 0), TickResult::RenderRequested);
    assert_eq!(device.tick(RELEASED, 300), TickResult::NoRender);
    assert_eq!(screen(&device, 300).0, READY_TITLE);
    assert_eq!(device.power_state(), PowerState::Idle);
}

#[test]
fn offline_button1_reads_storage_and_caches_it() {
    let mut device = offline_device(&[(7, "Hello")]);

    assert_eq!(press(&mut device, B1, 100, 200), TickResult::RenderRequested);
    assert_eq!(screen(&device, 300).0, FETCHING_TITLE);
    assert_eq!(device.power_state(), PowerState::Active);

    assert_eq!(device.tick(RELEASED, 310), TickResult::RenderRequested);
    assert_eq!(screen(&device, 310).0, "Hello");
    assert_eq!(device.last_source(), Some(QuoteSource::Storage));
    assert_eq!(device.store().read_str::<32>(QUOTE_SLOT).as_str(), "Hello");
    assert_eq!(device.power_state(), PowerState::Idle);
    assert_eq!(device.effective_mode(), OperationMode::StorageOnly);
}

#[test]
fn live_quote_is_shown_and_cached() {
    let network = ScriptedNetwork::reachable(&["home"]).with_response(200, LIVE_BODY);
    let mut device = device(
        settings(OperationMode::Standard, true),
        network,
        MapLibrary::default(),
    );

    press(&mut device, B1, 100, 200);
    device.tick(RELEASED, 310);

    assert_eq!(device.last_source(), Some(QuoteSource::Network));
    assert_eq!(screen(&device, 310).0, "\"Live quote.\" - Author");
    assert!(device.clock().is_synced());
}

#[test]
fn scrolling_quote_redraws_once_per_pixel_period() {
    let mut device = offline_device(&[(7, "Hello")]);
    press(&mut device, B1, 100, 200);
    assert_eq!(device.tick(RELEASED, 310), TickResult::RenderRequested);

    // Default quote speed is 35 ms per pixel.
    assert_eq!(device.tick(RELEASED, 320), TickResult::NoRender);
    assert_eq!(device.tick(RELEASED, 345), TickResult::RenderRequested);
    assert_eq!(device.tick(RELEASED, 350), TickResult::NoRender);
}

#[test]
fn button2_replays_cache_without_fetching() {
    let mut device = offline_device(&[(7, "Hello")]);

    assert_eq!(press(&mut device, B2, 100, 200), TickResult::RenderRequested);
    assert_eq!(screen(&device, 300).0, NO_CACHE_TITLE);

    press(&mut device, B1, 400, 200);
    device.tick(RELEASED, 610);
    let attempts = device.io().network.attempts.len();

    press(&mut device, B2, 700, 200);
    assert_eq!(screen(&device, 900).0, "Hello");
    assert_eq!(device.last_source(), Some(QuoteSource::Cache));
    assert_eq!(device.io().network.attempts.len(), attempts);
    assert_eq!(device.io().library.reads.len(), 1);
}

#[test]
fn both_short_shows_a_fortune() {
    let mut device = offline_device(&[]);

    press(&mut device, BOTH, 100, 200);

    assert_eq!(screen(&device, 300).0, FORTUNES[0]);
    assert_eq!(device.power_state(), PowerState::Idle);
}

#[test]
fn both_long_shows_credits() {
    let mut device = offline_device(&[]);

    press(&mut device, BOTH, 100, 1_500);

    assert_eq!(screen(&device, 1_600).0, fortune::CREDITS);
}

#[test]
fn both_long_past_three_thresholds_sleeps_instead_of_credits() {
    let mut device = offline_device(&[]);

    assert_eq!(press(&mut device, BOTH, 100, 4_000), TickResult::Sleep);
    assert_eq!(device.power_state(), PowerState::Sleeping);
    assert_eq!(screen(&device, 4_100), (SLEEP_TITLE.into(), SLEEP_HINT.into()));

    // Terminal for the session.
    assert_eq!(device.tick(B1, 5_000), TickResult::NoRender);
    assert_eq!(device.tick(RELEASED, 5_100), TickResult::NoRender);
}

#[test]
fn idle_timeout_puts_the_device_to_sleep() {
    let mut device = offline_device(&[]);

    assert_eq!(device.tick(RELEASED, 29_999), TickResult::NoRender);
    assert_eq!(device.tick(RELEASED, 30_000), TickResult::Sleep);
}

#[test]
fn activity_restarts_the_idle_timer() {
    let mut device = offline_device(&[]);

    press(&mut device, B2, 20_000, 200);
    assert_eq!(device.tick(RELEASED, 30_000), TickResult::NoRender);
    assert_eq!(device.tick(RELEASED, 50_199), TickResult::NoRender);
    assert_eq!(device.tick(RELEASED, 50_200), TickResult::Sleep);
}

#[test]
fn live_clock_runs_until_a_press_and_consumes_it() {
    let network = ScriptedNetwork::reachable(&["home"]);
    let mut device = device(
        settings(OperationMode::Standard, true),
        network,
        MapLibrary::default(),
    );

    press(&mut device, B1, 100, 1_500);
    // Synced to 2024-02-29 13:45:07 UTC at the release tick.
    assert_eq!(screen(&device, 1_600), ("13:45:07".into(), TIME_LABEL.into()));
    assert_eq!(device.power_state(), PowerState::Active);

    // Well past the idle timeout, still showing the clock.
    assert_eq!(device.tick(RELEASED, 61_600), TickResult::RenderRequested);
    assert_eq!(screen(&device, 61_600).0, "13:46:07");

    // The cancelling press does not become a command.
    device.tick(B2, 62_000);
    assert_eq!(screen(&device, 62_000).0, READY_TITLE);
    device.tick(RELEASED, 62_200);
    assert_eq!(screen(&device, 62_200).0, READY_TITLE);
    assert_eq!(device.power_state(), PowerState::Idle);
}

#[test]
fn cancelling_press_can_still_force_sleep() {
    let network = ScriptedNetwork::reachable(&["home"]);
    let mut device = device(
        settings(OperationMode::Standard, true),
        network,
        MapLibrary::default(),
    );

    press(&mut device, B2, 100, 1_500);
    assert_eq!(press(&mut device, B1, 2_000, 3_500), TickResult::Sleep);
}

#[test]
fn date_without_any_time_source_reads_not_set() {
    let mut device = device(
        settings(OperationMode::StorageOnly, true),
        ScriptedNetwork::reachable(&["home"]),
        MapLibrary::default(),
    );

    press(&mut device, B2, 100, 1_500);

    assert_eq!(screen(&device, 1_600), (UNSET_DATE_TEXT.into(), DATE_LABEL.into()));
    assert!(device.io().network.attempts.is_empty());
}
