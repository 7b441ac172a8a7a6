//! Command dispatcher and power state machine for the quote device.

use embedded_hal::delay::DelayNs;
use log::info;
use rand::RngCore;

use crate::{
    clock::{TimeKeeper, UNSET_DATE_TEXT, UNSET_TIME_TEXT},
    connectivity::NetworkLink,
    credentials::CandidateList,
    fortune,
    gesture::{ButtonLevels, GestureClassifier, GestureEvent},
    payload::{self, QuoteText},
    persist::{PersistentStore, RawStore},
    pipeline::{Collaborators, QuoteLibrary, QuotePipeline, QuoteSource},
    rate_gate::RatePolicy,
    render::Screen,
    settings::{OperationMode, Settings},
};

const LIVE_FRAME_MS: u64 = 1_000;

const READY_TITLE: &str = "Quotepad";
const READY_HINT: &str = "1: new  2: cached";
const FETCHING_TITLE: &str = "Fetching quote";
const FETCHING_HINT: &str = "Please wait";
const NO_CACHE_TITLE: &str = "No cached quote";
const NO_CACHE_HINT: &str = "Press 1 for a new one";
const SLEEP_TITLE: &str = "Sleeping";
const SLEEP_HINT: &str = "Press to wake";
const TIME_LABEL: &str = "Local time";
const DATE_LABEL: &str = "Today";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickResult {
    NoRender,
    RenderRequested,
    /// The session is over. Render once more, then power down.
    Sleep,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerState {
    /// Waiting for a gesture; the idle timer runs.
    Idle,
    /// Running a command.
    Active,
    /// Terminal for this session.
    Sleeping,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LiveKind {
    Time,
    Date,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum UiState {
    Ready,
    /// The busy screen is up; the pipeline runs on the next tick.
    Fetching,
    Scrolling {
        speed_ms: u16,
        started_ms: u64,
    },
    Notice {
        primary: &'static str,
        secondary: &'static str,
    },
    /// Redrawn every second until a button goes down.
    Live {
        kind: LiveKind,
    },
    Sleeping,
}

pub struct QuoteDevice<N, L, R, D, G>
where
    N: NetworkLink,
    L: QuoteLibrary,
    R: RawStore,
    D: DelayNs,
    G: RngCore,
{
    settings: Settings,
    io: Collaborators<N, L, D, G>,
    store: PersistentStore<R>,
    pipeline: QuotePipeline,
    clock: TimeKeeper,
    classifier: GestureClassifier,
    power: PowerState,
    ui: UiState,
    text: QuoteText,
    last_source: Option<QuoteSource>,
    last_activity_ms: Option<u64>,
    pending_redraw: bool,
    last_frame_slot: Option<u64>,
}

include!("view.rs");
include!("input.rs");
include!("runtime.rs");

#[cfg(test)]
mod tests;
