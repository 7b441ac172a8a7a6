//! Mode-driven quote acquisition: network, cache, removable storage, sentinel.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{info, warn};
use rand::{Rng, RngCore};

use crate::clock::TimeKeeper;
use crate::connectivity::{ConnectivityManager, NetworkLink};
use crate::credentials::CandidateList;
use crate::error::QuoteError;
use crate::payload::{self, QUOTE_TEXT_BYTES, QuoteText};
use crate::persist::{MAX_SLOT_PAYLOAD, PersistentStore, QUOTE_SLOT, RawStore};
use crate::rate_gate::{self, RateGate, RatePolicy, RateWatermark};
use crate::settings::{OperationMode, Settings};

pub const SENTINEL_TEXT: &str = "Quote temporarily unavailable";

/// Upper bound on a live response body.
pub const RESPONSE_BYTES: usize = 1_024;

/// Removable storage holding one quote per numbered file.
pub trait QuoteLibrary {
    type Error: Debug;

    /// Reads quote file `index` into `buf`; returns the number of bytes read.
    fn read_quote(&mut self, index: u16, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Everything the pipeline drives but does not own the semantics of.
pub struct Collaborators<N, L, D, G> {
    pub network: N,
    pub library: L,
    pub delay: D,
    pub rng: G,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteSource {
    Network,
    Cache,
    Storage,
    Sentinel,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AcquiredQuote {
    pub text: QuoteText,
    pub source: QuoteSource,
}

impl AcquiredQuote {
    fn new(text: &str, source: QuoteSource) -> Self {
        let mut owned = QuoteText::new();
        payload::push_truncated(&mut owned, text);
        Self {
            text: owned,
            source,
        }
    }

    pub fn sentinel() -> Self {
        Self::new(SENTINEL_TEXT, QuoteSource::Sentinel)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LiveFetch {
    RateLimited,
    Failed(QuoteError),
}

#[derive(Debug)]
pub struct QuotePipeline {
    mode: OperationMode,
    cache_enabled: bool,
    index_min: u16,
    index_max: u16,
    url: &'static str,
    gate: RateGate,
    connectivity: ConnectivityManager,
    candidates: CandidateList,
}

impl QuotePipeline {
    pub fn new(settings: &Settings, url: &'static str, candidates: CandidateList) -> Self {
        Self {
            mode: settings.mode,
            cache_enabled: settings.cache_enabled,
            index_min: settings.quote_index_min,
            index_max: settings.quote_index_max,
            url,
            gate: RateGate::default(),
            connectivity: ConnectivityManager::new(settings.join_timeout_ms),
            candidates,
        }
    }

    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.gate = RateGate::new(policy);
        self
    }

    /// The session's mode after any network degradation.
    pub const fn effective_mode(&self) -> OperationMode {
        self.mode
    }

    pub const fn connectivity(&self) -> &ConnectivityManager {
        &self.connectivity
    }

    /// Produces a quote under the effective mode. Never fails; the worst case
    /// is the sentinel text.
    pub fn acquire<N, L, D, G, R>(
        &mut self,
        io: &mut Collaborators<N, L, D, G>,
        store: &mut PersistentStore<R>,
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> AcquiredQuote
    where
        N: NetworkLink,
        L: QuoteLibrary,
        D: DelayNs,
        G: RngCore,
        R: RawStore,
    {
        let quote = self.select(io, store, clock, now_ms);
        info!(
            "pipeline: quote source={:?} mode={:?} bytes={}",
            quote.source,
            self.mode,
            quote.text.len()
        );
        quote
    }

    fn select<N, L, D, G, R>(
        &mut self,
        io: &mut Collaborators<N, L, D, G>,
        store: &mut PersistentStore<R>,
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> AcquiredQuote
    where
        N: NetworkLink,
        L: QuoteLibrary,
        D: DelayNs,
        G: RngCore,
        R: RawStore,
    {
        let mut rate_limited = false;

        if self.mode.uses_network() {
            match self.fetch_live(io, store, clock, now_ms) {
                Ok(text) => return AcquiredQuote::new(&text, QuoteSource::Network),
                Err(LiveFetch::RateLimited) => {
                    info!("pipeline: live fetch already done today");
                    rate_limited = true;
                }
                Err(LiveFetch::Failed(err)) => {
                    warn!("pipeline: live fetch failed err={}", err);
                }
            }
        }

        if self.mode.is_cache_only() {
            return self.cached_quote(store).unwrap_or_else(AcquiredQuote::sentinel);
        }

        // Today's live quote is already in the cache.
        if rate_limited && self.cache_enabled {
            if let Some(cached) = self.cached_quote(store) {
                return cached;
            }
        }

        match self.read_storage(io) {
            Ok(text) => {
                if self.cache_enabled {
                    let _ = store.write_str(QUOTE_SLOT, &text);
                }
                AcquiredQuote::new(&text, QuoteSource::Storage)
            }
            Err(_) => AcquiredQuote::sentinel(),
        }
    }

    /// The cached quote, bypassing every other source.
    pub fn cached_quote<R: RawStore>(&self, store: &PersistentStore<R>) -> Option<AcquiredQuote> {
        let text: String<MAX_SLOT_PAYLOAD> = store.read_str(QUOTE_SLOT);
        if text.is_empty() {
            None
        } else {
            Some(AcquiredQuote::new(&text, QuoteSource::Cache))
        }
    }

    /// Makes sure the wall clock is known, joining the network if the mode
    /// allows it. Returns whether the clock is synchronised afterwards.
    pub fn ensure_clock<N, L, D, G, R>(
        &mut self,
        io: &mut Collaborators<N, L, D, G>,
        store: &mut PersistentStore<R>,
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> bool
    where
        N: NetworkLink,
        D: DelayNs,
        R: RawStore,
    {
        if clock.is_synced() || !self.mode.uses_network() {
            return clock.is_synced();
        }

        if !self.connect(io, store, clock, now_ms) {
            return false;
        }
        if !clock.is_synced() {
            crate::connectivity::sync_time(&mut io.network, clock, now_ms);
        }
        clock.is_synced()
    }

    fn connect<N, L, D, G, R>(
        &mut self,
        io: &mut Collaborators<N, L, D, G>,
        store: &mut PersistentStore<R>,
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> bool
    where
        N: NetworkLink,
        D: DelayNs,
        R: RawStore,
    {
        let outcome = self.connectivity.ensure_connected(
            &mut io.network,
            &mut io.delay,
            store,
            &self.candidates,
            clock,
            now_ms,
        );

        if !outcome.joined {
            let degraded = self.mode.without_network();
            info!(
                "pipeline: no network; mode {:?} -> {:?} for this session",
                self.mode, degraded
            );
            self.mode = degraded;
        }
        outcome.joined
    }

    fn fetch_live<N, L, D, G, R>(
        &mut self,
        io: &mut Collaborators<N, L, D, G>,
        store: &mut PersistentStore<R>,
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> Result<QuoteText, LiveFetch>
    where
        N: NetworkLink,
        D: DelayNs,
        R: RawStore,
    {
        if !self.gate_permits(store, clock, now_ms) {
            return Err(LiveFetch::RateLimited);
        }

        if !self.connect(io, store, clock, now_ms) {
            return Err(LiveFetch::Failed(QuoteError::ConnectivityTimeout));
        }

        // The join may have just synchronised the clock.
        if !self.gate_permits(store, clock, now_ms) {
            return Err(LiveFetch::RateLimited);
        }

        let mut body = [0u8; RESPONSE_BYTES];
        let response = io.network.get(self.url, &mut body).map_err(|err| {
            warn!("pipeline: request failed err={:?}", err);
            LiveFetch::Failed(QuoteError::TransportFailure)
        })?;

        if !response.is_success() {
            warn!("pipeline: request status={}", response.status);
            return Err(LiveFetch::Failed(QuoteError::TransportFailure));
        }

        let len = response.body_len.min(body.len());
        let text = payload::parse_quote(&body[..len]).map_err(LiveFetch::Failed)?;

        if self.cache_enabled {
            store.stage_str(QUOTE_SLOT, &text);
            if let Some(now) = clock.now(now_ms) {
                rate_gate::stage_watermark(store, RateWatermark::at(&now));
            }
            let _ = store.commit();
        }

        Ok(text)
    }

    // An unknown wall clock cannot be rate limited.
    fn gate_permits<R: RawStore>(
        &self,
        store: &PersistentStore<R>,
        clock: &TimeKeeper,
        now_ms: u64,
    ) -> bool {
        match clock.now(now_ms) {
            Some(now) => self.gate.permits_live_fetch(store, &now),
            None => true,
        }
    }

    fn read_storage<N, L, D, G>(
        &mut self,
        io: &mut Collaborators<N, L, D, G>,
    ) -> Result<QuoteText, QuoteError>
    where
        L: QuoteLibrary,
        G: RngCore,
    {
        let index = if self.index_min >= self.index_max {
            self.index_min
        } else {
            io.rng.gen_range(self.index_min..self.index_max)
        };

        let mut buf = [0u8; QUOTE_TEXT_BYTES];
        let len = io.library.read_quote(index, &mut buf).map_err(|err| {
            warn!(
                "pipeline: {} index={} err={:?}",
                QuoteError::StorageUnavailable,
                index,
                err
            );
            QuoteError::StorageUnavailable
        })?;

        let text = valid_utf8_prefix(&buf[..len.min(buf.len())]).trim();
        if text.is_empty() {
            warn!("pipeline: quote file index={} is empty", index);
            return Err(QuoteError::StorageUnavailable);
        }

        let mut out = QuoteText::new();
        payload::push_truncated(&mut out, text);
        Ok(out)
    }
}

fn valid_utf8_prefix(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
    }
}
