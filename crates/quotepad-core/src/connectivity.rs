//! Network join sequencing over a board-provided link.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::clock::TimeKeeper;
use crate::credentials::{self, Credential};
use crate::error::QuoteError;
use crate::persist::{PersistentStore, RawStore};

/// Granularity of the join wait loop.
pub const JOIN_POLL_INTERVAL_MS: u32 = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
    Pending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body_len: usize,
}

impl HttpResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Board network primitives.
pub trait NetworkLink {
    type Error: Debug;

    /// Starts joining; completion is observed through [`NetworkLink::status`].
    fn join(&mut self, ssid: &str, secret: &str) -> Result<(), Self::Error>;

    fn status(&mut self) -> LinkStatus;

    /// Issues one bounded GET, writing the response body into `body`.
    fn get(&mut self, url: &str, body: &mut [u8]) -> Result<HttpResponse, Self::Error>;

    /// Current Unix time in seconds from a network time source.
    fn network_time(&mut self) -> Result<u64, Self::Error>;
}

#[derive(Debug)]
pub struct ConnectivityManager {
    join_timeout_ms: u32,
    joined: bool,
    last_join_wait_ms: u32,
}

impl ConnectivityManager {
    pub const fn new(join_timeout_ms: u32) -> Self {
        Self {
            join_timeout_ms,
            joined: false,
            last_join_wait_ms: 0,
        }
    }

    pub const fn is_joined(&self) -> bool {
        self.joined
    }

    /// Time spent waiting in the most recent [`Self::try_join`].
    pub const fn last_join_wait_ms(&self) -> u32 {
        self.last_join_wait_ms
    }

    /// Attempts one credential, blocking up to the join timeout.
    pub fn try_join<N, D>(&mut self, link: &mut N, delay: &mut D, candidate: &Credential) -> bool
    where
        N: NetworkLink,
        D: DelayNs,
    {
        self.last_join_wait_ms = 0;

        if let Err(err) = link.join(&candidate.ssid, &candidate.secret) {
            warn!(
                "connectivity: join rejected ssid={} err={:?}",
                candidate.ssid.as_str(),
                err
            );
            return false;
        }

        loop {
            if link.status() == LinkStatus::Connected {
                info!(
                    "connectivity: joined ssid={} after_ms={}",
                    candidate.ssid.as_str(),
                    self.last_join_wait_ms
                );
                return true;
            }

            if self.last_join_wait_ms >= self.join_timeout_ms {
                warn!(
                    "connectivity: {} ssid={} timeout_ms={}",
                    QuoteError::ConnectivityTimeout,
                    candidate.ssid.as_str(),
                    self.join_timeout_ms
                );
                return false;
            }

            delay.delay_ms(JOIN_POLL_INTERVAL_MS);
            self.last_join_wait_ms = self.last_join_wait_ms.saturating_add(JOIN_POLL_INTERVAL_MS);
        }
    }

    /// Tries `candidates` in order until one joins. The winner is persisted
    /// and the clock is resynchronised. Returns the total time spent waiting.
    pub fn join_from_candidates<N, D, R>(
        &mut self,
        link: &mut N,
        delay: &mut D,
        store: &mut PersistentStore<R>,
        candidates: &[Credential],
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> JoinOutcome
    where
        N: NetworkLink,
        D: DelayNs,
        R: RawStore,
    {
        let mut waited_ms = 0u64;

        for candidate in candidates {
            let joined = self.try_join(link, delay, candidate);
            waited_ms += u64::from(self.last_join_wait_ms);

            if joined {
                self.joined = true;
                if credentials::load_last_good(store).as_ref() != Some(candidate) {
                    // A failed commit only costs the try-order hint next boot.
                    let _ = credentials::store_last_good(store, candidate);
                }
                sync_time(link, clock, now_ms + waited_ms);
                return JoinOutcome {
                    joined: true,
                    waited_ms,
                };
            }
        }

        self.joined = false;
        if candidates.is_empty() {
            warn!("connectivity: no credentials to try");
        }
        JoinOutcome {
            joined: false,
            waited_ms,
        }
    }

    /// Joined and still connected, or a fresh join from `candidates` succeeded.
    pub fn ensure_connected<N, D, R>(
        &mut self,
        link: &mut N,
        delay: &mut D,
        store: &mut PersistentStore<R>,
        candidates: &[Credential],
        clock: &mut TimeKeeper,
        now_ms: u64,
    ) -> JoinOutcome
    where
        N: NetworkLink,
        D: DelayNs,
        R: RawStore,
    {
        if self.joined && link.status() == LinkStatus::Connected {
            return JoinOutcome {
                joined: true,
                waited_ms: 0,
            };
        }

        self.join_from_candidates(link, delay, store, candidates, clock, now_ms)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JoinOutcome {
    pub joined: bool,
    pub waited_ms: u64,
}

/// Pulls network time into `clock`; returns whether it succeeded.
pub fn sync_time<N: NetworkLink>(link: &mut N, clock: &mut TimeKeeper, now_ms: u64) -> bool {
    match link.network_time() {
        Ok(unix_secs) => {
            clock.set_unix_time(unix_secs, now_ms);
            info!("connectivity: clock synced unix={}", unix_secs);
            true
        }
        Err(err) => {
            warn!("connectivity: time sync failed err={:?}", err);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::string::String;
    use std::vec::Vec;

    use super::*;
    use crate::credentials::load_last_good;
    use crate::persist::{MemoryStore, STORE_BYTES};

    #[derive(Default)]
    pub(crate) struct NoopDelay {
        pub(crate) total_ms: u64,
    }

    impl DelayNs for NoopDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
        }
    }

    /// Network fake: joins succeed for `reachable` SSIDs after `join_polls`
    /// status polls; GET answers with `response`.
    #[derive(Default)]
    pub(crate) struct ScriptedNetwork {
        pub(crate) reachable: Vec<&'static str>,
        pub(crate) join_polls: u32,
        pub(crate) attempts: Vec<String>,
        pub(crate) response: Option<(u16, &'static str)>,
        pub(crate) requests: u32,
        pub(crate) unix_time: Option<u64>,
        connected: bool,
        polls_left: Option<u32>,
    }

    impl ScriptedNetwork {
        pub(crate) fn reachable(ssids: &[&'static str]) -> Self {
            Self {
                reachable: ssids.to_vec(),
                unix_time: Some(1_709_214_307),
                ..Self::default()
            }
        }

        pub(crate) fn with_response(mut self, status: u16, body: &'static str) -> Self {
            self.response = Some((status, body));
            self
        }

        pub(crate) fn drop_link(&mut self) {
            self.connected = false;
            self.polls_left = None;
        }
    }

    impl NetworkLink for ScriptedNetwork {
        type Error = &'static str;

        fn join(&mut self, ssid: &str, _secret: &str) -> Result<(), Self::Error> {
            self.attempts.push(ssid.into());
            self.connected = false;
            self.polls_left = if self.reachable.iter().any(|known| *known == ssid) {
                Some(self.join_polls)
            } else {
                None
            };
            Ok(())
        }

        fn status(&mut self) -> LinkStatus {
            if self.connected {
                return LinkStatus::Connected;
            }
            match self.polls_left {
                Some(0) => {
                    self.connected = true;
                    LinkStatus::Connected
                }
                Some(ref mut left) => {
                    *left -= 1;
                    LinkStatus::Pending
                }
                None => LinkStatus::Disconnected,
            }
        }

        fn get(&mut self, _url: &str, body: &mut [u8]) -> Result<HttpResponse, Self::Error> {
            self.requests += 1;
            if !self.connected {
                return Err("not connected");
            }
            let (status, text) = self.response.ok_or("no route")?;
            let len = text.len().min(body.len());
            body[..len].copy_from_slice(&text.as_bytes()[..len]);
            Ok(HttpResponse {
                status,
                body_len: len,
            })
        }

        fn network_time(&mut self) -> Result<u64, Self::Error> {
            self.unix_time.ok_or("no time source")
        }
    }

    fn candidates(ssids: &[&str]) -> Vec<Credential> {
        ssids
            .iter()
            .map(|ssid| Credential::new(ssid, "pw").unwrap())
            .collect()
    }

    #[test]
    fn tries_in_order_and_persists_the_winner() {
        let mut link = ScriptedNetwork::reachable(&["c"]);
        let mut delay = NoopDelay::default();
        let mut store = PersistentStore::new(MemoryStore::<STORE_BYTES>::new());
        let mut clock = TimeKeeper::new(0);
        let mut manager = ConnectivityManager::new(1_000);

        let outcome = manager.join_from_candidates(
            &mut link,
            &mut delay,
            &mut store,
            &candidates(&["a", "b", "c"]),
            &mut clock,
            0,
        );

        assert!(outcome.joined);
        assert_eq!(link.attempts, ["a", "b", "c"]);
        assert_eq!(load_last_good(&store).unwrap().ssid.as_str(), "c");
        assert!(clock.is_synced());
        assert!(manager.is_joined());
    }

    #[test]
    fn each_candidate_waits_for_the_full_timeout() {
        let mut link = ScriptedNetwork::reachable(&[]);
        let mut delay = NoopDelay::default();
        let mut manager = ConnectivityManager::new(500);

        assert!(!manager.try_join(&mut link, &mut delay, &Credential::new("x", "").unwrap()));
        assert_eq!(manager.last_join_wait_ms(), 500);
        assert_eq!(delay.total_ms, 500);
    }

    #[test]
    fn slow_join_inside_timeout_succeeds() {
        let mut link = ScriptedNetwork::reachable(&["home"]);
        link.join_polls = 3;
        let mut delay = NoopDelay::default();
        let mut manager = ConnectivityManager::new(1_000);

        assert!(manager.try_join(&mut link, &mut delay, &Credential::new("home", "").unwrap()));
        assert_eq!(manager.last_join_wait_ms(), 3 * JOIN_POLL_INTERVAL_MS);
    }

    #[test]
    fn exhausted_candidates_report_failure() {
        let mut link = ScriptedNetwork::reachable(&[]);
        let mut delay = NoopDelay::default();
        let mut store = PersistentStore::new(MemoryStore::<STORE_BYTES>::new());
        let mut clock = TimeKeeper::new(0);
        let mut manager = ConnectivityManager::new(200);

        let outcome = manager.join_from_candidates(
            &mut link,
            &mut delay,
            &mut store,
            &candidates(&["a", "b"]),
            &mut clock,
            0,
        );

        assert_eq!(
            outcome,
            JoinOutcome {
                joined: false,
                waited_ms: 400
            }
        );
        assert!(load_last_good(&store).is_none());
        assert!(!clock.is_synced());
    }

    #[test]
    fn dropped_link_is_rejoined() {
        let mut link = ScriptedNetwork::reachable(&["home"]);
        let mut delay = NoopDelay::default();
        let mut store = PersistentStore::new(MemoryStore::<STORE_BYTES>::new());
        let mut clock = TimeKeeper::new(0);
        let mut manager = ConnectivityManager::new(200);
        let list = candidates(&["home"]);

        manager.ensure_connected(&mut link, &mut delay, &mut store, &list, &mut clock, 0);
        manager.ensure_connected(&mut link, &mut delay, &mut store, &list, &mut clock, 0);
        assert_eq!(link.attempts.len(), 1);

        link.drop_link();
        manager.ensure_connected(&mut link, &mut delay, &mut store, &list, &mut clock, 0);
        assert_eq!(link.attempts.len(), 2);
    }
}
