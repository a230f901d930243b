//! Connectivity State Machine with Timeout, Retry, and Backoff
//!
//! ## Overview
//!
//! The connectivity manager owns the network link. It is the only writer
//! of the shared [`LinkState`] cell; every other task (the telemetry
//! loop, the liveness indicator) holds a read-only [`LinkStateHandle`].
//!
//! ## State Machine
//!
//! ```text
//!                 connect requested          link up
//! Disconnected ─────────────────────▶ Connecting ─────▶ Connected
//!      ▲                                  │ timeout          │
//!      │◀─────────────────────────────────┘ (retry)          │ link drop
//!      │                                                     │ detected
//!      │◀────────────────────────────────────────────────────┘
//!      │
//!      └──▶ Failed   (retries exhausted; sticky until the next connect)
//! ```
//!
//! Transitions are serialized by construction: both connect entry points
//! take `&mut self`, so only one attempt can ever be in flight.
//!
//! ## Blocking and Suspending Variants
//!
//! [`connect`](ConnectivityManager::connect) parks the calling thread at
//! each poll and backoff; [`connect_async`](ConnectivityManager::connect_async)
//! yields to the scheduler at the same points. The two run the identical
//! attempt/poll/backoff sequence against the driver and are observably
//! equivalent for the same sequence of link-status transitions - the
//! integration tests hold them to that.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadenza_core::config::RetryPolicy;
use cadenza_core::AgentError;

use crate::LinkDriver;

/// Driver-level association status, for diagnostics while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Interface idle
    Idle,
    /// Association in progress
    Connecting,
    /// Credentials rejected
    WrongPassword,
    /// SSID not found
    NoApFound,
    /// Association failed for another reason
    ConnectFail,
    /// Associated with an address
    GotIp,
}

/// Agent-level link state, owned by the connectivity manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    /// No link, no attempt in flight
    Disconnected = 0,
    /// A connect attempt is in flight
    Connecting = 1,
    /// Link is up
    Connected = 2,
    /// Retries exhausted; sticky until the next connect call
    Failed = 3,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            3 => LinkState::Failed,
            _ => LinkState::Disconnected,
        }
    }
}

/// Read-only view of the link state, safe to clone across tasks
///
/// One writer (the manager), any number of readers; the cell is a single
/// atomic so readers never block.
#[derive(Debug, Clone)]
pub struct LinkStateHandle(Arc<AtomicU8>);

impl LinkStateHandle {
    /// Current state
    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Whether the manager last observed the link up
    pub fn is_connected(&self) -> bool {
        self.get() == LinkState::Connected
    }
}

/// State machine owning the network link
pub struct ConnectivityManager<L: LinkDriver> {
    driver: L,
    policy: RetryPolicy,
    state: Arc<AtomicU8>,
}

impl<L: LinkDriver> ConnectivityManager<L> {
    /// Wrap a driver with the given retry policy
    pub fn new(driver: L, policy: RetryPolicy) -> Self {
        Self {
            driver,
            policy,
            state: Arc::new(AtomicU8::new(LinkState::Disconnected as u8)),
        }
    }

    /// Retry policy in force
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Hand out a read-only state handle for other tasks
    pub fn state_handle(&self) -> LinkStateHandle {
        LinkStateHandle(Arc::clone(&self.state))
    }

    /// Pure read of current link status; never blocks
    ///
    /// Also reconciles the shared cell when the link has dropped out from
    /// under a `Connected` state - detection happens on the next read, not
    /// on a timer.
    pub fn is_connected(&self) -> bool {
        let up = self.driver.is_connected();
        match (LinkState::from_u8(self.state.load(Ordering::Acquire)), up) {
            (LinkState::Connected, false) => self.set_state(LinkState::Disconnected),
            (LinkState::Disconnected, true) | (LinkState::Failed, true) => {
                self.set_state(LinkState::Connected)
            }
            _ => {}
        }
        up
    }

    /// Local address, once associated
    pub fn local_address(&self) -> Option<std::net::IpAddr> {
        self.driver.local_address()
    }

    /// Connect synchronously with timeout and retries
    ///
    /// Parks the calling thread during polls and backoff. Returns `true`
    /// once the link is up (immediately when already connected), `false`
    /// after `retries` attempts have timed out.
    pub fn connect(&mut self, ssid: &str, password: &str) -> bool {
        log::info!("Connecting to {ssid}");
        self.driver.activate();

        let mut wait_ms = self.policy.initial_backoff_ms;
        for attempt in 1..=self.policy.retries {
            if self.begin_attempt(ssid, password, attempt) {
                return true;
            }

            let start = std::time::Instant::now();
            let timeout = Duration::from_millis(self.policy.timeout_ms);
            let connected = loop {
                if start.elapsed() >= timeout {
                    break false;
                }
                if self.driver.is_connected() {
                    break true;
                }
                log::debug!("Waiting for link... status={:?}", self.driver.status());
                std::thread::sleep(Duration::from_millis(self.policy.poll_interval_ms));
            };

            if connected {
                return self.finish_success();
            }

            self.finish_timeout(attempt);
            if attempt < self.policy.retries {
                log::info!("Retrying in {wait_ms} ms");
                std::thread::sleep(Duration::from_millis(wait_ms));
                wait_ms = self.next_backoff(wait_ms);
            }
        }

        self.finish_exhausted()
    }

    /// Connect cooperatively with timeout and retries
    ///
    /// Suspends at every poll and backoff point instead of occupying the
    /// scheduler; state machine and return contract are identical to
    /// [`connect`](Self::connect).
    pub async fn connect_async(&mut self, ssid: &str, password: &str) -> bool {
        log::info!("Connecting to {ssid} (async)");
        self.driver.activate();

        let mut wait_ms = self.policy.initial_backoff_ms;
        for attempt in 1..=self.policy.retries {
            if self.begin_attempt(ssid, password, attempt) {
                return true;
            }

            let start = tokio::time::Instant::now();
            let timeout = Duration::from_millis(self.policy.timeout_ms);
            let connected = loop {
                if start.elapsed() >= timeout {
                    break false;
                }
                if self.driver.is_connected() {
                    break true;
                }
                log::debug!("Waiting for link... status={:?}", self.driver.status());
                tokio::time::sleep(Duration::from_millis(self.policy.poll_interval_ms)).await;
            };

            if connected {
                return self.finish_success();
            }

            self.finish_timeout(attempt);
            if attempt < self.policy.retries {
                log::info!("Retrying in {wait_ms} ms");
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                wait_ms = self.next_backoff(wait_ms);
            }
        }

        self.finish_exhausted()
    }

    /// Per-attempt preamble shared by both variants; returns `true` when
    /// the link is already up
    fn begin_attempt(&mut self, ssid: &str, password: &str, attempt: u32) -> bool {
        if self.driver.is_connected() {
            log::info!("Already connected");
            self.set_state(LinkState::Connected);
            return true;
        }

        log::info!("Attempt {attempt}/{}: connecting to {ssid}", self.policy.retries);
        self.set_state(LinkState::Connecting);
        if self.driver.request_connect(ssid, password).is_err() {
            // An earlier request is still in flight; polling covers it
            log::debug!("connect request already pending");
        }
        false
    }

    fn finish_success(&mut self) -> bool {
        self.set_state(LinkState::Connected);
        log::info!("Link up: {:?}", self.driver.local_address());
        true
    }

    fn finish_timeout(&mut self, attempt: u32) {
        let err = AgentError::LinkTimeout {
            attempt,
            timeout_ms: self.policy.timeout_ms,
        };
        log::warn!("{err}");
        self.driver.disconnect();
        self.set_state(LinkState::Disconnected);
    }

    fn finish_exhausted(&mut self) -> bool {
        self.set_state(LinkState::Failed);
        log::warn!("Failed to connect after {} attempts", self.policy.retries);
        false
    }

    fn next_backoff(&self, wait_ms: u64) -> u64 {
        let scaled = (wait_ms as f64 * self.policy.backoff_factor as f64) as u64;
        scaled.min(self.policy.backoff_ceiling_ms)
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
