//! Scripted fakes shared by the integration tests
//!
//! Every fake exposes its knobs through a shared control block so tests
//! keep a handle after the loop takes ownership of the collaborator:
//! - `MockClock`: settable monotonic time
//! - `FakeLink`/`LinkControl`: link that associates after k status polls
//! - `FakeTransport`/`TransportLog`: records publishes, injects failures
//! - `FakeSensor`/`SensorControl`: clock-stamped constant readings with
//!   injectable misses
//! - `RecordingRestart`: captures escalations instead of resetting

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cadenza_agent::{
    ConnectPending, LinkDriver, LinkStatus, RestartPolicy, Sensor, StatusIndicator, Transport,
    TransportFactory,
};
use cadenza_core::config::RetryPolicy;
use cadenza_core::{AgentError, AgentResult, Field, Reading, TimeSource, Timestamp};

/// Shared, settable monotonic clock
#[derive(Debug, Clone, Default)]
pub struct MockClock(Arc<AtomicU64>);

impl MockClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start_ms)))
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::Release);
    }
}

impl TimeSource for MockClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::Acquire)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// Control block for [`FakeLink`]
#[derive(Debug)]
pub struct LinkControl {
    /// Link associates once this many status polls have happened while
    /// down; `u32::MAX` never associates
    connect_after_polls: AtomicU32,
    up: AtomicBool,
    pub polls: AtomicU32,
    pub requests: AtomicU32,
    pub disconnects: AtomicU32,
}

impl LinkControl {
    pub fn new(connect_after_polls: u32) -> Arc<Self> {
        Arc::new(Self {
            connect_after_polls: AtomicU32::new(connect_after_polls),
            up: AtomicBool::new(connect_after_polls == 0),
            polls: AtomicU32::new(0),
            requests: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
        })
    }

    pub const NEVER: u32 = u32::MAX;

    /// Knock the link down and require `polls` further status polls for
    /// re-association
    pub fn drop_link(&self, connect_after_polls: u32) {
        self.up.store(false, Ordering::Release);
        self.polls.store(0, Ordering::Release);
        self.connect_after_polls
            .store(connect_after_polls, Ordering::Release);
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}

/// Link driver scripted through a shared [`LinkControl`]
pub struct FakeLink(pub Arc<LinkControl>);

impl LinkDriver for FakeLink {
    fn activate(&mut self) {}

    fn request_connect(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectPending> {
        let requests = self.0.requests.fetch_add(1, Ordering::AcqRel) + 1;
        if requests > 1 && !self.0.is_up() {
            // Driver still has the earlier request in flight
            return Err(ConnectPending);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if self.0.is_up() {
            return true;
        }
        let polls = self.0.polls.fetch_add(1, Ordering::AcqRel) + 1;
        if polls >= self.0.connect_after_polls.load(Ordering::Acquire) {
            self.0.up.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn status(&self) -> LinkStatus {
        if self.0.is_up() {
            LinkStatus::GotIp
        } else {
            LinkStatus::Connecting
        }
    }

    fn disconnect(&mut self) {
        self.0.disconnects.fetch_add(1, Ordering::AcqRel);
        self.0.up.store(false, Ordering::Release);
    }

    fn local_address(&self) -> Option<std::net::IpAddr> {
        self.0.is_up().then(|| "192.168.4.21".parse().unwrap())
    }
}

/// Control block for [`FakeSensor`]
#[derive(Debug)]
pub struct SensorControl {
    /// Values for temperature/pressure/humidity/gas, mutable mid-test
    pub values: Mutex<[f32; 4]>,
    /// Number of upcoming reads that fail
    pub fail_next: AtomicU32,
    pub reads: AtomicU32,
}

impl SensorControl {
    pub fn new(values: [f32; 4]) -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(values),
            fail_next: AtomicU32::new(0),
            reads: AtomicU32::new(0),
        })
    }
}

/// Sensor producing clock-stamped readings from the control block
pub struct FakeSensor {
    pub clock: MockClock,
    pub control: Arc<SensorControl>,
}

#[async_trait]
impl Sensor for FakeSensor {
    async fn read(&mut self) -> AgentResult<Reading> {
        self.control.reads.fetch_add(1, Ordering::AcqRel);
        if self.control.fail_next.load(Ordering::Acquire) > 0 {
            self.control.fail_next.fetch_sub(1, Ordering::AcqRel);
            return Err(AgentError::SensorRead {
                reason: "injected bus glitch",
            });
        }

        let values = *self.control.values.lock().unwrap();
        Ok(Reading::new(self.clock.now())
            .with(Field::Temperature, values[0])
            .with(Field::Pressure, values[1])
            .with(Field::Humidity, values[2])
            .with(Field::Gas, values[3]))
    }
}

/// Control block shared by [`FakeTransport`] and [`FakeFactory`]
#[derive(Debug, Default)]
pub struct TransportLog {
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
    /// Number of upcoming publishes that fail
    pub fail_publishes: AtomicU32,
    /// Number of upcoming factory connects that fail
    pub fail_connects: AtomicU32,
    pub connects: AtomicU32,
    pub disconnects: AtomicU32,
}

impl TransportLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Payloads published on one topic
    pub fn on_topic(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

/// Transport session writing into the shared log
pub struct FakeTransport(pub Arc<TransportLog>);

#[async_trait]
impl Transport for FakeTransport {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> AgentResult<()> {
        if self.0.fail_publishes.load(Ordering::Acquire) > 0 {
            self.0.fail_publishes.fetch_sub(1, Ordering::AcqRel);
            return Err(AgentError::Transport {
                reason: "injected publish failure",
            });
        }
        self.0
            .published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.0.disconnects.fetch_add(1, Ordering::AcqRel);
    }
}

/// Factory handing out sessions against the shared log
pub struct FakeFactory(pub Arc<TransportLog>);

#[async_trait]
impl TransportFactory for FakeFactory {
    type Transport = FakeTransport;

    async fn connect(&mut self) -> AgentResult<FakeTransport> {
        if self.0.fail_connects.load(Ordering::Acquire) > 0 {
            self.0.fail_connects.fetch_sub(1, Ordering::AcqRel);
            return Err(AgentError::Transport {
                reason: "injected connect failure",
            });
        }
        self.0.connects.fetch_add(1, Ordering::AcqRel);
        Ok(FakeTransport(Arc::clone(&self.0)))
    }
}

/// Restart policy that records instead of resetting
#[derive(Debug, Clone, Default)]
pub struct RecordingRestart(pub Arc<Mutex<Vec<AgentError>>>);

#[async_trait]
impl RestartPolicy for RecordingRestart {
    async fn escalate(&mut self, error: AgentError) {
        self.0.lock().unwrap().push(error);
    }
}

/// Indicator counting toggles
#[derive(Debug, Clone, Default)]
pub struct CountingIndicator(pub Arc<AtomicU32>);

impl StatusIndicator for CountingIndicator {
    fn toggle(&mut self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// Retry policy scaled down so blocking tests finish in milliseconds
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        timeout_ms: 50,
        retries: 3,
        backoff_factor: 2.0,
        initial_backoff_ms: 10,
        backoff_ceiling_ms: 25,
        poll_interval_ms: 10,
    }
}
