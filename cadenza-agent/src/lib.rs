//! Runtime layer for the Cadenza telemetry agent
//!
//! ## Overview
//!
//! This crate owns everything with a clock or a wire attached: the
//! connectivity state machine, the reconnect-aware telemetry loop, the
//! liveness indicator task, and the MQTT transport. The numeric and
//! policy pieces (differencing, cadence, log rotation) live in
//! `cadenza-core`; hardware and network collaborators plug in through
//! the traits defined here.
//!
//! ## Collaborator Seams
//!
//! The agent never talks to hardware directly. Each external dependency
//! is a trait, chosen to match what real drivers expose:
//!
//! | Trait              | Real counterpart                  | Failure mode          |
//! |--------------------|-----------------------------------|-----------------------|
//! | [`Sensor`]         | BME68x I2C driver                 | transient read error  |
//! | [`LinkDriver`]     | station-mode Wi-Fi interface      | timeout, link drop    |
//! | [`Transport`]      | MQTT client                       | publish/connect error |
//! | [`TransportFactory`] | MQTT client constructor + connect | connect error       |
//! | [`StatusIndicator`]| on-board LED                      | none                  |
//! | [`RestartPolicy`]  | watchdog / machine reset          | none (terminal)       |
//!
//! ## Task Model
//!
//! One cooperative scheduler, two tasks: the telemetry loop and the
//! liveness indicator. They share exactly one piece of state - the
//! atomic link-state cell, written only by the connectivity manager and
//! read by everyone else. Suspension points are the tick yield, the
//! connectivity polls, and the backoff sleeps; nothing else blocks.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example(sensor: impl cadenza_agent::Sensor,
//! #                  link: impl cadenza_agent::LinkDriver + 'static,
//! #                  indicator: impl cadenza_agent::StatusIndicator + Send + 'static) {
//! use cadenza_agent::{Agent, TelemetryLoop, mqtt::MqttFactory, RebootOnFatal};
//! use cadenza_core::config::AgentConfig;
//! use cadenza_core::time::MonotonicClock;
//!
//! let config = AgentConfig::new("shopfloor", "hunter2", "broker.local")
//!     .client_id("e661ac8863125b23")
//!     .log_file("cadenza.log");
//!
//! let factory = MqttFactory::new(&config);
//! let telemetry = TelemetryLoop::new(config, MonotonicClock::new(), sensor, link, factory, RebootOnFatal);
//! let result = Agent::new(telemetry, indicator).run().await;
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod link;
pub mod liveness;
pub mod telemetry;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-export common types
pub use agent::Agent;
pub use link::{ConnectivityManager, LinkState, LinkStateHandle, LinkStatus};
pub use liveness::liveness_task;
pub use telemetry::{PublishCursor, TelemetryLoop, TickOutcome};

use async_trait::async_trait;
use cadenza_core::{AgentError, AgentResult, Reading};

/// Environmental sensor collaborator
///
/// A read is one capture of all available channels. Failures are
/// transient by contract ([`AgentError::SensorRead`]); the loop skips
/// the tick and tries again on the next one.
#[async_trait]
pub trait Sensor: Send {
    /// Capture one reading
    async fn read(&mut self) -> AgentResult<Reading>;
}

/// Marker returned by a link driver when a connect request is already
/// pending
///
/// Some drivers raise when `request_connect` is called while an earlier
/// request is still in flight. The connectivity manager swallows this by
/// design and proceeds to polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPending;

/// Link-layer driver collaborator (station-mode network interface)
pub trait LinkDriver: Send {
    /// Power up the interface; idempotent
    fn activate(&mut self);

    /// Start a connect attempt; returns immediately
    fn request_connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectPending>;

    /// Pure read of current association state; must never block
    fn is_connected(&self) -> bool;

    /// Driver-level status code, for diagnostics while polling
    fn status(&self) -> LinkStatus;

    /// Tear down the association; best-effort
    fn disconnect(&mut self);

    /// Local address once associated
    fn local_address(&self) -> Option<std::net::IpAddr>;
}

/// Message transport collaborator (an established broker session)
#[async_trait]
pub trait Transport: Send {
    /// Publish one payload to a topic
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> AgentResult<()>;

    /// Close the session; best-effort
    async fn disconnect(&mut self);
}

/// Builder of transport sessions
///
/// The telemetry loop holds at most one [`Transport`] and rebuilds it
/// through this factory after any transport failure.
#[async_trait]
pub trait TransportFactory: Send {
    /// The session type this factory produces
    type Transport: Transport;

    /// Establish a fresh session with the broker
    async fn connect(&mut self) -> AgentResult<Self::Transport>;
}

/// Liveness indicator collaborator (an LED, a GPIO, a test counter)
pub trait StatusIndicator: Send {
    /// Flip the indicator state
    fn toggle(&mut self);
}

/// Fatal-recovery contract
///
/// Invoked exactly once when link retries are exhausted. On hardware
/// this resets the machine and never returns; in tests it records the
/// escalation. Must be safe to invoke at any point, including
/// mid-publish.
#[async_trait]
pub trait RestartPolicy: Send {
    /// React to an unrecoverable error
    async fn escalate(&mut self, error: AgentError);
}

/// Restart policy for hosted deployments: log and exit the process,
/// leaving the supervisor (systemd, a shell loop) to bring the agent
/// back up
#[derive(Debug, Clone, Copy, Default)]
pub struct RebootOnFatal;

#[async_trait]
impl RestartPolicy for RebootOnFatal {
    async fn escalate(&mut self, error: AgentError) {
        log::error!("fatal: {error}; exiting for supervisor restart");
        // Let the log sink flush before the process dies
        tokio::time::sleep(std::time::Duration::from_millis(1_000)).await;
        std::process::exit(1);
    }
}

/// Agent health counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AgentStats {
    /// Payloads published successfully
    pub publishes: u64,
    /// Publish attempts that failed at the transport
    pub publish_failures: u64,
    /// Sensor reads that missed (tick skipped)
    pub sensor_misses: u64,
    /// Transport sessions established (first connect included)
    pub transport_connects: u32,
    /// Link reconnect rounds entered by the loop
    pub link_recoveries: u32,
}
