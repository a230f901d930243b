//! Agent Configuration
//!
//! ## Overview
//!
//! One owned configuration struct covers everything the agent consumes at
//! startup: network credentials, broker parameters, cadence thresholds,
//! retry/backoff policy, and log rotation. The core does not *load* this
//! from anywhere - startup plumbing deserializes it (JSON via serde) and
//! hands it to the agent, replacing the source tree's scatter of
//! module-level constants with one explicit value.
//!
//! ## Example
//!
//! ```rust
//! use cadenza_core::config::AgentConfig;
//!
//! let config = AgentConfig::new("shopfloor", "hunter2", "broker.local")
//!     .client_id("e661ac8863125b23")
//!     .sensor_name("BME688")
//!     .broker_port(1883);
//!
//! assert_eq!(config.data_topic(), "e661ac8863125b23/BME688");
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cadence::CadencePolicy;
use crate::logsink::RotationLimits;
use crate::reading::Field;

/// Auxiliary topic carrying the per-field derivative
pub const TOPIC_DERIVATIVE: &str = "derivative";
/// Auxiliary topic carrying the per-field jerk
pub const TOPIC_JERK: &str = "jerk";
/// Auxiliary topic carrying the derivative magnitude scalar
pub const TOPIC_DERIVATIVE_MAGNITUDE: &str = "derivative_magnitude";
/// Auxiliary topic carrying the jerk magnitude scalar
pub const TOPIC_JERK_MAGNITUDE: &str = "jerk_magnitude";

/// Timeout/retry/backoff parameters for link connection attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// How long to wait for each connect attempt
    pub timeout_ms: u64,
    /// Number of attempts (including the first)
    pub retries: u32,
    /// Multiplier applied to the backoff wait after each failed attempt
    pub backoff_factor: f32,
    /// First backoff wait between attempts
    pub initial_backoff_ms: u64,
    /// Backoff wait never exceeds this ceiling
    pub backoff_ceiling_ms: u64,
    /// Link status poll interval within an attempt
    pub poll_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            retries: 3,
            backoff_factor: 2.0,
            initial_backoff_ms: 1_000,
            backoff_ceiling_ms: 60_000,
            poll_interval_ms: 1_000,
        }
    }
}

/// Blink delays for the liveness indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlinkDelays {
    /// Toggle delay while the link is up
    pub slow_ms: u64,
    /// Toggle delay while the link is down or recovering
    pub fast_ms: u64,
}

impl Default for BlinkDelays {
    fn default() -> Self {
        Self {
            slow_ms: 1_000,
            fast_ms: 500,
        }
    }
}

/// Everything the agent consumes at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Network SSID
    pub ssid: String,
    /// Network password
    pub password: String,
    /// Broker host name or address
    pub broker_host: String,
    /// Broker port
    pub broker_port: u16,
    /// Optional broker username
    pub broker_user: Option<String>,
    /// Optional broker password
    pub broker_password: Option<String>,
    /// Client identifier (on hardware, the hex-encoded unique machine id)
    pub client_id: String,
    /// Sensor name; second segment of the data topic
    pub sensor_name: String,
    /// Transport keepalive in seconds
    pub keepalive_secs: u16,
    /// Cadence thresholds and periods
    pub cadence: CadencePolicy,
    /// Fields included in magnitude norms (gas excluded by default: the
    /// gas-resistance channel responds too slowly to signal urgency)
    pub magnitude_fields: Vec<Field>,
    /// Link retry/backoff policy
    pub retry: RetryPolicy,
    /// Telemetry loop tick interval
    pub tick_interval_ms: u64,
    /// Log file for persisted failures; `None` keeps the agent console-only
    pub log_file: Option<PathBuf>,
    /// Log rotation threshold and backup count
    pub log_rotation: RotationLimits,
    /// Liveness indicator blink delays
    pub blink: BlinkDelays,
}

impl AgentConfig {
    /// Configuration with required network/broker parameters and defaults
    /// for everything else
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        broker_host: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            broker_host: broker_host.into(),
            broker_port: 1883,
            broker_user: None,
            broker_password: None,
            client_id: "cadenza".into(),
            sensor_name: "BME688".into(),
            keepalive_secs: 120,
            cadence: CadencePolicy::default(),
            magnitude_fields: vec![Field::Temperature, Field::Pressure, Field::Humidity],
            retry: RetryPolicy::default(),
            tick_interval_ms: 1_000,
            log_file: None,
            log_rotation: RotationLimits::default(),
            blink: BlinkDelays::default(),
        }
    }

    /// Set the client identifier
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the sensor name
    pub fn sensor_name(mut self, name: impl Into<String>) -> Self {
        self.sensor_name = name.into();
        self
    }

    /// Set the broker port
    pub fn broker_port(mut self, port: u16) -> Self {
        self.broker_port = port;
        self
    }

    /// Set broker credentials
    pub fn broker_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.broker_user = Some(user.into());
        self.broker_password = Some(password.into());
        self
    }

    /// Override the cadence policy
    pub fn cadence(mut self, cadence: CadencePolicy) -> Self {
        self.cadence = cadence;
        self
    }

    /// Override the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Persist failures to this file
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Topic the data payload is published on: `"{client_id}/{sensor_name}"`
    pub fn data_topic(&self) -> String {
        format!("{}/{}", self.client_id, self.sensor_name)
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
