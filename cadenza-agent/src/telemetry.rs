//! Reconnect-Aware Telemetry Loop
//!
//! ## Overview
//!
//! One full sense → decide → publish cycle per scheduler tick, forever.
//! The loop owns every piece of mutable state it touches - transport
//! handle, differencer, publish cursor, stats - so nothing here is
//! shared, global, or locked.
//!
//! ## Cycle
//!
//! ```text
//! tick ─▶ link up? ──no──▶ reconnect (bounded) ──exhausted──▶ escalate
//!           │ yes                │ recovered
//!           ▼◀───────────────────┘
//!        transport? ──absent──▶ factory connect ──fail──▶ end cycle
//!           │ present                │ ok
//!           ▼◀───────────────────────┘
//!        period elapsed? ──no──▶ end cycle
//!           │ yes
//!           ▼
//!        sensor read ──miss──▶ end cycle (retry next tick)
//!           ▼
//!        differencer ─▶ magnitudes ─▶ cadence decision
//!           ▼
//!        publish (+ derivative/jerk topics) ──fail──▶ drop handle, log
//! ```
//!
//! ## Failure Semantics
//!
//! - A sensor miss skips exactly one tick; it never blocks later readings.
//! - A transport failure clears the handle (forcing a fresh factory
//!   connect next tick), persists an error record, and stays inside the
//!   loop.
//! - Link loss goes through the connectivity manager's full retry/backoff;
//!   only exhaustion escapes, via the restart policy.
//! - `last_publish` advances only on a successful data publish, so a
//!   failed publish is retried on the very next tick.

use std::time::Duration;

use cadenza_core::config::{
    AgentConfig, TOPIC_DERIVATIVE, TOPIC_DERIVATIVE_MAGNITUDE, TOPIC_JERK, TOPIC_JERK_MAGNITUDE,
};
use cadenza_core::{
    AgentError, AgentResult, Reading, RotatingLogSink, Severity, TimeSource, Timestamp,
    WindowedDifferencer,
};

use crate::link::{ConnectivityManager, LinkStateHandle};
use crate::{AgentStats, LinkDriver, RestartPolicy, Sensor, Transport, TransportFactory};

/// Publish bookkeeping: when we last published and the current adaptive
/// period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishCursor {
    /// Timestamp of the last successful data publish
    pub last_publish_ms: Timestamp,
    /// Current adaptive period; 0 publishes on every tick
    pub period_ms: u64,
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Data payload (and any auxiliary topics) went out
    Published,
    /// Inside the current period; nothing to do
    Waiting,
    /// Sensor read missed; tick skipped
    SensorMiss,
    /// Transport absent or failed; handle will be rebuilt next tick
    TransportDown,
    /// Reading rejected for a non-increasing timestamp
    NonMonotonic,
}

/// The orchestrator: owns the collaborators and drives the cycle
pub struct TelemetryLoop<C, S, L, F, R>
where
    C: TimeSource,
    S: Sensor,
    L: LinkDriver,
    F: TransportFactory,
    R: RestartPolicy,
{
    config: AgentConfig,
    clock: C,
    sensor: S,
    link: ConnectivityManager<L>,
    factory: F,
    restart: R,
    transport: Option<F::Transport>,
    differencer: WindowedDifferencer,
    cursor: PublishCursor,
    sink: RotatingLogSink,
    stats: AgentStats,
}

impl<C, S, L, F, R> TelemetryLoop<C, S, L, F, R>
where
    C: TimeSource,
    S: Sensor,
    L: LinkDriver,
    F: TransportFactory,
    R: RestartPolicy,
{
    /// Assemble a loop around its collaborators
    pub fn new(config: AgentConfig, clock: C, sensor: S, link: L, factory: F, restart: R) -> Self {
        let mut sink = RotatingLogSink::new().with_limits(config.log_rotation);
        if let Some(path) = &config.log_file {
            sink = sink.with_file(path);
        }
        let link = ConnectivityManager::new(link, config.retry);

        Self {
            config,
            clock,
            sensor,
            link,
            factory,
            restart,
            transport: None,
            differencer: WindowedDifferencer::new(),
            cursor: PublishCursor::default(),
            sink,
            stats: AgentStats::default(),
        }
    }

    /// Read-only link-state handle for the liveness task
    pub fn link_state(&self) -> LinkStateHandle {
        self.link.state_handle()
    }

    /// Health counters
    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Current publish cursor
    pub fn cursor(&self) -> PublishCursor {
        self.cursor
    }

    /// Blink delays from the configuration
    pub fn blink_delays(&self) -> cadenza_core::config::BlinkDelays {
        self.config.blink
    }

    /// Configured attempts per connect round
    pub fn retries(&self) -> u32 {
        self.config.retry.retries
    }

    /// Hand an error to the restart policy (startup failures go through
    /// here; in-loop exhaustion escalates on its own)
    pub async fn escalate(&mut self, error: AgentError) {
        self.restart.escalate(error).await;
    }

    /// Establish the link (used once at startup and by recovery)
    pub async fn connect_link(&mut self) -> bool {
        self.link
            .connect_async(&self.config.ssid, &self.config.password)
            .await
    }

    /// Drive ticks forever; returns only on a fatal error, after the
    /// restart policy has been invoked
    pub async fn run(&mut self) -> AgentResult<()> {
        self.sink.log(
            Severity::Info,
            &format!("Starting loop at {:.2}", self.clock.now() as f64 / 1000.0),
        );

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            // The tick yield is the loop's one routine suspension point;
            // everything else suspends only inside explicit reconnect waits
            ticker.tick().await;
            self.tick().await?;
        }
    }

    /// One full cycle; public so tests and embedders can drive the loop
    /// on their own scheduler
    pub async fn tick(&mut self) -> AgentResult<TickOutcome> {
        let now = self.clock.now();

        if !self.link.is_connected() {
            self.stats.link_recoveries += 1;
            self.sink.log(
                Severity::Warning,
                "No network connection. Trying to connect again!",
            );
            if !self.connect_link().await {
                let error = AgentError::LinkExhausted {
                    attempts: self.config.retry.retries,
                };
                self.sink.persist(
                    Severity::Error,
                    "Reconnection attempt failed - escalating to restart policy.",
                );
                self.restart.escalate(error).await;
                return Err(error);
            }
        }

        if self.transport.is_none() {
            self.sink.log(
                Severity::Info,
                &format!("Connecting to the broker {}", self.config.broker_host),
            );
            match self.factory.connect().await {
                Ok(transport) => {
                    self.transport = Some(transport);
                    self.stats.transport_connects += 1;
                }
                Err(error) => {
                    self.sink
                        .persist(Severity::Error, &format!("Error connecting to the broker: {error}"));
                    return Ok(TickOutcome::TransportDown);
                }
            }
        }

        if now.saturating_sub(self.cursor.last_publish_ms) < self.cursor.period_ms {
            return Ok(TickOutcome::Waiting);
        }

        let reading = match self.sensor.read().await {
            Ok(reading) => reading,
            Err(error) => {
                self.stats.sensor_misses += 1;
                self.sink
                    .log(Severity::Warning, &format!("{error}; retrying next tick"));
                return Ok(TickOutcome::SensorMiss);
            }
        };

        let (derivative, jerk) = match self.differencer.update(&reading) {
            Ok(differences) => differences,
            Err(error) => {
                self.sink.persist(Severity::Error, &format!("{error}"));
                return Ok(TickOutcome::NonMonotonic);
            }
        };

        let derivative_magnitude = derivative
            .as_ref()
            .map(|d| d.magnitude_over(&self.config.magnitude_fields));
        let jerk_magnitude = jerk
            .as_ref()
            .map(|j| j.magnitude_over(&self.config.magnitude_fields));

        // The period tracks signal dynamics even if the publish below
        // fails; transport health is handled separately
        let decision = self
            .config
            .cadence
            .decide(derivative_magnitude, jerk_magnitude);
        self.cursor.period_ms = decision.period_ms;

        match self
            .publish_cycle(now, &reading, derivative, jerk, derivative_magnitude, jerk_magnitude)
            .await
        {
            Ok(()) => Ok(TickOutcome::Published),
            Err(error) => {
                self.stats.publish_failures += 1;
                self.sink.persist(
                    Severity::Error,
                    &format!("Error occurred while sending data: {error}"),
                );
                self.drop_transport().await;
                Ok(TickOutcome::TransportDown)
            }
        }
    }

    /// Data publish plus auxiliary topics; cursor advances on data success
    async fn publish_cycle(
        &mut self,
        now: Timestamp,
        reading: &Reading,
        derivative: Option<Reading>,
        jerk: Option<Reading>,
        derivative_magnitude: Option<f32>,
        jerk_magnitude: Option<f32>,
    ) -> AgentResult<()> {
        let topic = self.config.data_topic();
        let elapsed = now.saturating_sub(self.cursor.last_publish_ms);
        self.sink.log(
            Severity::Info,
            &format!(
                "{:.2} seconds passed. Sending data to {topic}",
                elapsed as f64 / 1000.0
            ),
        );

        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => {
                return Err(AgentError::Transport {
                    reason: "transport handle absent",
                })
            }
        };

        transport.publish(&topic, &reading.to_payload()).await?;
        self.cursor.last_publish_ms = now;
        self.stats.publishes += 1;
        self.sink.log(Severity::Info, "Data sent!");

        if let (Some(derivative), Some(magnitude)) = (derivative, derivative_magnitude) {
            transport
                .publish(TOPIC_DERIVATIVE, &derivative.to_values_payload())
                .await?;
            transport
                .publish(TOPIC_DERIVATIVE_MAGNITUDE, format!("{magnitude}").as_bytes())
                .await?;
        }
        if let (Some(jerk), Some(magnitude)) = (jerk, jerk_magnitude) {
            transport.publish(TOPIC_JERK, &jerk.to_values_payload()).await?;
            transport
                .publish(TOPIC_JERK_MAGNITUDE, format!("{magnitude}").as_bytes())
                .await?;
        }

        Ok(())
    }

    async fn drop_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect().await;
        }
    }
}
