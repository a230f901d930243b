//! MQTT Transport over rumqttc
//!
//! ## Overview
//!
//! One broker session per factory connect. The session splits in two, the
//! way `rumqttc` wants it:
//!
//! ```text
//! MqttFactory::connect ─▶ AsyncClient ──publish──▶ broker
//!                          EventLoop  ◀─driver task─ (keepalive, acks)
//! ```
//!
//! The driver task polls the event loop in the background; on any
//! connection error it clears the shared `connected` flag and exits, which
//! makes the next `publish` fail fast with [`AgentError::Transport`]. The
//! telemetry loop then drops the handle and asks the factory for a fresh
//! session - reconnection policy stays in the loop, not in here.
//!
//! Publishes are QoS 0: the cadence engine prefers a fresh reading next
//! tick over redelivery of a stale one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadenza_core::config::AgentConfig;
use cadenza_core::{AgentError, AgentResult};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;

use crate::{Transport, TransportFactory};

/// MQTT-specific errors; collapsed to [`AgentError::Transport`] at the
/// trait boundary, with the dynamic detail logged here
#[derive(Debug, Error)]
pub enum MqttError {
    /// Request rejected by the client side
    #[error("client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Connection-level failure from the event loop
    #[error("connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// Broker never acknowledged the session
    #[error("timed out waiting for broker acknowledgement")]
    ConnAckTimeout,
}

/// Builder of broker sessions from the agent configuration
#[derive(Debug, Clone)]
pub struct MqttFactory {
    client_id: String,
    host: String,
    port: u16,
    user: Option<String>,
    password: Option<String>,
    keepalive_secs: u16,
    connect_timeout_ms: u64,
}

impl MqttFactory {
    /// Capture the broker parameters from the configuration
    ///
    /// The broker gets the same per-attempt patience as the link
    /// (`retry.timeout_ms`).
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            host: config.broker_host.clone(),
            port: config.broker_port,
            user: config.broker_user.clone(),
            password: config.broker_password.clone(),
            keepalive_secs: config.keepalive_secs,
            connect_timeout_ms: config.retry.timeout_ms,
        }
    }

    async fn wait_for_connack(
        eventloop: &mut EventLoop,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let acked = tokio::time::timeout(timeout, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(error) => return Err(MqttError::from(error)),
                }
            }
        })
        .await;

        match acked {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnAckTimeout),
        }
    }
}

#[async_trait]
impl TransportFactory for MqttFactory {
    type Transport = MqttTransport;

    async fn connect(&mut self) -> AgentResult<MqttTransport> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keepalive_secs as u64));
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            options.set_credentials(user, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 16);

        if let Err(error) =
            Self::wait_for_connack(&mut eventloop, Duration::from_millis(self.connect_timeout_ms))
                .await
        {
            log::warn!("MQTT session with {}:{} failed: {error}", self.host, self.port);
            return Err(AgentError::Transport {
                reason: "broker connect failed",
            });
        }

        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);
        let driver = tokio::spawn(async move {
            loop {
                if let Err(error) = eventloop.poll().await {
                    log::warn!("MQTT event loop error: {error}");
                    flag.store(false, Ordering::Release);
                    break;
                }
            }
        });

        log::info!("MQTT session established with {}:{}", self.host, self.port);
        Ok(MqttTransport {
            client,
            connected,
            driver,
        })
    }
}

/// One established broker session
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    driver: tokio::task::JoinHandle<()>,
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> AgentResult<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(AgentError::Transport {
                reason: "broker session lost",
            });
        }

        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|error| {
                log::warn!("MQTT publish to {topic} failed: {}", MqttError::from(error));
                AgentError::Transport {
                    reason: "publish failed",
                }
            })
    }

    async fn disconnect(&mut self) {
        let _ = self.client.disconnect().await;
        self.driver.abort();
    }
}
