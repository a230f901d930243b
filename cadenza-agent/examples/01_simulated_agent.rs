//! Simulated end-to-end agent run
//!
//! Wires the telemetry loop to simulated collaborators: an always-up
//! link, a console transport, and a sensor that holds steady for a while
//! and then takes a temperature step. Watch the cadence settle to the
//! long period on the constant signal and snap back to immediate when
//! the step hits.
//!
//! Run with:
//! ```bash
//! cargo run --example 01_simulated_agent
//! ```

use std::time::Duration;

use async_trait::async_trait;
use cadenza_agent::{
    ConnectPending, LinkDriver, LinkStatus, RestartPolicy, Sensor, TelemetryLoop, Transport,
    TransportFactory,
};
use cadenza_core::config::AgentConfig;
use cadenza_core::time::MonotonicClock;
use cadenza_core::{AgentError, AgentResult, CadencePolicy, Field, Reading, TimeSource};

/// Steady environmental signal with one temperature step partway in
struct SimulatedSensor {
    clock: MonotonicClock,
    reads: u32,
}

#[async_trait]
impl Sensor for SimulatedSensor {
    async fn read(&mut self) -> AgentResult<Reading> {
        self.reads += 1;
        // Door opens at read 16: a 5-degree step with a humidity dip
        let (temperature, humidity) = if self.reads < 16 {
            (21.5, 40.0)
        } else {
            (26.5, 33.0)
        };

        Ok(Reading::new(self.clock.now())
            .with(Field::Temperature, temperature)
            .with(Field::Pressure, 1013.2)
            .with(Field::Humidity, humidity)
            .with(Field::Gas, 120.0))
    }
}

/// Link that is simply always associated
struct AlwaysUpLink;

impl LinkDriver for AlwaysUpLink {
    fn activate(&mut self) {}
    fn request_connect(&mut self, _: &str, _: &str) -> Result<(), ConnectPending> {
        Ok(())
    }
    fn is_connected(&self) -> bool {
        true
    }
    fn status(&self) -> LinkStatus {
        LinkStatus::GotIp
    }
    fn disconnect(&mut self) {}
    fn local_address(&self) -> Option<std::net::IpAddr> {
        Some("192.168.4.21".parse().unwrap())
    }
}

/// Transport that prints instead of publishing
struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> AgentResult<()> {
        println!("  -> {topic}: {}", String::from_utf8_lossy(payload));
        Ok(())
    }

    async fn disconnect(&mut self) {}
}

struct ConsoleFactory;

#[async_trait]
impl TransportFactory for ConsoleFactory {
    type Transport = ConsoleTransport;

    async fn connect(&mut self) -> AgentResult<ConsoleTransport> {
        Ok(ConsoleTransport)
    }
}

/// Demo never restarts; it just reports what would have happened
struct PrintOnFatal;

#[async_trait]
impl RestartPolicy for PrintOnFatal {
    async fn escalate(&mut self, error: AgentError) {
        println!("!! would restart the agent: {error}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Short demo periods so the cadence shift is visible in seconds
    let config = AgentConfig::new("demo-net", "demo-pw", "broker.local")
        .client_id("simulated")
        .sensor_name("BME688")
        .cadence(CadencePolicy::default().with_periods(1_000, 4_000));

    let clock = MonotonicClock::new();
    let sensor = SimulatedSensor {
        clock: clock.clone(),
        reads: 0,
    };

    let mut telemetry = TelemetryLoop::new(
        config,
        clock,
        sensor,
        AlwaysUpLink,
        ConsoleFactory,
        PrintOnFatal,
    );

    assert!(telemetry.connect_link().await);

    for _ in 0..40 {
        let outcome = telemetry.tick().await.expect("demo collaborators never go fatal");
        println!("tick: {outcome:?} (period {} ms)", telemetry.cursor().period_ms);
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let stats = telemetry.stats();
    println!(
        "done: {} publishes, {} misses, {} transport connects",
        stats.publishes, stats.sensor_misses, stats.transport_connects
    );
}
