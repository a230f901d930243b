//! End-to-end scenarios for the telemetry loop
//!
//! Every test drives `tick()` directly on a mock clock: one call per
//! scheduler tick, with the clock advanced in between, so publish
//! deadlines and cadence decisions are asserted without wall-clock time.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cadenza_agent::{TelemetryLoop, TickOutcome};
use cadenza_core::config::AgentConfig;
use cadenza_core::AgentError;

use common::{
    fast_retry, CountingIndicator, FakeFactory, FakeLink, FakeSensor, LinkControl, MockClock,
    RecordingRestart, SensorControl, TransportLog,
};

struct Rig {
    clock: MockClock,
    link: Arc<LinkControl>,
    sensor: Arc<SensorControl>,
    transport: Arc<TransportLog>,
    restart: RecordingRestart,
    telemetry: TelemetryLoop<MockClock, FakeSensor, FakeLink, FakeFactory, RecordingRestart>,
    data_topic: String,
}

fn rig(config: AgentConfig, connect_after_polls: u32) -> Rig {
    let clock = MockClock::new(0);
    let link = LinkControl::new(connect_after_polls);
    let sensor = SensorControl::new([21.5, 1013.2, 40.0, 120.0]);
    let transport = TransportLog::new();
    let restart = RecordingRestart::default();
    let data_topic = config.data_topic();

    let telemetry = TelemetryLoop::new(
        config,
        clock.clone(),
        FakeSensor {
            clock: clock.clone(),
            control: Arc::clone(&sensor),
        },
        FakeLink(Arc::clone(&link)),
        FakeFactory(Arc::clone(&transport)),
        restart.clone(),
    );

    Rig {
        clock,
        link,
        sensor,
        transport,
        restart,
        telemetry,
        data_topic,
    }
}

fn quiet_config() -> AgentConfig {
    AgentConfig::new("net", "pw", "broker.local").retry(fast_retry())
}

#[tokio::test(start_paused = true)]
async fn constant_readings_settle_to_the_long_period() {
    let mut rig = rig(quiet_config(), 0);

    // Warm-up: immediate cadence until derivative and jerk both exist
    for tick in 0..3 {
        rig.clock.set(tick * 1_000);
        assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
    }
    // Constant signal: derivative and jerk are all-zero, cadence is calm
    assert_eq!(rig.telemetry.cursor().period_ms, 60_000);

    let derivatives = rig.transport.on_topic("derivative");
    let latest: serde_json::Value = serde_json::from_slice(derivatives.last().unwrap()).unwrap();
    assert_eq!(latest["temperature"], 0.0);
    assert_eq!(latest["pressure"], 0.0);

    // Five ticks starting once the long period has elapsed: exactly one
    // publish among them
    let published_before = rig.transport.on_topic(&rig.data_topic).len();
    let mut outcomes = Vec::new();
    for tick in 0..5 {
        rig.clock.set(62_000 + tick * 1_000);
        outcomes.push(rig.telemetry.tick().await.unwrap());
    }

    let published_during = rig.transport.on_topic(&rig.data_topic).len() - published_before;
    assert_eq!(published_during, 1);
    assert_eq!(outcomes[0], TickOutcome::Published);
    assert!(outcomes[1..].iter().all(|o| *o == TickOutcome::Waiting));
}

#[tokio::test(start_paused = true)]
async fn data_payload_carries_fields_and_seconds() {
    let mut rig = rig(quiet_config(), 0);

    rig.clock.set(61_250);
    rig.telemetry.tick().await.unwrap();

    let payloads = rig.transport.on_topic(&rig.data_topic);
    let payload: serde_json::Value = serde_json::from_slice(&payloads[0]).unwrap();
    assert_eq!(payload["temperature"], 21.5);
    assert_eq!(payload["gas"], 120.0);
    assert_eq!(payload["timestamp"], 61.25);
}

#[tokio::test(start_paused = true)]
async fn step_change_snaps_cadence_back_to_immediate() {
    let mut rig = rig(quiet_config(), 0);

    for tick in 0..3 {
        rig.clock.set(tick * 1_000);
        rig.telemetry.tick().await.unwrap();
    }
    assert_eq!(rig.telemetry.cursor().period_ms, 60_000);

    // A 5-degree step dwarfs the 0.1 derivative threshold
    rig.sensor.values.lock().unwrap()[0] += 5.0;
    rig.clock.set(62_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
    assert_eq!(rig.telemetry.cursor().period_ms, 0);

    // Next tick publishes again right away
    rig.clock.set(63_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_recovers_with_exactly_one_reconnect() {
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("agent.log");
    let config = quiet_config().log_file(&log_path);
    let mut rig = rig(config, 0);

    rig.transport.fail_publishes.store(1, Ordering::Release);

    // Failed publish: handle dropped, error persisted, loop intact
    assert_eq!(
        rig.telemetry.tick().await.unwrap(),
        TickOutcome::TransportDown
    );
    assert_eq!(rig.transport.disconnects.load(Ordering::Acquire), 1);

    // Next tick re-establishes the transport once and publishes
    rig.clock.set(1_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
    assert_eq!(rig.transport.connects.load(Ordering::Acquire), 2);
    assert_eq!(rig.telemetry.stats().publishes, 1);
    assert_eq!(rig.telemetry.stats().publish_failures, 1);

    // Exactly one error record made it to the file
    let log = std::fs::read_to_string(&log_path).unwrap();
    let errors: Vec<_> = log.lines().filter(|l| l.starts_with("[ERROR]")).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Error occurred while sending data"));
}

#[tokio::test(start_paused = true)]
async fn broker_connect_failure_ends_the_cycle_without_publishing() {
    let mut rig = rig(quiet_config(), 0);
    rig.transport.fail_connects.store(1, Ordering::Release);

    assert_eq!(
        rig.telemetry.tick().await.unwrap(),
        TickOutcome::TransportDown
    );
    assert!(rig.transport.on_topic(&rig.data_topic).is_empty());

    rig.clock.set(1_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
}

#[tokio::test(start_paused = true)]
async fn sensor_miss_skips_exactly_one_tick() {
    let mut rig = rig(quiet_config(), 0);
    rig.sensor.fail_next.store(1, Ordering::Release);

    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::SensorMiss);
    assert_eq!(rig.telemetry.stats().sensor_misses, 1);
    assert!(rig.transport.on_topic(&rig.data_topic).is_empty());

    rig.clock.set(1_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
}

#[tokio::test(start_paused = true)]
async fn stalled_clock_is_surfaced_and_survived() {
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("agent.log");
    let mut rig = rig(quiet_config().log_file(&log_path), 0);

    rig.clock.set(1_000);
    rig.telemetry.tick().await.unwrap();

    // Clock not advanced: the reading repeats its timestamp
    assert_eq!(
        rig.telemetry.tick().await.unwrap(),
        TickOutcome::NonMonotonic
    );
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Non-monotonic reading"));

    rig.clock.set(2_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
}

#[tokio::test(start_paused = true)]
async fn link_loss_recovers_inside_the_tick() {
    let mut rig = rig(quiet_config(), 0);
    rig.telemetry.tick().await.unwrap();

    // Link drops; re-association takes a few polls
    rig.link.drop_link(3);
    rig.clock.set(1_000);
    assert_eq!(rig.telemetry.tick().await.unwrap(), TickOutcome::Published);
    assert_eq!(rig.telemetry.stats().link_recoveries, 1);
}

#[tokio::test(start_paused = true)]
async fn agent_startup_escalates_when_the_link_never_comes_up() {
    let rig = rig(quiet_config(), LinkControl::NEVER);
    let indicator = CountingIndicator::default();
    let toggles = Arc::clone(&indicator.0);

    let agent = cadenza_agent::Agent::new(rig.telemetry, indicator);
    let result = agent.run().await;

    assert_eq!(result, Err(AgentError::LinkExhausted { attempts: 3 }));
    assert_eq!(rig.restart.0.lock().unwrap().len(), 1);
    // The liveness task was blinking (fast) while the connect was failing
    assert!(toggles.load(Ordering::Acquire) >= 1);
}

#[tokio::test(start_paused = true)]
async fn link_exhaustion_escalates_once_and_surfaces_the_error() {
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("agent.log");
    let mut rig = rig(quiet_config().log_file(&log_path), LinkControl::NEVER);

    let error = rig.telemetry.tick().await.unwrap_err();
    assert_eq!(error, AgentError::LinkExhausted { attempts: 3 });

    let escalations = rig.restart.0.lock().unwrap();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0], AgentError::LinkExhausted { attempts: 3 });

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Reconnection attempt failed"));
}
