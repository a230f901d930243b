//! Agent Orchestration
//!
//! Startup order mirrors the device firmware: establish the link first
//! (escalating if even the initial connect exhausts its retries), then run
//! the liveness indicator and the telemetry loop side by side on the
//! cooperative scheduler. The two tasks share only the link-state cell.

use cadenza_core::{AgentError, AgentResult, TimeSource};

use crate::liveness::liveness_task;
use crate::telemetry::TelemetryLoop;
use crate::{LinkDriver, RestartPolicy, Sensor, StatusIndicator, TransportFactory};

/// The assembled agent: telemetry loop plus liveness indicator
pub struct Agent<C, S, L, F, R, I>
where
    C: TimeSource,
    S: Sensor,
    L: LinkDriver,
    F: TransportFactory,
    R: RestartPolicy,
    I: StatusIndicator,
{
    telemetry: TelemetryLoop<C, S, L, F, R>,
    indicator: I,
}

impl<C, S, L, F, R, I> Agent<C, S, L, F, R, I>
where
    C: TimeSource,
    S: Sensor,
    L: LinkDriver,
    F: TransportFactory,
    R: RestartPolicy,
    I: StatusIndicator,
{
    /// Pair a telemetry loop with a liveness indicator
    pub fn new(telemetry: TelemetryLoop<C, S, L, F, R>, indicator: I) -> Self {
        Self {
            telemetry,
            indicator,
        }
    }

    /// Run until a fatal error escapes the telemetry loop
    ///
    /// The liveness task starts before the initial connect so the fast
    /// blink is already visible while the first attempt is in flight.
    pub async fn run(mut self) -> AgentResult<()> {
        log::info!("Starting program.");

        let state = self.telemetry.link_state();
        let blink = self.telemetry.blink_delays();
        let liveness = liveness_task(state, self.indicator, blink);
        tokio::pin!(liveness);

        let telemetry = async {
            if !self.telemetry.connect_link().await {
                let error = AgentError::LinkExhausted {
                    attempts: self.telemetry.retries(),
                };
                log::error!("Initial connect failed - escalating to restart policy.");
                self.telemetry.escalate(error).await;
                return Err(error);
            }
            self.telemetry.run().await
        };

        tokio::select! {
            result = telemetry => result,
            // Liveness never completes; this arm only keeps it polled
            _ = &mut liveness => Ok(()),
        }
    }
}
