//! Liveness Indicator Task
//!
//! A headless agent still needs one glanceable health signal: the
//! indicator toggles forever, slow while the link is up, fast while it is
//! down or recovering. Blink rate is therefore a crude but honest encoding
//! of [`LinkState`](crate::LinkState).
//!
//! The task shares exactly one value with the rest of the agent - the
//! read-only link-state handle - so it can never interfere with the
//! telemetry loop.

use std::time::Duration;

use cadenza_core::config::BlinkDelays;

use crate::link::LinkStateHandle;
use crate::StatusIndicator;

/// Toggle the indicator forever at a rate encoding current link state
pub async fn liveness_task<I: StatusIndicator>(
    state: LinkStateHandle,
    mut indicator: I,
    blink: BlinkDelays,
) {
    loop {
        indicator.toggle();
        let delay_ms = if state.is_connected() {
            blink.slow_ms
        } else {
            blink.fast_ms
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}
