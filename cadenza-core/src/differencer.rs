//! Windowed Finite-Difference Estimator
//!
//! ## Overview
//!
//! The differencer turns the stream of sensor readings into per-field
//! first and second differences - "derivative" and "jerk" in agent
//! terminology. Both are *per call*, not per wall-clock second: the
//! telemetry loop feeds the differencer on a fixed ~1 s tick, so call
//! rate and physical time coincide and no division by Δt is needed.
//!
//! ## Window Semantics
//!
//! The window is exactly two deep - the most recent reading and the most
//! recent first difference:
//!
//! ```text
//! update #1: r1            → (None, None)
//! update #2: r2            → (Some(r2−r1), None)
//! update #3: r3            → (Some(r3−r2), Some((r3−r2)−(r2−r1)))
//! ```
//!
//! Timestamps must be strictly increasing. A stalled or stepped-back
//! clock is a contract violation surfaced as
//! [`AgentError::DifferencerPrecondition`]; the stored state is left
//! untouched so the next well-formed reading resumes cleanly.

use crate::errors::{AgentError, AgentResult};
use crate::reading::Reading;

/// Derivative and jerk for one accepted reading
///
/// Derivative is present from the second accepted reading on, jerk from
/// the third.
pub type Differences = (Option<Reading>, Option<Reading>);

/// Two-deep finite-difference state over a reading stream
///
/// Owned by exactly one telemetry loop; the stored snapshot always
/// reflects the input of the most recent *accepted* `update` call.
#[derive(Debug, Clone, Default)]
pub struct WindowedDifferencer {
    previous: Option<Reading>,
    previous_derivative: Option<Reading>,
}

impl WindowedDifferencer {
    /// Create a differencer with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one reading; get back `(derivative, jerk)`
    ///
    /// Fields present in the current reading but absent from the previous
    /// one difference against `0` (see [`Reading::difference_from`]).
    ///
    /// ## Errors
    ///
    /// Rejects readings whose timestamp is not strictly after the stored
    /// one. The rejected reading is *not* absorbed into the window.
    pub fn update(&mut self, reading: &Reading) -> AgentResult<Differences> {
        let previous = match &self.previous {
            None => {
                self.previous = Some(reading.clone());
                return Ok((None, None));
            }
            Some(previous) => previous,
        };

        if reading.timestamp() <= previous.timestamp() {
            return Err(AgentError::DifferencerPrecondition {
                previous_ms: previous.timestamp(),
                current_ms: reading.timestamp(),
            });
        }

        let derivative = reading.difference_from(previous);
        let jerk = self
            .previous_derivative
            .as_ref()
            .map(|prev_d| derivative.difference_from(prev_d));

        // Commit both snapshots only after every output is computed, so the
        // returned tuple and the stored state describe the same input.
        self.previous = Some(reading.clone());
        self.previous_derivative = Some(derivative.clone());

        Ok((Some(derivative), jerk))
    }

    /// Drop all history; the next update behaves like the first
    pub fn reset(&mut self) {
        self.previous = None;
        self.previous_derivative = None;
    }

    /// Whether both a derivative and a jerk can be produced on the next
    /// well-formed update
    pub fn is_warm(&self) -> bool {
        self.previous_derivative.is_some()
    }
}
