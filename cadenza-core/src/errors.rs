//! Error Types for the Resilience and Cadence Engine
//!
//! ## Design Philosophy
//!
//! Cadenza's error system is designed for a battery-powered agent:
//!
//! 1. **Small Size**: Each variant carries only inline scalar context, since
//!    errors are produced in the per-tick hot path and immediately logged.
//!
//! 2. **No Heap Allocation**: Only `&'static str` reasons - dynamic detail
//!    (driver messages, broker responses) goes to the log sink, not the error.
//!
//! 3. **Copy Semantics**: Errors implement Copy so they can be returned,
//!    logged, and handed to the restart policy without move gymnastics.
//!
//! 4. **Closed Taxonomy**: Every failure a collaborator can raise maps to
//!    exactly one variant with a fixed recoverable/fatal classification.
//!
//! ## Recovery Classification
//!
//! | Variant                   | Classification | Recovery                        |
//! |---------------------------|----------------|---------------------------------|
//! | `LinkTimeout`             | recoverable    | retried with backoff            |
//! | `LinkExhausted`           | fatal          | surfaced to the restart policy  |
//! | `Transport`               | recoverable    | handle dropped, rebuilt next tick |
//! | `SensorRead`              | recoverable    | tick skipped, retried next tick |
//! | `DifferencerPrecondition` | recoverable    | reading rejected, state kept    |
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use cadenza_core::{AgentError, AgentResult};
//!
//! fn handle_cycle_error(err: AgentError) {
//!     match err {
//!         AgentError::LinkTimeout { .. } => {
//!             // One attempt timed out - the connectivity manager backs off
//!         }
//!         AgentError::LinkExhausted { .. } => {
//!             // All retries spent - escalate to the restart policy
//!         }
//!         AgentError::Transport { .. } => {
//!             // Drop the transport handle; it is rebuilt next tick
//!         }
//!         AgentError::SensorRead { .. } => {
//!             // Transient bus glitch - skip this tick only
//!         }
//!         AgentError::DifferencerPrecondition { .. } => {
//!             // Clock went backwards - log it, never divide by it
//!         }
//!     }
//! }
//! ```

use thiserror_no_std::Error;

use crate::time::Timestamp;

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent errors - kept small and Copy for the per-tick hot path
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AgentError {
    /// One connect attempt exceeded its timeout. Retried with backoff.
    #[error("Link attempt {attempt} exceeded {timeout_ms} ms")]
    LinkTimeout {
        /// 1-based attempt number within the current connect call
        attempt: u32,
        /// Per-attempt timeout that elapsed
        timeout_ms: u64,
    },

    /// All connect retries spent. Fatal - the caller decides restart policy.
    #[error("Link retries exhausted after {attempts} attempts")]
    LinkExhausted {
        /// Total attempts made before giving up
        attempts: u32,
    },

    /// Transport connect/publish failure. Recoverable by dropping and
    /// re-establishing the handle on the next tick.
    #[error("Transport failure: {reason}")]
    Transport {
        /// Static failure category; dynamic detail goes to the log sink
        reason: &'static str,
    },

    /// Transient sensor I/O failure. This tick's publish is skipped;
    /// a single miss never blocks subsequent readings.
    #[error("Sensor read failed: {reason}")]
    SensorRead {
        /// Static failure category; dynamic detail goes to the log sink
        reason: &'static str,
    },

    /// A reading arrived with a timestamp at or before the previous one.
    /// Surfaced explicitly rather than producing a difference artifact.
    #[error("Non-monotonic reading: previous {previous_ms} ms, current {current_ms} ms")]
    DifferencerPrecondition {
        /// Timestamp of the reading already held by the differencer
        previous_ms: Timestamp,
        /// Timestamp of the rejected reading
        current_ms: Timestamp,
    },
}

impl AgentError {
    /// Whether the agent can recover in-process, or must escalate
    pub const fn is_fatal(&self) -> bool {
        matches!(self, AgentError::LinkExhausted { .. })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AgentError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::LinkTimeout { attempt, timeout_ms } =>
                defmt::write!(fmt, "Link attempt {} exceeded {} ms", attempt, timeout_ms),
            Self::LinkExhausted { attempts } =>
                defmt::write!(fmt, "Link retries exhausted after {}", attempts),
            Self::Transport { reason } =>
                defmt::write!(fmt, "Transport: {}", reason),
            Self::SensorRead { reason } =>
                defmt::write!(fmt, "Sensor: {}", reason),
            Self::DifferencerPrecondition { previous_ms, current_ms } =>
                defmt::write!(fmt, "Non-monotonic: {} then {}", previous_ms, current_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhaustion_is_fatal() {
        assert!(AgentError::LinkExhausted { attempts: 3 }.is_fatal());
        assert!(!AgentError::LinkTimeout { attempt: 1, timeout_ms: 20_000 }.is_fatal());
        assert!(!AgentError::Transport { reason: "publish failed" }.is_fatal());
        assert!(!AgentError::SensorRead { reason: "bus glitch" }.is_fatal());
    }

    #[test]
    fn errors_stay_small() {
        // Returned every tick on failure paths; keep them register-friendly
        assert!(core::mem::size_of::<AgentError>() <= 24);
    }
}
