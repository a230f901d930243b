//! Core policy engine for Cadenza
//!
//! Holds the stateful, failure-handling, numeric parts of the telemetry
//! agent: the windowed finite-difference estimator, the adaptive cadence
//! policy, the rotating log sink, and the shared error/time/config types.
//! Everything that touches hardware or the network lives in
//! `cadenza-agent` behind collaborator traits.
//!
//! Key constraints:
//! - No heap allocation in the per-tick numeric path (readings are
//!   bounded `heapless` maps)
//! - `no_std`-capable policy core; file logging and configuration sit
//!   behind the default `std` feature
//!
//! ```
//! use cadenza_core::{CadencePolicy, Field, Reading, WindowedDifferencer};
//!
//! let mut differencer = WindowedDifferencer::new();
//! let policy = CadencePolicy::default();
//!
//! let reading = Reading::new(1_000).with(Field::Temperature, 21.5);
//! let (derivative, jerk) = differencer.update(&reading).unwrap();
//!
//! let decision = policy.decide(
//!     derivative.map(|d| d.magnitude_over(&[Field::Temperature])),
//!     jerk.map(|j| j.magnitude_over(&[Field::Temperature])),
//! );
//! assert_eq!(decision.period_ms, 0); // still warming up
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cadence;
pub mod differencer;
pub mod errors;
pub mod reading;
pub mod time;

#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod logsink;

// Public API
pub use cadence::{CadenceDecision, CadencePolicy, CadenceTier};
pub use differencer::{Differences, WindowedDifferencer};
pub use errors::{AgentError, AgentResult};
pub use reading::{Field, Reading};
pub use time::{TimeSource, Timestamp};

#[cfg(feature = "std")]
pub use logsink::{LogRecord, RotatingLogSink, Severity};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
