//! Time management for the telemetry agent
//!
//! Provides clock abstraction to handle different time sources:
//! - Monotonic clock since agent start (drives publish deadlines)
//! - System clock (when wall time is wanted in payloads)
//! - Fixed clock (for tests)
//!
//! Published timestamps are *seconds since agent epoch*: the agent keeps
//! all internal arithmetic monotonic so a wall-clock adjustment can never
//! move a publish deadline backwards.

/// Timestamp in milliseconds since agent epoch (or Unix epoch for wall clocks)
pub type Timestamp = u64;

/// Source of time for the agent
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;

    /// Get precision in milliseconds
    fn precision_ms(&self) -> u32;
}

/// Monotonic clock anchored at agent start
///
/// Starts at 0 when constructed, always increases, immune to NTP steps.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Anchor the agent epoch at the moment of construction
    pub fn new() -> Self {
        Self { epoch: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.epoch.elapsed().as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// System wall clock (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// Fixed time source for testing
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: Timestamp,
}

impl FixedClock {
    /// Create a clock frozen at the given timestamp
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute timestamp
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Advance by a number of milliseconds
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// Convert a millisecond timestamp to payload seconds
///
/// Published payloads carry seconds since agent epoch with millisecond
/// resolution, matching the sampling tick granularity.
pub fn to_payload_secs(timestamp: Timestamp) -> f64 {
    timestamp as f64 / 1000.0
}
