//! Adaptive Publish-Cadence Policy
//!
//! ## Overview
//!
//! The cadence policy turns derivative/jerk magnitudes into the delay
//! before the next publish. Three tiers:
//!
//! | Tier        | Trigger                                        | Period        |
//! |-------------|------------------------------------------------|---------------|
//! | `Immediate` | either magnitude above its primary threshold   | 0 (every tick)|
//! | `Elevated`  | either magnitude above its elevated threshold  | short (10 s)  |
//! | `Calm`      | neither condition holds                        | long (60 s)   |
//!
//! Urgency wins: when both magnitudes exceed their primary thresholds the
//! decision is still `Immediate` - the most urgent tier always takes
//! precedence over calmer ones, and ties resolve to the shortest period.
//!
//! The elevated thresholds default to the primary thresholds, which makes
//! the middle band empty until a deployment configures it lower. A policy
//! that never uses the elevated tier degrades exactly to the two-tier
//! fast/slow behavior.
//!
//! ## Warm-up
//!
//! Until the differencer has produced both a derivative and a jerk the
//! policy reports `Immediate`: with no evidence of calm, the agent
//! publishes on every tick rather than sitting silent for a long period.

/// Cadence tier, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceTier {
    /// Publish on every tick
    Immediate,
    /// Publish on the short period
    Elevated,
    /// Publish on the long period
    Calm,
}

/// One cadence decision: the tier taken and the resulting period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceDecision {
    /// Tier the magnitudes landed in
    pub tier: CadenceTier,
    /// Delay before the next publish, in milliseconds
    pub period_ms: u64,
}

/// Thresholds and periods for the three-tier cadence decision
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CadencePolicy {
    /// Derivative magnitude above this is urgent
    pub derivative_threshold: f32,
    /// Jerk magnitude above this is urgent
    pub jerk_threshold: f32,
    /// Derivative magnitude above this (but not urgent) is elevated
    pub elevated_derivative_threshold: f32,
    /// Jerk magnitude above this (but not urgent) is elevated
    pub elevated_jerk_threshold: f32,
    /// Period for the elevated tier, in milliseconds
    pub short_period_ms: u64,
    /// Period for the calm tier, in milliseconds
    pub long_period_ms: u64,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        Self {
            derivative_threshold: 0.1,
            jerk_threshold: 0.05,
            // Elevated band collapsed until configured lower
            elevated_derivative_threshold: 0.1,
            elevated_jerk_threshold: 0.05,
            short_period_ms: 10_000,
            long_period_ms: 60_000,
        }
    }
}

impl CadencePolicy {
    /// Set the primary (urgent) thresholds
    pub fn with_thresholds(mut self, derivative: f32, jerk: f32) -> Self {
        self.derivative_threshold = derivative;
        self.jerk_threshold = jerk;
        self
    }

    /// Open the elevated band by giving it lower thresholds of its own
    pub fn with_elevated_thresholds(mut self, derivative: f32, jerk: f32) -> Self {
        self.elevated_derivative_threshold = derivative;
        self.elevated_jerk_threshold = jerk;
        self
    }

    /// Set the elevated/calm periods in milliseconds
    pub fn with_periods(mut self, short_ms: u64, long_ms: u64) -> Self {
        self.short_period_ms = short_ms;
        self.long_period_ms = long_ms;
        self
    }

    /// Decide the next publish period from the current magnitudes
    ///
    /// `None` magnitudes mean the differencer is not warm yet; the policy
    /// stays at `Immediate` until both differences exist.
    pub fn decide(
        &self,
        derivative_magnitude: Option<f32>,
        jerk_magnitude: Option<f32>,
    ) -> CadenceDecision {
        let (d, j) = match (derivative_magnitude, jerk_magnitude) {
            (Some(d), Some(j)) => (d, j),
            _ => {
                return CadenceDecision {
                    tier: CadenceTier::Immediate,
                    period_ms: 0,
                }
            }
        };

        // Most urgent tier first; "both above" therefore lands here too
        if d > self.derivative_threshold || j > self.jerk_threshold {
            CadenceDecision {
                tier: CadenceTier::Immediate,
                period_ms: 0,
            }
        } else if d > self.elevated_derivative_threshold || j > self.elevated_jerk_threshold {
            CadenceDecision {
                tier: CadenceTier::Elevated,
                period_ms: self.short_period_ms,
            }
        } else {
            CadenceDecision {
                tier: CadenceTier::Calm,
                period_ms: self.long_period_ms,
            }
        }
    }
}
