//! Trial quality guard.
//!
//! A single pathological trial (NaN or infinity from an extreme draw) must
//! not poison an option's distribution. The guard inspects every outcome,
//! discards non-finite ones, and stops the line for an option once the
//! discarded share exceeds the configured limit.
//!
//! # Severity Levels
//!
//! - **Acceptable**: nothing discarded
//! - **Warning**: some trials discarded, within the limit (reported, continue)
//! - **Critical**: limit exceeded (the option fails)

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{SimError, SimResult};

/// Graduated verdict on an option's discarded trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualitySeverity {
    /// No trial discarded.
    Acceptable,
    /// Some trials discarded, within the limit.
    Warning,
    /// Discard limit exceeded.
    Critical,
}

/// Per-option trial guard.
///
/// # Example
///
/// ```rust
/// use decisim::engine::guard::{QualitySeverity, TrialGuard};
///
/// let mut guard = TrialGuard::new(0.05);
/// assert_eq!(guard.admit(1.0), Some(1.0));
/// assert_eq!(guard.admit(f64::NAN), None);
/// assert_eq!(guard.severity(), QualitySeverity::Critical);
/// ```
#[derive(Debug, Clone)]
pub struct TrialGuard {
    max_discard_fraction: f64,
    total: usize,
    discarded: usize,
}

impl TrialGuard {
    /// Create a guard with the given discard limit.
    #[must_use]
    pub const fn new(max_discard_fraction: f64) -> Self {
        Self {
            max_discard_fraction,
            total: 0,
            discarded: 0,
        }
    }

    /// Create from engine configuration.
    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.quality.max_discard_fraction)
    }

    /// Inspect one outcome: finite outcomes pass, others are counted and dropped.
    pub fn admit(&mut self, outcome: f64) -> Option<f64> {
        self.total += 1;
        if outcome.is_finite() {
            Some(outcome)
        } else {
            self.discarded += 1;
            None
        }
    }

    /// Trials inspected so far.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Trials discarded so far.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Discarded share of inspected trials (0 when nothing was inspected).
    #[must_use]
    pub fn discard_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.discarded as f64 / self.total as f64
        }
    }

    /// Classify the discard count.
    #[must_use]
    pub fn severity(&self) -> QualitySeverity {
        if self.discarded == 0 {
            QualitySeverity::Acceptable
        } else if self.discard_fraction() > self.max_discard_fraction
            || self.discarded == self.total
        {
            QualitySeverity::Critical
        } else {
            QualitySeverity::Warning
        }
    }

    /// Stop the line for `option` if the discard limit is exceeded.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SimulationQuality`] on [`QualitySeverity::Critical`].
    pub fn check(&self, option: &str) -> SimResult<()> {
        if self.severity() == QualitySeverity::Critical {
            return Err(SimError::SimulationQuality {
                option: option.to_string(),
                discarded: self.discarded,
                total: self.total,
                max_fraction: self.max_discard_fraction,
            });
        }
        Ok(())
    }
}
