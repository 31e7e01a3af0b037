//! Comparison result document.
//!
//! [`ComparisonResult`] is what a caller receives from the engine. It
//! serializes to JSON with stable field order, so two identical runs produce
//! byte-identical documents.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::comparison::{Criterion, PairwiseMatrix, Recommendation};
use crate::domains::{OutcomeStatistics, YearProjection};
use crate::error::{SimResult, Violation};
use crate::scenario::DecisionType;

/// Whether every scheduled batch ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// All trials ran.
    Completed,
    /// Cancelled; statistics cover the completed batches only.
    Partial,
}

/// One option's place in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOption {
    /// 1 = best; tied options share a rank.
    pub rank: usize,
    /// Option name.
    pub option: String,
    /// Criterion score.
    pub score: f64,
    /// Outcome statistics.
    pub statistics: OutcomeStatistics,
}

/// An option that could not be simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionFailure {
    /// Option name.
    pub option: String,
    /// Human-readable reason.
    pub message: String,
    /// Underlying violations, if the failure came from input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

/// Non-fatal condition reported alongside the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Requested run count exceeded the maximum and was lowered.
    RunCountClamped {
        /// Runs asked for.
        requested: usize,
        /// Runs executed.
        clamped_to: usize,
    },
    /// Relative standard error is above the configured tolerance.
    ConvergenceNotReached {
        /// Option concerned.
        option: String,
        /// Standard error over |mean|.
        relative_error: f64,
        /// Configured tolerance.
        tolerance: f64,
    },
    /// Cancellation stopped the run early.
    PartialResult {
        /// Trials per option completed.
        completed_trials: usize,
        /// Trials per option requested.
        requested_trials: usize,
    },
    /// Some trials produced non-finite outcomes and were dropped.
    TrialsDiscarded {
        /// Option concerned.
        option: String,
        /// Trials dropped.
        discarded: usize,
        /// Trials run.
        total: usize,
    },
    /// An option was excluded from the comparison.
    OptionFailed {
        /// Option concerned.
        option: String,
        /// Why.
        message: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunCountClamped {
                requested,
                clamped_to,
            } => write!(f, "run count {requested} clamped to {clamped_to}"),
            Self::ConvergenceNotReached {
                option,
                relative_error,
                tolerance,
            } => write!(
                f,
                "{option}: relative standard error {relative_error:.4} exceeds {tolerance}"
            ),
            Self::PartialResult {
                completed_trials,
                requested_trials,
            } => write!(
                f,
                "partial result: {completed_trials} of {requested_trials} trials completed"
            ),
            Self::TrialsDiscarded {
                option,
                discarded,
                total,
            } => write!(f, "{option}: discarded {discarded} of {total} trials"),
            Self::OptionFailed { option, message } => write!(f, "{option}: {message}"),
        }
    }
}

/// Result of comparing a scenario's options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Decision type simulated.
    pub decision_type: DecisionType,
    /// Criterion used for ranking.
    pub criterion: Criterion,
    /// Master seed.
    pub seed: u64,
    /// Periods per trial.
    pub time_horizon_years: u32,
    /// Trials per option after clamping.
    pub monte_carlo_runs: usize,
    /// Completed or partial.
    pub status: RunStatus,
    /// Best first.
    pub rankings: Vec<RankedOption>,
    /// Winner or tie.
    pub recommendation: Recommendation,
    /// Pairwise win probabilities.
    pub pairwise: PairwiseMatrix,
    /// Expected path per option.
    pub projections: IndexMap<String, Vec<YearProjection>>,
    /// Options excluded from the comparison.
    #[serde(default)]
    pub failures: Vec<OptionFailure>,
    /// Non-fatal conditions.
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl ComparisonResult {
    /// True if the statistics cover only part of the requested trials.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Partial
    }

    /// Recommended option, if there is a single winner.
    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        self.recommendation.winner()
    }

    /// Ranking entry of `option`.
    #[must_use]
    pub fn ranking(&self, option: &str) -> Option<&RankedOption> {
        self.rankings.iter().find(|r| r.option == option)
    }

    /// Statistics of `option`.
    #[must_use]
    pub fn statistics(&self, option: &str) -> Option<&OutcomeStatistics> {
        self.ranking(option).map(|r| &r.statistics)
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::Json`] if serialization fails.
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
