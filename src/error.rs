//! Error types for decisim.
//!
//! Every public operation returns `Result<T, SimError>`. Input problems are
//! collected exhaustively before any trial runs, so a caller always sees the
//! full list of violations rather than the first one found.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::DecisionType;

/// Result type alias for decisim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all decisim operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Input Errors =====
    /// Malformed random variable parameters or missing/malformed factors.
    #[error("Validation failed with {} violation(s): {}", .violations.len(), join(.violations))]
    Validation {
        /// Every violation found.
        violations: Vec<Violation>,
    },

    /// An option's factor set belongs to a different decision type.
    #[error("Schema mismatch for {decision_type} scenario: {}", join(.violations))]
    SchemaMismatch {
        /// Decision type declared by the scenario.
        decision_type: DecisionType,
        /// Every violation found, including the mismatches.
        violations: Vec<Violation>,
    },

    /// Referenced facts could not be resolved for any option.
    #[error("Fact lookup failed for every option: {}", join(.violations))]
    FactLookup {
        /// One entry per unresolved reference.
        violations: Vec<Violation>,
    },

    // ===== Execution Errors =====
    /// Caller cancelled the request before a single batch completed.
    #[error("Simulation cancelled after {completed_trials} completed trial(s)")]
    Cancelled {
        /// Trials per option completed before cancellation.
        completed_trials: usize,
    },

    /// Too many trials of an option produced non-finite outcomes.
    #[error(
        "Simulation quality: option '{option}' discarded {discarded} of {total} trials \
         (limit {:.1}%)",
        .max_fraction * 100.0
    )]
    SimulationQuality {
        /// Option whose simulation failed.
        option: String,
        /// Number of discarded trials.
        discarded: usize,
        /// Number of executed trials.
        total: usize,
        /// Configured maximum discard fraction.
        max_fraction: f64,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Configuration field constraints violated.
    #[error("Configuration validation error: {0}")]
    ConfigValidation(#[from] validator::ValidationErrors),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a validation error from a list of violations.
    #[must_use]
    pub const fn validation(violations: Vec<Violation>) -> Self {
        Self::Validation { violations }
    }

    /// Violations carried by this error, if it is an input error.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation { violations }
            | Self::SchemaMismatch { violations, .. }
            | Self::FactLookup { violations } => violations,
            _ => &[],
        }
    }

    /// Check if this error was caused by the caller's input (no trial ran).
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::SchemaMismatch { .. } | Self::FactLookup { .. }
        )
    }
}

/// A single problem found while validating a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Option the problem belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    /// Factor the problem belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<String>,
    /// What went wrong.
    pub kind: ViolationKind,
}

impl Violation {
    /// Scenario-level violation (not tied to an option).
    #[must_use]
    pub fn scenario(message: impl Into<String>) -> Self {
        Self {
            option: None,
            factor: None,
            kind: ViolationKind::Scenario {
                message: message.into(),
            },
        }
    }

    /// Violation tied to one factor of one option.
    #[must_use]
    pub fn factor(option: &str, factor: &str, kind: ViolationKind) -> Self {
        Self {
            option: Some(option.to_string()),
            factor: Some(factor.to_string()),
            kind,
        }
    }

    /// Violation of a bare parameter (no option context yet).
    #[must_use]
    pub fn parameter(message: impl Into<String>) -> Self {
        Self {
            option: None,
            factor: None,
            kind: ViolationKind::InvalidParameter {
                message: message.into(),
            },
        }
    }

    /// Attach option and factor context to a context-free violation.
    #[must_use]
    pub fn within(mut self, option: &str, factor: &str) -> Self {
        self.option.get_or_insert_with(|| option.to_string());
        self.factor.get_or_insert_with(|| factor.to_string());
        self
    }

    /// True if this is a missing-factor violation for `factor`.
    #[must_use]
    pub fn is_missing(&self, factor: &str) -> bool {
        matches!(self.kind, ViolationKind::MissingFactor) && self.factor.as_deref() == Some(factor)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.option, &self.factor) {
            (Some(option), Some(factor)) => write!(f, "{option}.{factor}: {}", self.kind),
            (Some(option), None) => write!(f, "{option}: {}", self.kind),
            (None, Some(factor)) => write!(f, "{factor}: {}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

/// Classification of a validation problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A factor required by the decision type is absent.
    MissingFactor,
    /// A factor not in the decision type's schema was supplied.
    UnknownFactor,
    /// A distribution parameter is out of range or not finite.
    InvalidParameter {
        /// Description of the problem.
        message: String,
    },
    /// A factor must be a plain constant but was given as a distribution.
    WrongFactorKind {
        /// Description of the problem.
        message: String,
    },
    /// The option's factors match another decision type's schema.
    SchemaMismatch {
        /// Decision type the factors appear to describe.
        detected: DecisionType,
    },
    /// A reference key could not be resolved by the fact provider.
    FactNotFound {
        /// The unresolved key.
        key: String,
    },
    /// Scenario-level problem (horizon, run count, option list).
    Scenario {
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFactor => write!(f, "required factor is missing"),
            Self::UnknownFactor => write!(f, "factor is not part of the schema"),
            Self::InvalidParameter { message } | Self::WrongFactorKind { message } => {
                write!(f, "{message}")
            }
            Self::SchemaMismatch { detected } => {
                write!(f, "factors describe a {detected} decision")
            }
            Self::FactNotFound { key } => write!(f, "fact '{key}' not found"),
            Self::Scenario { message } => write!(f, "{message}"),
        }
    }
}
