//! Structured decision scenarios.
//!
//! A [`Scenario`] is what the engine consumes: the decision type, the
//! competing options with their raw factors, the time horizon and the
//! optional run count, seed and ranking criterion. Scenarios load from YAML
//! or JSON.
//!
//! ```yaml
//! decision_type: investment
//! time_horizon_years: 10
//! monte_carlo_runs: 10000
//! seed: 42
//! options:
//!   - name: StockFund
//!     factors:
//!       initial_amount: 10000
//!       expected_return: { kind: normal, mean: 0.07, std_dev: 0.15 }
//! ```

pub mod factors;
pub mod variable;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use factors::{FactorInput, FactorSchema, OptionFactorSet, VariableSpec};
pub use variable::{Bounds, Distribution, RandomVariable};

use crate::comparison::Criterion;
use crate::error::{SimError, SimResult, Violation};

/// Longest supported horizon, in years.
pub const MAX_HORIZON_YEARS: u32 = 100;

/// Kind of decision being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Moving to another city.
    Relocation,
    /// Buying an asset (car, house, equipment).
    Purchase,
    /// Choosing between job offers.
    Job,
    /// Allocating money to an investment.
    Investment,
}

impl DecisionType {
    /// Every decision type.
    pub const ALL: [Self; 4] = [Self::Relocation, Self::Purchase, Self::Job, Self::Investment];

    /// Direction in which outcomes improve.
    #[must_use]
    pub const fn polarity(self) -> Polarity {
        match self {
            Self::Purchase => Polarity::LowerIsBetter,
            Self::Relocation | Self::Job | Self::Investment => Polarity::HigherIsBetter,
        }
    }

    /// Default boundary of an adverse outcome.
    ///
    /// Net savings, compensation net of penalty and net gain are adverse
    /// below zero; purchase cost is adverse above the budget, which the
    /// outcome already subtracts.
    #[must_use]
    pub const fn adverse_threshold(self) -> f64 {
        0.0
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relocation => "relocation",
            Self::Purchase => "purchase",
            Self::Job => "job",
            Self::Investment => "investment",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome polarity of a decision type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Larger outcomes are better (wealth, savings).
    HigherIsBetter,
    /// Smaller outcomes are better (cost).
    LowerIsBetter,
}

impl Polarity {
    /// True if `a` is strictly better than `b`.
    #[must_use]
    pub fn beats(self, a: f64, b: f64) -> bool {
        match self {
            Self::HigherIsBetter => a > b,
            Self::LowerIsBetter => a < b,
        }
    }

    /// True if `outcome` is on the wrong side of `threshold`.
    #[must_use]
    pub fn is_adverse(self, outcome: f64, threshold: f64) -> bool {
        match self {
            Self::HigherIsBetter => outcome < threshold,
            Self::LowerIsBetter => outcome > threshold,
        }
    }
}

/// Number of yearly periods to simulate (>= 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TimeHorizon(u32);

impl TimeHorizon {
    /// Create a horizon.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `1 <= years <= MAX_HORIZON_YEARS`.
    pub fn new(years: u32) -> SimResult<Self> {
        match Self::check(years) {
            None => Ok(Self(years)),
            Some(v) => Err(SimError::validation(vec![v])),
        }
    }

    fn check(years: u32) -> Option<Violation> {
        (!(1..=MAX_HORIZON_YEARS).contains(&years)).then(|| {
            Violation::scenario(format!(
                "time_horizon_years must be between 1 and {MAX_HORIZON_YEARS}, got {years}"
            ))
        })
    }

    /// Number of periods.
    #[must_use]
    pub const fn years(self) -> u32 {
        self.0
    }
}

/// One candidate in a scenario, as supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSpec {
    /// Option name, unique within the scenario.
    pub name: String,
    /// Factor name to literal, reference key or distribution.
    #[serde(default)]
    pub factors: IndexMap<String, FactorInput>,
}

impl OptionSpec {
    /// Option with no factors yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factors: IndexMap::new(),
        }
    }

    /// Add or replace a factor.
    #[must_use]
    pub fn factor(mut self, name: impl Into<String>, input: impl Into<FactorInput>) -> Self {
        self.factors.insert(name.into(), input.into());
        self
    }

    /// Remove a factor.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.factors.shift_remove(name);
        self
    }
}

/// Structured decision scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Decision type, selecting schema and path model.
    pub decision_type: DecisionType,
    /// Competing options.
    pub options: Vec<OptionSpec>,
    /// Horizon in years.
    pub time_horizon_years: u32,
    /// Trials per option; config default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo_runs: Option<usize>,
    /// Ranking criterion; config default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_criterion: Option<Criterion>,
    /// Master seed; config seed when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Overrides the decision type's adverse-outcome boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adverse_threshold: Option<f64>,
}

impl Scenario {
    /// Empty scenario of the given type and horizon.
    #[must_use]
    pub const fn new(decision_type: DecisionType, time_horizon_years: u32) -> Self {
        Self {
            decision_type,
            options: Vec::new(),
            time_horizon_years,
            monte_carlo_runs: None,
            comparison_criterion: None,
            seed: None,
            adverse_threshold: None,
        }
    }

    /// Append an option.
    #[must_use]
    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Set the run count.
    #[must_use]
    pub const fn with_runs(mut self, runs: usize) -> Self {
        self.monte_carlo_runs = Some(runs);
        self
    }

    /// Set the master seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the ranking criterion.
    #[must_use]
    pub const fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.comparison_criterion = Some(criterion);
        self
    }

    /// Parse a scenario from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the scenario shape.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a scenario from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the scenario shape.
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a scenario file; `.json` is parsed as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Validated time horizon.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the horizon is out of range.
    pub fn horizon(&self) -> SimResult<TimeHorizon> {
        TimeHorizon::new(self.time_horizon_years)
    }

    /// Adverse-outcome boundary in effect.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.adverse_threshold
            .unwrap_or_else(|| self.decision_type.adverse_threshold())
    }

    /// Scenario-level violations: option list, names, horizon, threshold,
    /// criterion parameters. Factor checks live in [`factors::check_option`].
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        if self.options.is_empty() {
            out.push(Violation::scenario("scenario has no options"));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            if option.name.trim().is_empty() {
                out.push(Violation::scenario("option name is empty"));
            } else if !seen.insert(option.name.as_str()) {
                out.push(Violation::scenario(format!(
                    "duplicate option name '{}'",
                    option.name
                )));
            }
        }
        out.extend(TimeHorizon::check(self.time_horizon_years));
        if let Some(t) = self.adverse_threshold {
            if !t.is_finite() {
                out.push(Violation::scenario(format!(
                    "adverse_threshold must be finite, got {t}"
                )));
            }
        }
        if let Some(criterion) = &self.comparison_criterion {
            out.extend(criterion.violations());
        }
        out
    }
}
