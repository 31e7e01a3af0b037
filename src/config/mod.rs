//! Engine configuration with YAML schema and validation.
//!
//! Mistakes are caught in two layers:
//! - field constraints via `validator` derives
//! - cross-field semantic rules in [`EngineConfig::validate_semantic`]
//!
//! Every field has a default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use validator::Validate;

use crate::comparison::Criterion;
use crate::error::{SimError, SimResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Seed used when a scenario gives none.
    #[validate(nested)]
    #[serde(default)]
    pub reproducibility: ReproducibilityConfig,

    /// Run-count limits and batching.
    #[validate(nested)]
    #[serde(default)]
    pub runs: RunsConfig,

    /// Worker threads.
    #[validate(nested)]
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Ranking defaults.
    #[validate(nested)]
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Discard and convergence thresholds.
    #[validate(nested)]
    #[serde(default)]
    pub quality: QualityConfig,

    /// Rate clamping.
    #[validate(nested)]
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Monetary weights of non-financial terms.
    #[validate(nested)]
    #[serde(default)]
    pub valuation: ValuationConfig,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Run field validation then semantic validation.
    ///
    /// # Errors
    ///
    /// Returns the first layer that fails.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        self.validate_semantic()
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] describing the first broken rule.
    pub fn validate_semantic(&self) -> SimResult<()> {
        let runs = &self.runs;
        if runs.max_runs < runs.min_runs {
            return Err(SimError::config(format!(
                "max_runs ({}) must be >= min_runs ({})",
                runs.max_runs, runs.min_runs
            )));
        }
        if !(runs.min_runs..=runs.max_runs).contains(&runs.default_runs) {
            return Err(SimError::config(format!(
                "default_runs ({}) must lie in [{}, {}]",
                runs.default_runs, runs.min_runs, runs.max_runs
            )));
        }

        let [lo, hi] = self.sampling.rate_bounds;
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(SimError::config(format!(
                "rate_bounds must be finite with lower < upper, got [{lo}, {hi}]"
            )));
        }

        if !self.comparison.tie_epsilon.is_finite() || self.comparison.tie_epsilon >= 1.0 {
            return Err(SimError::config(format!(
                "tie_epsilon must be < 1, got {}",
                self.comparison.tie_epsilon
            )));
        }

        let criterion = self.comparison.criterion.violations();
        if let Some(first) = criterion.first() {
            return Err(SimError::config(format!("comparison.criterion: {first}")));
        }

        Ok(())
    }

    /// Number of worker threads to use (`0` resolves to the CPU count).
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        match self.execution.workers {
            0 => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            reproducibility: ReproducibilityConfig::default(),
            runs: RunsConfig::default(),
            execution: ExecutionConfig::default(),
            comparison: ComparisonConfig::default(),
            quality: QualityConfig::default(),
            sampling: SamplingConfig::default(),
            valuation: ValuationConfig::default(),
        }
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    seed: Option<u64>,
    default_runs: Option<usize>,
    batch_size: Option<usize>,
    workers: Option<usize>,
    criterion: Option<Criterion>,
    risk_aversion: Option<f64>,
    tie_epsilon: Option<f64>,
    max_discard_fraction: Option<f64>,
    convergence_tolerance: Option<f64>,
    clamp_rates: Option<bool>,
    valuation: Option<ValuationConfig>,
}

impl EngineConfigBuilder {
    /// Set the default seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the run count used when a scenario gives none.
    #[must_use]
    pub const fn default_runs(mut self, runs: usize) -> Self {
        self.default_runs = Some(runs);
        self
    }

    /// Set the number of trials per batch.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the worker count (`0` = one per CPU).
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the default ranking criterion.
    #[must_use]
    pub const fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    /// Set the risk-aversion multiple `k`.
    #[must_use]
    pub const fn risk_aversion(mut self, k: f64) -> Self {
        self.risk_aversion = Some(k);
        self
    }

    /// Set the relative tie tolerance.
    #[must_use]
    pub const fn tie_epsilon(mut self, epsilon: f64) -> Self {
        self.tie_epsilon = Some(epsilon);
        self
    }

    /// Set the maximum fraction of discarded trials per option.
    #[must_use]
    pub const fn max_discard_fraction(mut self, fraction: f64) -> Self {
        self.max_discard_fraction = Some(fraction);
        self
    }

    /// Set the relative standard error above which convergence is flagged.
    #[must_use]
    pub const fn convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = Some(tolerance);
        self
    }

    /// Enable or disable default rate clamping.
    #[must_use]
    pub const fn clamp_rates(mut self, clamp: bool) -> Self {
        self.clamp_rates = Some(clamp);
        self
    }

    /// Set the valuation coefficients.
    #[must_use]
    pub const fn valuation(mut self, valuation: ValuationConfig) -> Self {
        self.valuation = Some(valuation);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        let mut config = EngineConfig::default();

        if let Some(seed) = self.seed {
            config.reproducibility.seed = seed;
        }
        if let Some(runs) = self.default_runs {
            config.runs.default_runs = runs;
        }
        if let Some(batch_size) = self.batch_size {
            config.runs.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.execution.workers = workers;
        }
        if let Some(criterion) = self.criterion {
            config.comparison.criterion = criterion;
        }
        if let Some(k) = self.risk_aversion {
            config.comparison.risk_aversion = k;
        }
        if let Some(epsilon) = self.tie_epsilon {
            config.comparison.tie_epsilon = epsilon;
        }
        if let Some(fraction) = self.max_discard_fraction {
            config.quality.max_discard_fraction = fraction;
        }
        if let Some(tolerance) = self.convergence_tolerance {
            config.quality.convergence_tolerance = tolerance;
        }
        if let Some(clamp) = self.clamp_rates {
            config.sampling.clamp_rates = clamp;
        }
        if let Some(valuation) = self.valuation {
            config.valuation = valuation;
        }

        config
    }
}

/// Reproducibility configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReproducibilityConfig {
    /// Master random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_seed() -> u64 {
    42
}

impl Default for ReproducibilityConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

/// Run-count limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RunsConfig {
    /// Trials per option when the scenario gives none.
    #[validate(range(min = 1))]
    #[serde(default = "default_runs")]
    pub default_runs: usize,
    /// Smallest accepted request; below is a validation error.
    #[validate(range(min = 1))]
    #[serde(default = "default_min_runs")]
    pub min_runs: usize,
    /// Largest request; above is clamped with a warning.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,
    /// Trials per batch; cancellation is checked between batches.
    #[validate(range(min = 1))]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

const fn default_runs() -> usize {
    1000
}

const fn default_min_runs() -> usize {
    100
}

const fn default_max_runs() -> usize {
    100_000
}

const fn default_batch_size() -> usize {
    1000
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            default_runs: default_runs(),
            min_runs: default_min_runs(),
            max_runs: default_max_runs(),
            batch_size: default_batch_size(),
        }
    }
}

/// Trial execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ExecutionConfig {
    /// Worker threads: 1 = sequential, 0 = one per CPU.
    #[validate(range(max = 1024))]
    #[serde(default = "default_workers")]
    pub workers: usize,
}

const fn default_workers() -> usize {
    1
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Ranking defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ComparisonConfig {
    /// Criterion used when a scenario gives none.
    #[serde(default)]
    pub criterion: Criterion,
    /// `k` in `mean - k * stddev` when the criterion does not set it.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_risk_aversion")]
    pub risk_aversion: f64,
    /// Relative tolerance under which two scores tie.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
}

const fn default_risk_aversion() -> f64 {
    0.5
}

const fn default_tie_epsilon() -> f64 {
    0.01
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            criterion: Criterion::default(),
            risk_aversion: default_risk_aversion(),
            tie_epsilon: default_tie_epsilon(),
        }
    }
}

/// Quality gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QualityConfig {
    /// Fraction of non-finite trials above which an option fails.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_max_discard_fraction")]
    pub max_discard_fraction: f64,
    /// Relative standard error above which convergence is flagged.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,
}

const fn default_max_discard_fraction() -> f64 {
    0.05
}

const fn default_convergence_tolerance() -> f64 {
    0.01
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_discard_fraction: default_max_discard_fraction(),
            convergence_tolerance: default_convergence_tolerance(),
        }
    }
}

/// Rate clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SamplingConfig {
    /// Clamp normal/log-normal rate factors to `rate_bounds`.
    #[serde(default = "default_true")]
    pub clamp_rates: bool,
    /// Per-period rate range, `[lower, upper]`.
    #[serde(default = "default_rate_bounds")]
    pub rate_bounds: [f64; 2],
}

const fn default_true() -> bool {
    true
}

const fn default_rate_bounds() -> [f64; 2] {
    [-0.5, 1.0]
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            clamp_rates: true,
            rate_bounds: default_rate_bounds(),
        }
    }
}

/// Monetary equivalents of non-financial scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ValuationConfig {
    /// Money per quality-of-life point per year.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_quality_of_life_value")]
    pub quality_of_life_value: f64,
    /// Money per work-life-balance point below the maximum, per year.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_work_life_penalty")]
    pub work_life_penalty: f64,
    /// Maximum work-life-balance score.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_work_life_scale")]
    pub work_life_scale: f64,
}

const fn default_quality_of_life_value() -> f64 {
    250.0
}

const fn default_work_life_penalty() -> f64 {
    2000.0
}

const fn default_work_life_scale() -> f64 {
    10.0
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            quality_of_life_value: default_quality_of_life_value(),
            work_life_penalty: default_work_life_penalty(),
            work_life_scale: default_work_life_scale(),
        }
    }
}
