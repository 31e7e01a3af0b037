//! Decision engine facade.
//!
//! [`DecisionEngine`] turns a structured [`Scenario`] into a
//! [`ComparisonResult`]:
//!
//! 1. scenario and schema validation of every option (all violations at once)
//! 2. fact resolution, once per option, before any trial runs
//! 3. run-count limits (below the minimum is rejected, above the maximum is
//!    clamped with a warning)
//! 4. batched Monte Carlo aggregation with cooperative cancellation
//! 5. comparison, ranking and deterministic projections
//!
//! Statistical edge cases such as all-negative outcomes or zero variance are
//! reported as data, never as errors.

pub mod cancel;
pub mod guard;
pub mod rng;

pub use cancel::CancellationToken;
pub use guard::{QualitySeverity, TrialGuard};
pub use rng::SimRng;

use crate::comparison::Comparator;
use crate::config::EngineConfig;
use crate::domains::monte_carlo::{AggregateInput, TrialPlan};
use crate::domains::{Aggregator, BatchProgress, OutcomeDistribution, PathModel};
use crate::error::{SimError, SimResult, Violation, ViolationKind};
use crate::facts::FactProvider;
use crate::projection::project_options;
use crate::report::{ComparisonResult, OptionFailure, RankedOption, RunStatus, Warning};
use crate::scenario::factors::{check_option, resolve_option};
use crate::scenario::{Scenario, TimeHorizon};

/// Monte Carlo decision comparison engine.
///
/// # Example
///
/// ```rust
/// use decisim::prelude::*;
///
/// let scenario = Scenario::new(DecisionType::Investment, 5)
///     .with_runs(200)
///     .with_option(
///         OptionSpec::new("Stocks")
///             .factor("initial_amount", 10_000.0)
///             .factor("expected_return", Distribution::Normal { mean: 0.07, std_dev: 0.15 }),
///     )
///     .with_option(
///         OptionSpec::new("Bonds")
///             .factor("initial_amount", 10_000.0)
///             .factor("expected_return", Distribution::Normal { mean: 0.03, std_dev: 0.04 }),
///     );
///
/// let engine = DecisionEngine::new(EngineConfig::default())?;
/// let result = engine.simulate(&scenario, &StaticFactProvider::default())?;
/// assert_eq!(result.rankings.len(), 2);
/// # Ok::<(), decisim::SimError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: EngineConfig,
}

/// Options that survived validation and fact resolution.
struct Prepared {
    horizon: TimeHorizon,
    runs: usize,
    models: Vec<(String, PathModel)>,
    failures: Vec<OptionFailure>,
    warnings: Vec<Warning>,
}

impl DecisionEngine {
    /// Create an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EngineConfig) -> SimResult<Self> {
        config.check()?;
        Ok(Self { config })
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check a scenario without simulating.
    ///
    /// Stricter than [`Self::simulate`]: an unresolved fact in any option is
    /// an error here.
    ///
    /// # Errors
    ///
    /// - [`SimError::Validation`] or [`SimError::SchemaMismatch`] listing every
    ///   structural violation
    /// - [`SimError::FactLookup`] listing every unresolved reference
    pub fn validate(&self, scenario: &Scenario, facts: &dyn FactProvider) -> SimResult<()> {
        let horizon = self.check(scenario)?;
        let prepared = self.prepare(scenario, facts, horizon)?;
        let unresolved: Vec<Violation> = prepared
            .failures
            .into_iter()
            .flat_map(|f| f.violations)
            .collect();
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(SimError::FactLookup {
                violations: unresolved,
            })
        }
    }

    /// Simulate and compare every option of `scenario`.
    ///
    /// # Errors
    ///
    /// See [`Self::simulate_with`].
    pub fn simulate(
        &self,
        scenario: &Scenario,
        facts: &dyn FactProvider,
    ) -> SimResult<ComparisonResult> {
        self.simulate_with(scenario, facts, &CancellationToken::new(), |_| {})
    }

    /// Simulate with a cancellation token and a per-batch progress callback.
    ///
    /// A cancelled run that completed at least one batch returns a result
    /// with [`RunStatus::Partial`].
    ///
    /// # Errors
    ///
    /// - [`SimError::Validation`] / [`SimError::SchemaMismatch`]: bad input,
    ///   no trial executed
    /// - [`SimError::FactLookup`]: no option could be resolved
    /// - [`SimError::Cancelled`]: cancelled before the first batch completed
    /// - [`SimError::SimulationQuality`]: every option exceeded the discard limit
    pub fn simulate_with<F>(
        &self,
        scenario: &Scenario,
        facts: &dyn FactProvider,
        cancel: &CancellationToken,
        progress: F,
    ) -> SimResult<ComparisonResult>
    where
        F: FnMut(BatchProgress),
    {
        let horizon = self.check(scenario)?;
        let Prepared {
            horizon,
            runs,
            models,
            mut failures,
            mut warnings,
        } = self.prepare(scenario, facts, horizon)?;

        let seed = scenario.seed.unwrap_or(self.config.reproducibility.seed);
        let criterion = scenario
            .comparison_criterion
            .unwrap_or(self.config.comparison.criterion);
        let decision_type = scenario.decision_type;

        tracing::info!(
            decision_type = %decision_type,
            options = models.len(),
            runs,
            seed,
            horizon = horizon.years(),
            "simulation started"
        );

        let inputs: Vec<AggregateInput<'_>> = models
            .iter()
            .map(|(option, model)| AggregateInput {
                option: option.as_str(),
                model,
            })
            .collect();
        let plan = TrialPlan {
            horizon,
            seed,
            runs,
            threshold: scenario.threshold(),
        };
        let run = Aggregator::from_config(&self.config).run(&inputs, plan, cancel, progress);

        if run.partial && run.completed_trials == 0 {
            return Err(SimError::Cancelled {
                completed_trials: 0,
            });
        }

        let mut distributions: Vec<OutcomeDistribution> = Vec::with_capacity(models.len());
        let mut first_error = None;
        for (option, outcome) in run.distributions {
            match outcome {
                Ok(dist) => distributions.push(dist),
                Err(err) => {
                    tracing::warn!(option = %option, error = %err, "option failed");
                    warnings.push(Warning::OptionFailed {
                        option: option.clone(),
                        message: err.to_string(),
                    });
                    failures.push(OptionFailure {
                        option,
                        message: err.to_string(),
                        violations: Vec::new(),
                    });
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if distributions.is_empty() {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        let tolerance = self.config.quality.convergence_tolerance;
        for dist in &distributions {
            let stats = &dist.statistics;
            if stats.discarded > 0 {
                warnings.push(Warning::TrialsDiscarded {
                    option: dist.option.clone(),
                    discarded: stats.discarded,
                    total: stats.discarded + stats.count,
                });
            }
            if !stats.is_converged(tolerance) {
                warnings.push(Warning::ConvergenceNotReached {
                    option: dist.option.clone(),
                    relative_error: stats.relative_error(),
                    tolerance,
                });
            }
        }
        if run.partial {
            warnings.push(Warning::PartialResult {
                completed_trials: run.completed_trials,
                requested_trials: run.requested_trials,
            });
        }

        let comparator = Comparator::new(
            criterion,
            &self.config.comparison,
            decision_type.polarity(),
            scenario.threshold(),
        );
        let comparison = comparator.compare(&distributions);

        let rankings = comparison
            .standings
            .into_iter()
            .filter_map(|standing| {
                let dist = distributions.iter().find(|d| d.option == standing.option)?;
                Some(RankedOption {
                    rank: standing.rank,
                    option: standing.option,
                    score: standing.score,
                    statistics: dist.statistics.clone(),
                })
            })
            .collect();

        let simulated = models
            .iter()
            .filter(|(name, _)| distributions.iter().any(|d| &d.option == name))
            .map(|(name, model)| (name.as_str(), model));
        let projections = project_options(simulated, horizon);

        tracing::info!(
            winner = comparison.recommendation.winner().unwrap_or("tie"),
            partial = run.partial,
            warnings = warnings.len(),
            "simulation complete"
        );

        Ok(ComparisonResult {
            decision_type,
            criterion: comparator.effective_criterion(),
            seed,
            time_horizon_years: horizon.years(),
            monte_carlo_runs: runs,
            status: if run.partial {
                RunStatus::Partial
            } else {
                RunStatus::Completed
            },
            rankings,
            recommendation: comparison.recommendation,
            pairwise: comparison.pairwise,
            projections,
            failures,
            warnings,
        })
    }

    /// Structural validation: scenario fields, run count, every option's
    /// factors. Nothing is looked up.
    fn check(&self, scenario: &Scenario) -> SimResult<TimeHorizon> {
        let mut violations = scenario.violations();

        let requested = self.requested_runs(scenario);
        if requested < self.config.runs.min_runs {
            violations.push(Violation::scenario(format!(
                "monte_carlo_runs {requested} is below the minimum of {}",
                self.config.runs.min_runs
            )));
        }

        let mut mismatch = false;
        for option in &scenario.options {
            let found = check_option(scenario.decision_type, option, &self.config.sampling);
            mismatch |= found
                .iter()
                .any(|v| matches!(v.kind, ViolationKind::SchemaMismatch { .. }));
            violations.extend(found);
        }

        if violations.is_empty() {
            return scenario.horizon();
        }
        tracing::debug!(count = violations.len(), "scenario rejected");
        if mismatch {
            Err(SimError::SchemaMismatch {
                decision_type: scenario.decision_type,
                violations,
            })
        } else {
            Err(SimError::validation(violations))
        }
    }

    fn requested_runs(&self, scenario: &Scenario) -> usize {
        scenario
            .monte_carlo_runs
            .unwrap_or(self.config.runs.default_runs)
    }

    /// Resolve facts and build path models; options whose facts cannot be
    /// resolved become failures.
    fn prepare(
        &self,
        scenario: &Scenario,
        facts: &dyn FactProvider,
        horizon: TimeHorizon,
    ) -> SimResult<Prepared> {
        let mut models = Vec::with_capacity(scenario.options.len());
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        for option in &scenario.options {
            let built = resolve_option(
                scenario.decision_type,
                option,
                facts,
                &self.config.sampling,
            )
            .map_err(SimError::validation)
            .and_then(|set| PathModel::build(&set, &self.config.valuation));

            match built {
                Ok(model) => models.push((option.name.clone(), model)),
                Err(err) => {
                    tracing::warn!(option = %option.name, error = %err, "fact resolution failed");
                    warnings.push(Warning::OptionFailed {
                        option: option.name.clone(),
                        message: err.to_string(),
                    });
                    failures.push(OptionFailure {
                        option: option.name.clone(),
                        message: err.to_string(),
                        violations: err.violations().to_vec(),
                    });
                }
            }
        }

        if models.is_empty() {
            return Err(SimError::FactLookup {
                violations: failures.into_iter().flat_map(|f| f.violations).collect(),
            });
        }

        let requested = self.requested_runs(scenario);
        let max = self.config.runs.max_runs;
        let runs = if requested > max {
            tracing::warn!(requested, max, "run count clamped");
            warnings.push(Warning::RunCountClamped {
                requested,
                clamped_to: max,
            });
            max
        } else {
            requested
        };

        Ok(Prepared {
            horizon,
            runs,
            models,
            failures,
            warnings,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::facts::StaticFactProvider;
    use crate::scenario::{DecisionType, Distribution, OptionSpec};

    fn city(name: &str, cost: impl Into<crate::scenario::FactorInput>) -> OptionSpec {
        OptionSpec::new(name)
            .factor("income", 60_000.0)
            .factor("cost_of_living", cost)
            .factor("tax_rate", 0.25)
            .factor("income_growth", Distribution::Normal { mean: 0.02, std_dev: 0.01 })
            .factor("inflation", 0.02)
            .factor("quality_of_life", 7.0)
    }

    fn relocation() -> Scenario {
        Scenario::new(DecisionType::Relocation, 5)
            .with_runs(200)
            .with_option(city("Austin", 30_000.0))
            .with_option(city("Denver", "cost.denver"))
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.runs.max_runs = 10;
        assert!(DecisionEngine::new(config).is_err());
    }

    #[test]
    fn test_resolves_facts_and_ranks() {
        let facts = StaticFactProvider::from_pairs([("cost.denver", 35_000.0)]);
        let result = engine().simulate(&relocation(), &facts).unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.rankings.len(), 2);
        assert_eq!(result.winner(), Some("Austin"));
        assert_eq!(result.seed, 42);
        assert_eq!(result.projections.len(), 2);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_missing_fact_fails_one_option() {
        let result = engine()
            .simulate(&relocation(), &StaticFactProvider::default())
            .unwrap();
        assert_eq!(result.rankings.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].option, "Denver");
        assert!(matches!(
            result.failures[0].violations[0].kind,
            ViolationKind::FactNotFound { .. }
        ));
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::OptionFailed { option, .. } if option == "Denver")));
    }

    #[test]
    fn test_missing_fact_everywhere_is_fact_lookup_error() {
        let scenario = Scenario::new(DecisionType::Relocation, 5)
            .with_runs(200)
            .with_option(city("Denver", "cost.denver"))
            .with_option(city("Boise", "cost.boise"));
        match engine().simulate(&scenario, &StaticFactProvider::default()) {
            Err(SimError::FactLookup { violations }) => assert_eq!(violations.len(), 2),
            other => panic!("expected fact lookup error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_is_strict_about_facts() {
        let err = engine()
            .validate(&relocation(), &StaticFactProvider::default())
            .unwrap_err();
        assert!(matches!(err, SimError::FactLookup { .. }));
        let facts = StaticFactProvider::from_pairs([("cost.denver", 35_000.0)]);
        assert!(engine().validate(&relocation(), &facts).is_ok());
    }

    #[test]
    fn test_runs_below_minimum_rejected() {
        let scenario = relocation().with_runs(10);
        let err = engine()
            .simulate(&scenario, &StaticFactProvider::default())
            .unwrap_err();
        assert!(matches!(err, SimError::Validation { .. }));
        assert!(err.to_string().contains("below the minimum"));
    }

    #[test]
    fn test_runs_above_maximum_clamped() {
        let mut config = EngineConfig::default();
        config.runs.max_runs = 300;
        config.runs.default_runs = 200;
        let engine = DecisionEngine::new(config).unwrap();
        let facts = StaticFactProvider::from_pairs([("cost.denver", 35_000.0)]);
        let result = engine.simulate(&relocation().with_runs(5_000), &facts).unwrap();
        assert_eq!(result.monte_carlo_runs, 300);
        assert_eq!(result.rankings[0].statistics.count, 300);
        assert!(result.warnings.contains(&Warning::RunCountClamped {
            requested: 5_000,
            clamped_to: 300
        }));
    }

    #[test]
    fn test_schema_mismatch() {
        let scenario = Scenario::new(DecisionType::Relocation, 5).with_option(
            OptionSpec::new("Fund")
                .factor("initial_amount", 1_000.0)
                .factor("expected_return", 0.05),
        );
        let err = engine()
            .simulate(&scenario, &StaticFactProvider::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::SchemaMismatch {
                decision_type: DecisionType::Relocation,
                ..
            }
        ));
    }

    #[test]
    fn test_cancelled_before_first_batch() {
        let token = CancellationToken::new();
        token.cancel();
        let facts = StaticFactProvider::from_pairs([("cost.denver", 35_000.0)]);
        let err = engine()
            .simulate_with(&relocation(), &facts, &token, |_| {})
            .unwrap_err();
        assert!(matches!(err, SimError::Cancelled { completed_trials: 0 }));
    }

    #[test]
    fn test_progress_reported_per_batch() {
        let config = EngineConfig::builder().batch_size(50).build();
        let engine = DecisionEngine::new(config).unwrap();
        let facts = StaticFactProvider::from_pairs([("cost.denver", 35_000.0)]);
        let mut batches = Vec::new();
        engine
            .simulate_with(&relocation(), &facts, &CancellationToken::new(), |p| {
                batches.push(p.batch);
            })
            .unwrap();
        assert_eq!(batches, [1, 2, 3, 4]);
    }

    #[test]
    fn test_effective_criterion_recorded() {
        let facts = StaticFactProvider::from_pairs([("cost.denver", 35_000.0)]);
        let result = engine().simulate(&relocation(), &facts).unwrap();
        assert_eq!(
            result.criterion,
            crate::comparison::Criterion::RiskAdjusted { k: Some(0.5) }
        );
    }
}
