//! Monte Carlo aggregation.
//!
//! Runs every option's trials in batches, round-robin over options, and
//! summarizes each option's outcomes into an [`OutcomeDistribution`].
//!
//! # Reproducibility
//!
//! Trial `i` of every option draws from the sub-seed `derive_seed(seed, i)`
//! (common random numbers), so trial `i` of option A pairs with trial `i` of
//! option B. Results are re-ordered by trial index after each batch, making
//! the output independent of the number of worker threads.
//!
//! # Cancellation
//!
//! The [`CancellationToken`] is checked before every batch round. Trials in
//! flight always finish; statistics of a cancelled run cover exactly the
//! completed batches and are flagged `partial`.

use std::sync::{Mutex, PoisonError};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};

use crate::config::EngineConfig;
use crate::engine::cancel::CancellationToken;
use crate::engine::guard::{QualitySeverity, TrialGuard};
use crate::error::SimResult;
use crate::scenario::TimeHorizon;

use super::stats::OutcomeStatistics;
use super::PathModel;

/// Progress report emitted after each completed batch round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Batches completed so far (1-based).
    pub batch: usize,
    /// Batches scheduled.
    pub batches: usize,
    /// Trials per option completed so far.
    pub completed_trials: usize,
}

impl BatchProgress {
    /// Completed share in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.batches == 0 {
            1.0
        } else {
            self.batch as f64 / self.batches as f64
        }
    }
}

/// Outcomes of one option with their summary.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeDistribution {
    /// Option name.
    pub option: String,
    /// Outcome per trial index; discarded trials are NaN.
    pub outcomes: Vec<f64>,
    /// Statistics over the finite outcomes.
    pub statistics: OutcomeStatistics,
}

impl OutcomeDistribution {
    /// Finite outcomes in trial order.
    pub fn finite(&self) -> impl Iterator<Item = f64> + '_ {
        self.outcomes.iter().copied().filter(|x| x.is_finite())
    }
}

/// One option handed to the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct AggregateInput<'a> {
    /// Option name.
    pub option: &'a str,
    /// Path model of the option.
    pub model: &'a PathModel,
}

/// What to run: the same plan applies to every option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialPlan {
    /// Periods per trial.
    pub horizon: TimeHorizon,
    /// Master seed.
    pub seed: u64,
    /// Trials per option.
    pub runs: usize,
    /// Adverse-outcome bar for the statistics.
    pub threshold: f64,
}

/// Result of an aggregation run.
#[derive(Debug)]
pub struct AggregateRun {
    /// Per option, in input order: a distribution, or the quality failure.
    pub distributions: Vec<(String, SimResult<OutcomeDistribution>)>,
    /// Trials per option actually executed.
    pub completed_trials: usize,
    /// Trials per option requested.
    pub requested_trials: usize,
    /// True if cancellation stopped the run early.
    pub partial: bool,
}

/// A single (option, trial) unit of work.
#[derive(Debug, Clone, Copy)]
struct TrialTask {
    option: usize,
    trial: u64,
    index: usize,
}

/// Batched trial runner.
#[derive(Debug, Clone)]
pub struct Aggregator {
    batch_size: usize,
    workers: usize,
    max_discard_fraction: f64,
}

impl Aggregator {
    /// Create an aggregator.
    ///
    /// `batch_size` and `workers` below 1 are raised to 1.
    #[must_use]
    pub fn new(batch_size: usize, workers: usize, max_discard_fraction: f64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            workers: workers.max(1),
            max_discard_fraction,
        }
    }

    /// Create from engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.runs.batch_size,
            config.effective_workers(),
            config.quality.max_discard_fraction,
        )
    }

    /// Worker threads used inside a batch.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Number of batch rounds needed for `runs` trials.
    #[must_use]
    pub const fn batches(&self, runs: usize) -> usize {
        runs.div_ceil(self.batch_size)
    }

    /// Run `plan.runs` trials of every option.
    ///
    /// `progress` is called after every completed batch round.
    pub fn run<F>(
        &self,
        options: &[AggregateInput<'_>],
        plan: TrialPlan,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> AggregateRun
    where
        F: FnMut(BatchProgress),
    {
        let runs = plan.runs;
        let batches = self.batches(runs);
        let mut outcomes: Vec<Vec<f64>> = vec![Vec::with_capacity(runs); options.len()];
        let mut guards: Vec<TrialGuard> = options
            .iter()
            .map(|_| TrialGuard::new(self.max_discard_fraction))
            .collect();
        let mut completed = 0usize;
        let mut partial = false;

        for batch in 0..batches {
            if cancel.is_cancelled() {
                tracing::warn!(batch, batches, completed_trials = completed, "simulation cancelled");
                partial = true;
                break;
            }

            let start = completed;
            let end = (start + self.batch_size).min(runs);
            let results = self.run_batch(options, plan, start..end);

            for (idx, outcome) in results.into_iter().enumerate() {
                let option = idx / (end - start);
                let admitted = guards[option].admit(outcome);
                outcomes[option].push(admitted.unwrap_or(f64::NAN));
            }

            completed = end;
            tracing::debug!(batch = batch + 1, batches, completed_trials = completed, "batch complete");
            progress(BatchProgress {
                batch: batch + 1,
                batches,
                completed_trials: completed,
            });
        }

        let distributions = options
            .iter()
            .zip(outcomes)
            .zip(&guards)
            .map(|((input, trials), guard)| {
                let result = summarize(input, trials, guard, plan.threshold, partial);
                (input.option.to_string(), result)
            })
            .collect();

        AggregateRun {
            distributions,
            completed_trials: completed,
            requested_trials: runs,
            partial,
        }
    }

    /// Run trials `range` of every option; results are grouped by option,
    /// then ordered by trial.
    fn run_batch(
        &self,
        options: &[AggregateInput<'_>],
        plan: TrialPlan,
        range: std::ops::Range<usize>,
    ) -> Vec<f64> {
        let len = range.len();
        let tasks = options.iter().enumerate().flat_map(|(option, _)| {
            range.clone().enumerate().map(move |(offset, trial)| TrialTask {
                option,
                trial: trial as u64,
                index: option * len + offset,
            })
        });
        let simulate = |task: TrialTask| {
            options[task.option]
                .model
                .trial_outcome(plan.horizon, plan.seed, task.trial)
        };

        if self.workers == 1 {
            tasks.map(simulate).collect()
        } else {
            WorkStealingExecutor::with_workers(self.workers).execute(tasks, simulate)
        }
    }
}

fn summarize(
    input: &AggregateInput<'_>,
    outcomes: Vec<f64>,
    guard: &TrialGuard,
    threshold: f64,
    partial: bool,
) -> SimResult<OutcomeDistribution> {
    if guard.severity() == QualitySeverity::Warning {
        tracing::warn!(
            option = input.option,
            discarded = guard.discarded(),
            total = guard.total(),
            "discarded non-finite trials"
        );
    }
    guard.check(input.option)?;

    let finite: Vec<f64> = outcomes.iter().copied().filter(|x| x.is_finite()).collect();
    let mut statistics = OutcomeStatistics::from_outcomes(&finite, threshold, input.model.polarity());
    statistics.discarded = guard.discarded();
    statistics.partial = partial;

    Ok(OutcomeDistribution {
        option: input.option.to_string(),
        outcomes,
        statistics,
    })
}

/// Work-stealing executor for trial tasks.
///
/// Tasks are pushed to a global injector; each worker drains its local FIFO
/// queue, then the injector, then steals from its peers. Results come back
/// ordered by task index.
#[derive(Debug, Clone, Copy)]
struct WorkStealingExecutor {
    workers: usize,
}

impl WorkStealingExecutor {
    const fn with_workers(workers: usize) -> Self {
        Self { workers }
    }

    fn execute<I, F>(&self, tasks: I, simulate: F) -> Vec<f64>
    where
        I: IntoIterator<Item = TrialTask>,
        F: Fn(TrialTask) -> f64 + Sync,
    {
        let injector: Injector<TrialTask> = Injector::new();
        let mut count = 0usize;
        for task in tasks {
            injector.push(task);
            count += 1;
        }

        let locals: Vec<Worker<TrialTask>> = (0..self.workers).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<TrialTask>> = locals.iter().map(Worker::stealer).collect();
        let results: Mutex<Vec<(usize, f64)>> = Mutex::new(Vec::with_capacity(count));

        std::thread::scope(|s| {
            for (worker_id, local) in locals.into_iter().enumerate() {
                let injector = &injector;
                let stealers = &stealers;
                let results = &results;
                let simulate = &simulate;

                s.spawn(move || {
                    let mut done = Vec::new();
                    while let Some(task) = next_task(&local, injector, stealers, worker_id) {
                        done.push((task.index, simulate(task)));
                    }
                    store_results(results, done);
                });
            }
        });

        collect_ordered(results)
    }
}

/// Append a worker's results. A poisoned lock still holds valid data.
fn store_results(results: &Mutex<Vec<(usize, f64)>>, done: Vec<(usize, f64)>) {
    results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .extend(done);
}

fn collect_ordered(results: Mutex<Vec<(usize, f64)>>) -> Vec<f64> {
    let mut indexed = results.into_inner().unwrap_or_else(PoisonError::into_inner);
    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, r)| r).collect()
}

fn next_task(
    local: &Worker<TrialTask>,
    injector: &Injector<TrialTask>,
    stealers: &[Stealer<TrialTask>],
    worker_id: usize,
) -> Option<TrialTask> {
    if let Some(task) = local.pop() {
        return Some(task);
    }
    loop {
        match injector.steal_batch_and_pop(local) {
            Steal::Success(task) => return Some(task),
            Steal::Empty => break,
            Steal::Retry => {}
        }
    }
    for i in 1..=stealers.len() {
        let victim = &stealers[(worker_id + i) % stealers.len()];
        loop {
            match victim.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => {}
            }
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::{SamplingConfig, ValuationConfig};
    use crate::error::SimError;
    use crate::facts::StaticFactProvider;
    use crate::scenario::factors::resolve_option;
    use crate::scenario::{DecisionType, Distribution, OptionSpec};

    fn fund(name: &str, mean: f64, std_dev: f64) -> PathModel {
        let option = OptionSpec::new(name)
            .factor("initial_amount", 10_000.0)
            .factor("expected_return", Distribution::Normal { mean, std_dev });
        let set = resolve_option(
            DecisionType::Investment,
            &option,
            &StaticFactProvider::default(),
            &SamplingConfig::default(),
        )
        .unwrap();
        PathModel::build(&set, &ValuationConfig::default()).unwrap()
    }

    fn horizon() -> TimeHorizon {
        TimeHorizon::new(5).unwrap()
    }

    fn plan(seed: u64, runs: usize) -> TrialPlan {
        TrialPlan {
            horizon: horizon(),
            seed,
            runs,
            threshold: 0.0,
        }
    }

    #[test]
    fn test_runs_every_trial_of_every_option() {
        let a = fund("A", 0.05, 0.1);
        let b = fund("B", 0.03, 0.02);
        let inputs = [
            AggregateInput { option: "A", model: &a },
            AggregateInput { option: "B", model: &b },
        ];
        let mut seen = Vec::new();
        let run = Aggregator::new(100, 1, 0.05).run(
            &inputs,
            plan(42, 250),
            &CancellationToken::new(),
            |p| seen.push(p),
        );

        assert!(!run.partial);
        assert_eq!(run.completed_trials, 250);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].completed_trials, 250);
        assert!((seen[2].fraction() - 1.0).abs() < f64::EPSILON);

        for (_, dist) in &run.distributions {
            let dist = dist.as_ref().unwrap();
            assert_eq!(dist.outcomes.len(), 250);
            assert_eq!(dist.statistics.count, 250);
            assert!(!dist.statistics.partial);
        }
    }

    #[test]
    fn test_outcome_matches_single_trial() {
        let a = fund("A", 0.05, 0.1);
        let inputs = [AggregateInput { option: "A", model: &a }];
        let run = Aggregator::new(7, 1, 0.05).run(
            &inputs,
            plan(9, 20),
            &CancellationToken::new(),
            |_| {},
        );
        let dist = run.distributions[0].1.as_ref().unwrap();
        for (trial, outcome) in dist.outcomes.iter().enumerate() {
            let expected = a.trial_outcome(horizon(), 9, trial as u64);
            assert!((outcome - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let a = fund("A", 0.07, 0.15);
        let b = fund("B", 0.03, 0.04);
        let inputs = [
            AggregateInput { option: "A", model: &a },
            AggregateInput { option: "B", model: &b },
        ];
        let token = CancellationToken::new();
        let sequential = Aggregator::new(64, 1, 0.05).run(&inputs, plan(42, 300), &token, |_| {});
        let parallel = Aggregator::new(64, 4, 0.05).run(&inputs, plan(42, 300), &token, |_| {});

        for ((_, s), (_, p)) in sequential.distributions.iter().zip(&parallel.distributions) {
            assert_eq!(s.as_ref().unwrap(), p.as_ref().unwrap());
        }
    }

    #[test]
    fn test_cancel_between_batches_is_partial() {
        let a = fund("A", 0.05, 0.1);
        let inputs = [AggregateInput { option: "A", model: &a }];
        let token = CancellationToken::new();
        let run = Aggregator::new(100, 1, 0.05).run(&inputs, plan(42, 1_000), &token, |p| {
            if p.batch == 1 {
                token.cancel();
            }
        });

        assert!(run.partial);
        assert_eq!(run.completed_trials, 100);
        let dist = run.distributions[0].1.as_ref().unwrap();
        assert_eq!(dist.statistics.count, 100);
        assert!(dist.statistics.partial);
    }

    #[test]
    fn test_cancel_before_start_runs_nothing() {
        let a = fund("A", 0.05, 0.1);
        let inputs = [AggregateInput { option: "A", model: &a }];
        let token = CancellationToken::new();
        token.cancel();
        let run = Aggregator::new(100, 1, 0.05).run(&inputs, plan(42, 1_000), &token, |_| {});
        assert!(run.partial);
        assert_eq!(run.completed_trials, 0);
    }

    #[test]
    fn test_non_finite_trials_fail_option() {
        let option = OptionSpec::new("Blowup")
            .factor("initial_amount", 1.0e308)
            .factor("expected_return", 1.0);
        let set = resolve_option(
            DecisionType::Investment,
            &option,
            &StaticFactProvider::default(),
            &SamplingConfig::default(),
        )
        .unwrap();
        let model = PathModel::build(&set, &ValuationConfig::default()).unwrap();
        let inputs = [AggregateInput { option: "Blowup", model: &model }];
        let run = Aggregator::new(50, 1, 0.05).run(
            &inputs,
            plan(1, 100),
            &CancellationToken::new(),
            |_| {},
        );
        match &run.distributions[0].1 {
            Err(SimError::SimulationQuality { discarded, total, .. }) => {
                assert_eq!(*discarded, 100);
                assert_eq!(*total, 100);
            }
            other => panic!("expected quality failure, got {other:?}"),
        }
    }

    #[test]
    fn test_executor_preserves_order() {
        let tasks = (0..500).map(|i| TrialTask {
            option: 0,
            trial: i as u64,
            index: i,
        });
        let results = WorkStealingExecutor::with_workers(4).execute(tasks, |t| t.trial as f64 * 2.0);
        assert_eq!(results.len(), 500);
        for (i, r) in results.iter().enumerate() {
            assert!((r - i as f64 * 2.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_poisoned_results_lock_loses_nothing() {
        let results = Mutex::new(vec![(1, 10.0)]);
        let poisoned = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = results.lock().unwrap();
                panic!("worker died holding the lock");
            })
            .join()
        });
        assert!(poisoned.is_err());
        assert!(results.is_poisoned());

        store_results(&results, vec![(2, 20.0), (0, 0.0)]);
        assert_eq!(collect_ordered(results), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_batches_round_up() {
        let agg = Aggregator::new(1_000, 1, 0.05);
        assert_eq!(agg.batches(10_000), 10);
        assert_eq!(agg.batches(10_001), 11);
        assert_eq!(Aggregator::new(0, 0, 0.05).workers(), 1);
    }
}
