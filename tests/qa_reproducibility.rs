//! Reproducibility hypotheses.
//!
//! Each test names the null hypothesis it tries to falsify.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use decisim::prelude::*;

fn stock_and_bond(seed: u64) -> Scenario {
    Scenario::new(DecisionType::Investment, 10)
        .with_seed(seed)
        .with_runs(2_000)
        .with_option(
            OptionSpec::new("StockFund")
                .factor("initial_amount", 10_000.0)
                .factor("expected_return", Distribution::Normal { mean: 0.07, std_dev: 0.15 }),
        )
        .with_option(
            OptionSpec::new("BondFund")
                .factor("initial_amount", 10_000.0)
                .factor("expected_return", Distribution::Normal { mean: 0.03, std_dev: 0.04 }),
        )
}

fn engine_with_workers(workers: usize) -> DecisionEngine {
    DecisionEngine::new(EngineConfig::builder().workers(workers).batch_size(250).build()).unwrap()
}

// H0: The same seed produces different results across runs
// Falsification: run the same request three times; compare serialized output
#[test]
fn h0_1_same_seed_produces_identical_results() {
    let engine = DecisionEngine::default();
    let facts = StaticFactProvider::default();
    let scenario = stock_and_bond(42);

    let reference = engine.simulate(&scenario, &facts).unwrap().to_json().unwrap();
    for _ in 0..2 {
        let again = engine.simulate(&scenario, &facts).unwrap().to_json().unwrap();
        assert_eq!(reference, again, "same seed diverged");
    }
}

// H0: Different seeds produce identical outcome distributions
// Falsification: compare StockFund means under seeds 42, 43, 44
#[test]
fn h0_2_different_seeds_produce_different_results() {
    let engine = DecisionEngine::default();
    let facts = StaticFactProvider::default();
    let means: Vec<f64> = [42, 43, 44]
        .into_iter()
        .map(|seed| {
            let result = engine.simulate(&stock_and_bond(seed), &facts).unwrap();
            result.statistics("StockFund").unwrap().mean
        })
        .collect();

    assert!((means[0] - means[1]).abs() > 0.0);
    assert!((means[1] - means[2]).abs() > 0.0);
    assert!((means[0] - means[2]).abs() > 0.0);
}

// H0: Parallel execution changes results
// Falsification: run with 1, 2 and 4 workers; compare serialized output
#[test]
fn h0_3_worker_count_does_not_change_results() {
    let facts = StaticFactProvider::default();
    let scenario = stock_and_bond(7);
    let sequential = engine_with_workers(1)
        .simulate(&scenario, &facts)
        .unwrap()
        .to_json()
        .unwrap();

    for workers in [2, 4] {
        let parallel = engine_with_workers(workers)
            .simulate(&scenario, &facts)
            .unwrap()
            .to_json()
            .unwrap();
        assert_eq!(sequential, parallel, "{workers} workers diverged");
    }
}

// H0: A scenario with no randomness still shows sampling noise
// Falsification: every factor constant; outcomes must have zero spread
// and repeated runs must be bit-identical
#[test]
fn h0_4_all_constant_scenario_is_exact() {
    let scenario = Scenario::new(DecisionType::Job, 5)
        .with_runs(500)
        .with_option(
            OptionSpec::new("Fixed")
                .factor("salary", 90_000.0)
                .factor("raise_rate", 0.02)
                .factor("bonus_amount", 0.0)
                .factor("bonus_probability", 0.0)
                .factor("work_life_balance", 8.0),
        )
        .with_option(
            OptionSpec::new("Other")
                .factor("salary", 80_000.0)
                .factor("raise_rate", 0.04)
                .factor("bonus_amount", 5_000.0)
                .factor("bonus_probability", 1.0)
                .factor("work_life_balance", 7.0),
        );
    let engine = DecisionEngine::default();
    let facts = StaticFactProvider::default();

    let first = engine.simulate(&scenario, &facts).unwrap();
    let second = engine.simulate(&scenario, &facts).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    for option in ["Fixed", "Other"] {
        let stats = first.statistics(option).unwrap();
        assert_eq!(stats.count, 500);
        let scale = stats.mean.abs().max(1.0);
        assert!(stats.std_dev <= 1e-9 * scale, "{option} has spread {}", stats.std_dev);
        assert!((stats.min - stats.max).abs() < f64::EPSILON * scale);
        assert!((stats.median - stats.mean).abs() <= 1e-9 * scale);
    }
}

// H0: Trial i depends on how many trials run before it
// Falsification: statistics of the first 1000 trials of a 1000-run request
// must equal those of a separate 1000-run request with the same seed, even
// when batch sizes differ
#[test]
fn h0_5_batching_does_not_change_results() {
    let facts = StaticFactProvider::default();
    let scenario = stock_and_bond(99).with_runs(1_000);
    let small = DecisionEngine::new(EngineConfig::builder().batch_size(100).build())
        .unwrap()
        .simulate(&scenario, &facts)
        .unwrap();
    let large = DecisionEngine::new(EngineConfig::builder().batch_size(1_000).build())
        .unwrap()
        .simulate(&scenario, &facts)
        .unwrap();

    assert_eq!(small.to_json().unwrap(), large.to_json().unwrap());
}
