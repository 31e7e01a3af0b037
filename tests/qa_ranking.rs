//! Ranking and recommendation hypotheses.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use decisim::prelude::*;

fn option_for(decision_type: DecisionType, name: &str) -> OptionSpec {
    let option = OptionSpec::new(name);
    match decision_type {
        DecisionType::Relocation => option
            .factor("income", Distribution::Normal { mean: 70_000.0, std_dev: 6_000.0 })
            .factor("cost_of_living", Distribution::Uniform { min: 1_400.0, max: 2_000.0 })
            .factor("tax_rate", 0.28)
            .factor("income_growth", Distribution::Normal { mean: 0.03, std_dev: 0.01 })
            .factor("inflation", 0.02)
            .factor("quality_of_life", Distribution::Triangular { min: 5.0, mode: 7.0, max: 9.0 }),
        DecisionType::Purchase => option
            .factor("purchase_price", 30_000.0)
            .factor("depreciation_rate", Distribution::Uniform { min: 0.1, max: 0.2 })
            .factor("maintenance_cost", Distribution::Normal { mean: 900.0, std_dev: 150.0 })
            .factor("budget", 40_000.0),
        DecisionType::Job => option
            .factor("salary", Distribution::Normal { mean: 90_000.0, std_dev: 4_000.0 })
            .factor("raise_rate", Distribution::Uniform { min: 0.01, max: 0.05 })
            .factor("bonus_amount", 6_000.0)
            .factor("bonus_probability", 0.5)
            .factor("work_life_balance", 7.0),
        DecisionType::Investment => option
            .factor("initial_amount", 10_000.0)
            .factor("expected_return", Distribution::Normal { mean: 0.05, std_dev: 0.1 }),
    }
}

// H0: Identical options can be told apart
// Falsification: two copies of the same option, every decision type
#[test]
fn h0_1_identical_options_tie() {
    let engine = DecisionEngine::default();
    let facts = StaticFactProvider::default();
    for decision_type in DecisionType::ALL {
        let scenario = Scenario::new(decision_type, 5)
            .with_runs(1_000)
            .with_option(option_for(decision_type, "A"))
            .with_option(option_for(decision_type, "B"));
        let result = engine.simulate(&scenario, &facts).unwrap();

        assert!(
            result.recommendation.is_tie(),
            "{decision_type}: expected a tie, got {:?}",
            result.recommendation
        );
        assert!(result.rankings.iter().all(|r| r.rank == 1));
        let p = result.pairwise.get("A", "B").unwrap();
        assert!((p - 0.5).abs() < 1e-12, "{decision_type}: P(A beats B) = {p}");
    }
}

// H0: A higher-return, higher-risk fund is not preferred under the default
// risk-adjusted criterion
#[test]
fn h0_2_stock_fund_beats_bond_fund() {
    let scenario = Scenario::new(DecisionType::Investment, 10)
        .with_seed(42)
        .with_runs(10_000)
        .with_option(
            OptionSpec::new("StockFund")
                .factor("initial_amount", 10_000.0)
                .factor("expected_return", Distribution::Normal { mean: 0.07, std_dev: 0.15 }),
        )
        .with_option(
            OptionSpec::new("BondFund")
                .factor("initial_amount", 10_000.0)
                .factor("expected_return", Distribution::Normal { mean: 0.03, std_dev: 0.04 }),
        );
    let result = DecisionEngine::default()
        .simulate(&scenario, &StaticFactProvider::default())
        .unwrap();

    let stock = result.statistics("StockFund").unwrap();
    let bond = result.statistics("BondFund").unwrap();
    assert!(stock.mean > bond.mean);
    assert!(stock.std_dev > bond.std_dev);
    assert!(matches!(result.criterion, Criterion::RiskAdjusted { .. }));

    match &result.recommendation {
        Recommendation::Winner { option, confidence } => {
            assert_eq!(option, "StockFund");
            assert!(*confidence > 0.5 && *confidence < 1.0, "confidence {confidence}");
        }
        Recommendation::Tie { options } => panic!("unexpected tie between {options:?}"),
    }
    assert_eq!(result.ranking("StockFund").unwrap().rank, 1);
    assert_eq!(result.ranking("BondFund").unwrap().rank, 2);
}

// H0: Purchase ranking prefers the more expensive option
// Falsification: lower total cost must rank first
#[test]
fn h0_3_cheaper_purchase_ranks_first() {
    let cheap = option_for(DecisionType::Purchase, "Used").factor("purchase_price", 15_000.0);
    let dear = option_for(DecisionType::Purchase, "New");
    let scenario = Scenario::new(DecisionType::Purchase, 5)
        .with_runs(1_000)
        .with_criterion(Criterion::ExpectedValue)
        .with_option(dear)
        .with_option(cheap);
    let result = DecisionEngine::default()
        .simulate(&scenario, &StaticFactProvider::default())
        .unwrap();

    assert_eq!(result.winner(), Some("Used"));
    assert!(
        result.statistics("Used").unwrap().mean < result.statistics("New").unwrap().mean
    );
}

// H0: Pairwise probabilities are not complementary
#[test]
fn h0_4_pairwise_probabilities_sum_to_one() {
    let scenario = Scenario::new(DecisionType::Job, 3)
        .with_runs(800)
        .with_option(option_for(DecisionType::Job, "A"))
        .with_option(option_for(DecisionType::Job, "B").factor("bonus_probability", 0.9))
        .with_option(option_for(DecisionType::Job, "C").factor("salary", 85_000.0));
    let result = DecisionEngine::default()
        .simulate(&scenario, &StaticFactProvider::default())
        .unwrap();

    for a in ["A", "B", "C"] {
        for b in ["A", "B", "C"] {
            if a == b {
                continue;
            }
            let ab = result.pairwise.get(a, b).unwrap();
            let ba = result.pairwise.get(b, a).unwrap();
            assert!((ab + ba - 1.0).abs() < 1e-9, "P({a}>{b}) + P({b}>{a}) = {}", ab + ba);
        }
    }
}
