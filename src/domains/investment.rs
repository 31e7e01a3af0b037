//! Investment: net gain of a compounded balance.
//!
//! Period returns are driven by an AR(1) shock so that consecutive years can
//! be serially correlated:
//!
//! ```text
//! e_0 = z_0
//! e_t = phi * e_(t-1) + sqrt(1 - phi^2) * z_t
//! r_t = expected_return(e_t) + market_state
//! ```
//!
//! `phi` is the `serial_correlation` factor; `phi = 0` gives independent
//! yearly returns. The market state is drawn once per path and shifts every
//! year's return. A return tagged for correlation reuses its shared draw in
//! every period. Contributions are added at the end of each period. A
//! balance that reaches zero is ruined: it stops growing and stops
//! receiving contributions.
//!
//! Outcome: final value minus total invested.

use crate::error::SimResult;
use crate::scenario::{OptionFactorSet, RandomVariable, TimeHorizon};

use super::{PeriodFlow, Sampler, StepModel};

/// Investment step model.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentModel {
    initial_amount: RandomVariable,
    expected_return: RandomVariable,
    annual_contribution: RandomVariable,
    market_state: RandomVariable,
    serial_correlation: f64,
}

/// Running state of one investment path.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentState {
    value: f64,
    invested: f64,
    market: f64,
    shock: f64,
    ruined: bool,
}

impl InvestmentModel {
    /// Build from resolved factors.
    ///
    /// # Errors
    ///
    /// Returns a validation error if an investment factor is absent.
    pub fn from_factors(factors: &OptionFactorSet) -> SimResult<Self> {
        let phi = factors.require("serial_correlation")?.expected_value();
        Ok(Self {
            initial_amount: factors.require("initial_amount")?.clone(),
            expected_return: factors.require("expected_return")?.clone(),
            annual_contribution: factors.require("annual_contribution")?.clone(),
            market_state: factors.require("market_state")?.clone(),
            serial_correlation: if (0.0..1.0).contains(&phi) { phi } else { 0.0 },
        })
    }

    /// Autocorrelation of the yearly return shock.
    #[must_use]
    pub const fn serial_correlation(&self) -> f64 {
        self.serial_correlation
    }

    fn next_shock(&self, previous: f64, z: f64, period: u32) -> f64 {
        if period == 0 || self.expected_return.correlation_tag().is_some() {
            return z;
        }
        let phi = self.serial_correlation;
        phi * previous + (1.0 - phi * phi).sqrt() * z
    }
}

impl StepModel for InvestmentModel {
    type State = InvestmentState;

    fn start<S: Sampler>(&self, _horizon: TimeHorizon, sampler: &mut S) -> InvestmentState {
        let value = sampler.draw(&self.initial_amount);
        InvestmentState {
            value,
            invested: value,
            market: sampler.draw(&self.market_state),
            shock: 0.0,
            ruined: value <= 0.0,
        }
    }

    fn step<S: Sampler>(&self, state: &mut InvestmentState, period: u32, sampler: &mut S) -> PeriodFlow {
        let z = sampler.normal_for(&self.expected_return);
        state.shock = self.next_shock(state.shock, z, period);
        if state.ruined {
            return PeriodFlow::default();
        }

        let rate = self.expected_return.from_standard_normal(state.shock) + state.market;
        let before = state.value;
        let grown = before * (1.0 + rate);

        if grown <= 0.0 {
            state.value = 0.0;
            state.ruined = true;
            return PeriodFlow::signed(-before);
        }

        let contribution = sampler.draw(&self.annual_contribution);
        state.value = grown + contribution;
        state.invested += contribution;
        PeriodFlow::signed(grown - before)
    }

    fn outcome(&self, state: &InvestmentState) -> f64 {
        state.value - state.invested
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{SamplingConfig, ValuationConfig};
    use crate::domains::stats::OutcomeStatistics;
    use crate::domains::PathModel;
    use crate::facts::StaticFactProvider;
    use crate::scenario::factors::resolve_option;
    use crate::scenario::{DecisionType, Distribution, OptionSpec};

    fn fund(expected_return: impl Into<crate::scenario::FactorInput>) -> OptionSpec {
        OptionSpec::new("Fund")
            .factor("initial_amount", 1_000.0)
            .factor("expected_return", expected_return)
    }

    fn model(option: &OptionSpec) -> PathModel {
        let set = resolve_option(
            DecisionType::Investment,
            option,
            &StaticFactProvider::default(),
            &SamplingConfig::default(),
        )
        .unwrap();
        PathModel::build(&set, &ValuationConfig::default()).unwrap()
    }

    #[test]
    fn test_constant_return_compounds() {
        let outcome = model(&fund(0.05)).trial_outcome(TimeHorizon::new(2).unwrap(), 1, 0);
        assert!((outcome - 102.5).abs() < 1e-9);
    }

    #[test]
    fn test_contributions_are_not_gains() {
        let option = fund(0.1).factor("annual_contribution", 100.0);
        let m = model(&option);
        let outcome = m.trial_outcome(TimeHorizon::new(2).unwrap(), 1, 0);
        // 1000 -> 1100 (+100) -> 1320 (+100); invested 1200
        assert!((outcome - 220.0).abs() < 1e-9, "{outcome}");

        let rows = m.project(TimeHorizon::new(2).unwrap());
        assert!((rows[0].inflow - 100.0).abs() < 1e-9);
        assert!((rows[1].inflow - 120.0).abs() < 1e-9);
        assert!((rows[1].cumulative - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_market_state_shifts_returns() {
        let option = fund(0.02).factor("market_state", 0.03);
        let outcome = model(&option).trial_outcome(TimeHorizon::new(1).unwrap(), 1, 0);
        assert!((outcome - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_ruin_is_absorbing() {
        let option = fund(-1.0).factor("annual_contribution", 500.0);
        let outcome = model(&option).trial_outcome(TimeHorizon::new(5).unwrap(), 1, 0);
        assert!((outcome + 1_000.0).abs() < 1e-9, "{outcome}");
    }

    #[test]
    fn test_non_positive_start_is_flat() {
        let option = fund(0.1).factor("initial_amount", 0.0);
        let outcome = model(&option).trial_outcome(TimeHorizon::new(3).unwrap(), 1, 0);
        assert!(outcome.abs() < f64::EPSILON);
    }

    #[test]
    fn test_serial_correlation_widens_spread() {
        let risky = Distribution::Normal {
            mean: 0.05,
            std_dev: 0.1,
        };
        let independent = model(&fund(risky.clone()));
        let persistent = model(&fund(risky).factor("serial_correlation", 0.9));
        let horizon = TimeHorizon::new(10).unwrap();

        let spread = |m: &PathModel| {
            let outcomes: Vec<f64> = (0..2_000).map(|t| m.trial_outcome(horizon, 42, t)).collect();
            OutcomeStatistics::from_outcomes(&outcomes, 0.0, crate::scenario::Polarity::HigherIsBetter)
                .std_dev
        };
        assert!(spread(&persistent) > 1.5 * spread(&independent));
    }

    #[test]
    fn test_tagged_return_is_persistent() {
        let option = fund(crate::scenario::VariableSpec::new(Distribution::Normal {
            mean: 0.05,
            std_dev: 0.1,
        })
        .correlated("regime"));
        let m = model(&option);
        let horizon = TimeHorizon::new(3).unwrap();
        // one shared draw r: outcome = 1000 * ((1 + r)^3 - 1)
        let outcome = m.trial_outcome(horizon, 5, 0);
        let r = (1.0 + outcome / 1_000.0).cbrt() - 1.0;
        let one_year = m.trial_outcome(TimeHorizon::new(1).unwrap(), 5, 0);
        assert!((one_year - 1_000.0 * r).abs() < 1e-6);
    }
}
