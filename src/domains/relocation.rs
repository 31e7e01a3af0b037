//! Relocation: cumulative net savings in a new city.
//!
//! Per period: income grows by the sampled income growth, cost of living by
//! the sampled inflation, and after-tax income minus cost is saved. The
//! quality-of-life score is drawn once per path and valued at
//! `quality_of_life_value` per point per year. The moving cost is paid in
//! the first period. Initial savings open the projected balance but are not
//! part of the outcome, which counts only what the move adds.

use crate::config::ValuationConfig;
use crate::error::SimResult;
use crate::scenario::{OptionFactorSet, RandomVariable, TimeHorizon};

use super::{grow, unit, PeriodFlow, Sampler, StepModel};

/// Relocation step model.
#[derive(Debug, Clone, PartialEq)]
pub struct RelocationModel {
    income: RandomVariable,
    cost_of_living: RandomVariable,
    tax_rate: RandomVariable,
    income_growth: RandomVariable,
    inflation: RandomVariable,
    quality_of_life: RandomVariable,
    moving_cost: RandomVariable,
    initial_savings: RandomVariable,
    quality_of_life_value: f64,
}

/// Running state of one relocation path.
#[derive(Debug, Clone, PartialEq)]
pub struct RelocationState {
    income: f64,
    cost: f64,
    savings: f64,
    balance: f64,
    quality_per_year: f64,
    moving_cost_due: f64,
}

impl RelocationModel {
    /// Build from resolved factors.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a relocation factor is absent.
    pub fn from_factors(factors: &OptionFactorSet, valuation: &ValuationConfig) -> SimResult<Self> {
        Ok(Self {
            income: factors.require("income")?.clone(),
            cost_of_living: factors.require("cost_of_living")?.clone(),
            tax_rate: factors.require("tax_rate")?.clone(),
            income_growth: factors.require("income_growth")?.clone(),
            inflation: factors.require("inflation")?.clone(),
            quality_of_life: factors.require("quality_of_life")?.clone(),
            moving_cost: factors.require("moving_cost")?.clone(),
            initial_savings: factors.require("initial_savings")?.clone(),
            quality_of_life_value: valuation.quality_of_life_value,
        })
    }
}

impl StepModel for RelocationModel {
    type State = RelocationState;

    fn start<S: Sampler>(&self, _horizon: TimeHorizon, sampler: &mut S) -> RelocationState {
        let savings = sampler.draw(&self.initial_savings);
        RelocationState {
            income: sampler.draw(&self.income),
            cost: sampler.draw(&self.cost_of_living),
            savings,
            balance: savings,
            quality_per_year: self.quality_of_life_value * sampler.draw(&self.quality_of_life),
            moving_cost_due: sampler.draw(&self.moving_cost),
        }
    }

    fn step<S: Sampler>(
        &self,
        state: &mut RelocationState,
        _period: u32,
        sampler: &mut S,
    ) -> PeriodFlow {
        let growth = sampler.draw(&self.income_growth);
        let inflation = sampler.draw(&self.inflation);
        let tax = unit(sampler.draw(&self.tax_rate));

        state.income = grow(state.income, growth);
        state.cost = grow(state.cost, inflation);

        let flow = PeriodFlow {
            inflow: state.income * (1.0 - tax) + state.quality_per_year,
            outflow: state.cost + std::mem::take(&mut state.moving_cost_due),
        };
        state.balance += flow.net();
        flow
    }

    fn outcome(&self, state: &RelocationState) -> f64 {
        state.balance - state.savings
    }

    fn opening(&self, state: &RelocationState) -> f64 {
        state.savings
    }
}
