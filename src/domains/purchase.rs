//! Purchase: total cost of ownership against a budget.
//!
//! The asset loses a sampled fraction of its value each period. Maintenance
//! starts at the sampled annual cost and grows from the second period on.
//! The financed share of the price is repaid linearly over the horizon with
//! interest charged on the outstanding balance. Utility value is credited
//! every period.
//!
//! ```text
//! TCO     = price - residual value + sum(maintenance) + sum(interest) - sum(utility)
//! outcome = TCO - budget            (lower is better)
//! ```

use crate::error::SimResult;
use crate::scenario::{OptionFactorSet, RandomVariable, TimeHorizon};

use super::{grow, unit, PeriodFlow, Sampler, StepModel};

/// Purchase step model.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseModel {
    purchase_price: RandomVariable,
    depreciation_rate: RandomVariable,
    maintenance_cost: RandomVariable,
    budget: RandomVariable,
    financing_rate: RandomVariable,
    financed_fraction: RandomVariable,
    maintenance_growth: RandomVariable,
    utility_value: RandomVariable,
}

/// Running state of one purchase path.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseState {
    value: f64,
    maintenance: f64,
    outstanding: f64,
    repayment: f64,
    utility: f64,
    budget: f64,
    cost_of_ownership: f64,
}

impl PurchaseModel {
    /// Build from resolved factors.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a purchase factor is absent.
    pub fn from_factors(factors: &OptionFactorSet) -> SimResult<Self> {
        Ok(Self {
            purchase_price: factors.require("purchase_price")?.clone(),
            depreciation_rate: factors.require("depreciation_rate")?.clone(),
            maintenance_cost: factors.require("maintenance_cost")?.clone(),
            budget: factors.require("budget")?.clone(),
            financing_rate: factors.require("financing_rate")?.clone(),
            financed_fraction: factors.require("financed_fraction")?.clone(),
            maintenance_growth: factors.require("maintenance_growth")?.clone(),
            utility_value: factors.require("utility_value")?.clone(),
        })
    }
}

impl StepModel for PurchaseModel {
    type State = PurchaseState;

    fn start<S: Sampler>(&self, horizon: TimeHorizon, sampler: &mut S) -> PurchaseState {
        let price = sampler.draw(&self.purchase_price);
        let financed = price * unit(sampler.draw(&self.financed_fraction));
        PurchaseState {
            value: price,
            maintenance: sampler.draw(&self.maintenance_cost),
            outstanding: financed,
            repayment: financed / f64::from(horizon.years()),
            utility: sampler.draw(&self.utility_value),
            budget: sampler.draw(&self.budget),
            cost_of_ownership: 0.0,
        }
    }

    fn step<S: Sampler>(&self, state: &mut PurchaseState, period: u32, sampler: &mut S) -> PeriodFlow {
        let depreciation = unit(sampler.draw(&self.depreciation_rate));
        let lost = state.value * depreciation;
        state.value -= lost;

        if period > 0 {
            state.maintenance = grow(state.maintenance, sampler.draw(&self.maintenance_growth));
        }

        let interest = state.outstanding * sampler.draw(&self.financing_rate);
        state.outstanding = (state.outstanding - state.repayment).max(0.0);

        let flow = PeriodFlow {
            inflow: state.utility,
            outflow: lost + state.maintenance + interest,
        };
        state.cost_of_ownership -= flow.net();
        flow
    }

    fn outcome(&self, state: &PurchaseState) -> f64 {
        state.cost_of_ownership - state.budget
    }
}
