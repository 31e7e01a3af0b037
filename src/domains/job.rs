//! Job offer: cumulative compensation net of a work-life-balance penalty.
//!
//! Each period pays salary plus benefits and, when a Bernoulli draw with the
//! sampled bonus probability fires, the sampled bonus. Salary then grows by
//! the sampled raise. The work-life-balance score is drawn once per path,
//! clamped to `[0, work_life_scale]`, and every point below the maximum
//! costs `work_life_penalty` per year.

use crate::config::ValuationConfig;
use crate::error::SimResult;
use crate::scenario::{OptionFactorSet, RandomVariable, TimeHorizon};

use super::{grow, unit, PeriodFlow, Sampler, StepModel};

/// Job step model.
#[derive(Debug, Clone, PartialEq)]
pub struct JobModel {
    salary: RandomVariable,
    raise_rate: RandomVariable,
    bonus_amount: RandomVariable,
    bonus_probability: RandomVariable,
    work_life_balance: RandomVariable,
    benefits: RandomVariable,
    work_life_penalty: f64,
    work_life_scale: f64,
}

/// Running state of one job path.
#[derive(Debug, Clone, PartialEq)]
pub struct JobState {
    salary: f64,
    penalty_per_year: f64,
    total: f64,
}

impl JobModel {
    /// Build from resolved factors.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a job factor is absent.
    pub fn from_factors(factors: &OptionFactorSet, valuation: &ValuationConfig) -> SimResult<Self> {
        Ok(Self {
            salary: factors.require("salary")?.clone(),
            raise_rate: factors.require("raise_rate")?.clone(),
            bonus_amount: factors.require("bonus_amount")?.clone(),
            bonus_probability: factors.require("bonus_probability")?.clone(),
            work_life_balance: factors.require("work_life_balance")?.clone(),
            benefits: factors.require("benefits")?.clone(),
            work_life_penalty: valuation.work_life_penalty,
            work_life_scale: valuation.work_life_scale,
        })
    }

    fn shortfall(&self, score: f64) -> f64 {
        if score.is_nan() {
            return self.work_life_scale;
        }
        self.work_life_scale - score.clamp(0.0, self.work_life_scale)
    }
}

impl StepModel for JobModel {
    type State = JobState;

    fn start<S: Sampler>(&self, _horizon: TimeHorizon, sampler: &mut S) -> JobState {
        let score = sampler.draw(&self.work_life_balance);
        JobState {
            salary: sampler.draw(&self.salary),
            penalty_per_year: self.work_life_penalty * self.shortfall(score),
            total: 0.0,
        }
    }

    fn step<S: Sampler>(&self, state: &mut JobState, _period: u32, sampler: &mut S) -> PeriodFlow {
        let benefits = sampler.draw(&self.benefits);
        let probability = unit(sampler.draw(&self.bonus_probability));
        let bonus = sampler.gate(probability) * sampler.draw(&self.bonus_amount);

        let flow = PeriodFlow {
            inflow: state.salary + benefits + bonus,
            outflow: state.penalty_per_year,
        };
        state.total += flow.net();
        state.salary = grow(state.salary, sampler.draw(&self.raise_rate));
        flow
    }

    fn outcome(&self, state: &JobState) -> f64 {
        state.total
    }
}
