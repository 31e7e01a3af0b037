//! Path simulation per decision type.
//!
//! Each decision type is a [`StepModel`]: a pure function of the option's
//! factors, the period index, a running state and a [`Sampler`]. The
//! [`PathModel`] enum dispatches to the right model, so the aggregator never
//! needs to know which decision it is simulating.
//!
//! Two samplers drive the same step functions:
//! - [`TrialSampler`]: seeded random draws, one per Monte Carlo trial
//! - [`ExpectedSampler`]: every variable at its expected value, for projections

pub mod investment;
pub mod job;
pub mod monte_carlo;
pub mod purchase;
pub mod relocation;
pub mod stats;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use investment::InvestmentModel;
pub use job::JobModel;
pub use monte_carlo::{Aggregator, BatchProgress, OutcomeDistribution};
pub use purchase::PurchaseModel;
pub use relocation::RelocationModel;
pub use stats::OutcomeStatistics;

use crate::config::ValuationConfig;
use crate::engine::rng::SimRng;
use crate::error::SimResult;
use crate::scenario::{
    DecisionType, OptionFactorSet, Polarity, RandomVariable, TimeHorizon,
};

/// Source of values for random variables inside one path.
pub trait Sampler {
    /// Value of `var` for this draw.
    ///
    /// Variables sharing a correlation tag see one shared underlying draw
    /// for the whole path.
    fn draw(&mut self, var: &RandomVariable) -> f64;

    /// Standard normal innovation for `var`: shared for tagged variables,
    /// fresh otherwise.
    fn normal_for(&mut self, var: &RandomVariable) -> f64;

    /// Bernoulli gate: 1 when an event of probability `p` fires, else 0.
    fn gate(&mut self, p: f64) -> f64;
}

/// Seeded sampler for one Monte Carlo trial.
#[derive(Debug, Clone)]
pub struct TrialSampler {
    rng: SimRng,
    shared: HashMap<String, f64>,
}

impl TrialSampler {
    /// Sampler for trial `trial` of `seed`.
    #[must_use]
    pub fn new(seed: u64, trial: u64) -> Self {
        Self {
            rng: SimRng::for_trial(seed, trial),
            shared: HashMap::new(),
        }
    }

    fn shared_normal(&mut self, tag: &str) -> f64 {
        if let Some(&z) = self.shared.get(tag) {
            return z;
        }
        let z = self.rng.gen_standard_normal();
        self.shared.insert(tag.to_string(), z);
        z
    }
}

impl Sampler for TrialSampler {
    fn draw(&mut self, var: &RandomVariable) -> f64 {
        match var.correlation_tag() {
            Some(tag) if !var.is_constant() => {
                let z = self.shared_normal(tag);
                var.from_standard_normal(z)
            }
            _ => var.sample(&mut self.rng),
        }
    }

    fn normal_for(&mut self, var: &RandomVariable) -> f64 {
        match var.correlation_tag() {
            Some(tag) => self.shared_normal(tag),
            None => self.rng.gen_standard_normal(),
        }
    }

    fn gate(&mut self, p: f64) -> f64 {
        if self.rng.gen_bool(p) {
            1.0
        } else {
            0.0
        }
    }
}

/// Deterministic sampler: expected values, zero shocks, probabilities as weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedSampler;

impl Sampler for ExpectedSampler {
    fn draw(&mut self, var: &RandomVariable) -> f64 {
        var.expected_value()
    }

    fn normal_for(&mut self, _var: &RandomVariable) -> f64 {
        0.0
    }

    fn gate(&mut self, p: f64) -> f64 {
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }
}

/// Money flowing in and out during one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodFlow {
    /// Money (or monetary equivalent) gained.
    pub inflow: f64,
    /// Money (or monetary equivalent) spent or lost.
    pub outflow: f64,
}

impl PeriodFlow {
    /// Split a signed amount into inflow or outflow.
    #[must_use]
    pub fn signed(amount: f64) -> Self {
        if amount >= 0.0 {
            Self {
                inflow: amount,
                outflow: 0.0,
            }
        } else {
            Self {
                inflow: 0.0,
                outflow: -amount,
            }
        }
    }

    /// `inflow - outflow`.
    #[must_use]
    pub fn net(&self) -> f64 {
        self.inflow - self.outflow
    }
}

/// Time-stepped model of one decision type.
///
/// `step` is called for periods `0..horizon` strictly in order; the state
/// carries from one period to the next and never across trials.
pub trait StepModel {
    /// Running state of one path.
    type State;

    /// Draw per-path quantities and build the opening state.
    fn start<S: Sampler>(&self, horizon: TimeHorizon, sampler: &mut S) -> Self::State;

    /// Advance one period.
    fn step<S: Sampler>(&self, state: &mut Self::State, period: u32, sampler: &mut S)
        -> PeriodFlow;

    /// Scalar outcome of a finished path.
    fn outcome(&self, state: &Self::State) -> f64;

    /// Position before the first period, the base of cumulative projections.
    fn opening(&self, _state: &Self::State) -> f64 {
        0.0
    }
}

/// Run one full path, reporting each period's flow to `on_period`.
pub fn run_path<M, S, F>(model: &M, horizon: TimeHorizon, sampler: &mut S, mut on_period: F) -> f64
where
    M: StepModel,
    S: Sampler,
    F: FnMut(u32, &M::State, PeriodFlow),
{
    let mut state = model.start(horizon, sampler);
    for period in 0..horizon.years() {
        let flow = model.step(&mut state, period, sampler);
        on_period(period, &state, flow);
    }
    model.outcome(&state)
}

/// One year of a deterministic projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearProjection {
    /// Year number, starting at 1.
    pub year: u32,
    /// Expected inflow in the year.
    pub inflow: f64,
    /// Expected outflow in the year.
    pub outflow: f64,
    /// `inflow - outflow`.
    pub net: f64,
    /// Opening position plus every net so far.
    pub cumulative: f64,
}

/// Path model of one option, dispatched by decision type.
#[derive(Debug, Clone, PartialEq)]
pub enum PathModel {
    /// Relocation model.
    Relocation(RelocationModel),
    /// Purchase model.
    Purchase(PurchaseModel),
    /// Job model.
    Job(JobModel),
    /// Investment model.
    Investment(InvestmentModel),
}

impl PathModel {
    /// Build the model for a resolved option.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a factor the model needs is absent.
    pub fn build(factors: &OptionFactorSet, valuation: &ValuationConfig) -> SimResult<Self> {
        Ok(match factors.decision_type() {
            DecisionType::Relocation => {
                Self::Relocation(RelocationModel::from_factors(factors, valuation)?)
            }
            DecisionType::Purchase => Self::Purchase(PurchaseModel::from_factors(factors)?),
            DecisionType::Job => Self::Job(JobModel::from_factors(factors, valuation)?),
            DecisionType::Investment => {
                Self::Investment(InvestmentModel::from_factors(factors)?)
            }
        })
    }

    /// Decision type of the model.
    #[must_use]
    pub const fn decision_type(&self) -> DecisionType {
        match self {
            Self::Relocation(_) => DecisionType::Relocation,
            Self::Purchase(_) => DecisionType::Purchase,
            Self::Job(_) => DecisionType::Job,
            Self::Investment(_) => DecisionType::Investment,
        }
    }

    /// Outcome polarity.
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.decision_type().polarity()
    }

    /// Run one trial and return its outcome.
    pub fn run_trial<S: Sampler>(&self, horizon: TimeHorizon, sampler: &mut S) -> f64 {
        match self {
            Self::Relocation(m) => run_path(m, horizon, sampler, |_, _, _| {}),
            Self::Purchase(m) => run_path(m, horizon, sampler, |_, _, _| {}),
            Self::Job(m) => run_path(m, horizon, sampler, |_, _, _| {}),
            Self::Investment(m) => run_path(m, horizon, sampler, |_, _, _| {}),
        }
    }

    /// Outcome of trial `trial` under master seed `seed`.
    #[must_use]
    pub fn trial_outcome(&self, horizon: TimeHorizon, seed: u64, trial: u64) -> f64 {
        self.run_trial(horizon, &mut TrialSampler::new(seed, trial))
    }

    /// Year-by-year expected path.
    #[must_use]
    pub fn project(&self, horizon: TimeHorizon) -> Vec<YearProjection> {
        match self {
            Self::Relocation(m) => project(m, horizon),
            Self::Purchase(m) => project(m, horizon),
            Self::Job(m) => project(m, horizon),
            Self::Investment(m) => project(m, horizon),
        }
    }
}

fn project<M: StepModel>(model: &M, horizon: TimeHorizon) -> Vec<YearProjection> {
    let mut rows = Vec::with_capacity(horizon.years() as usize);
    let mut cumulative = None;
    run_path(model, horizon, &mut ExpectedSampler, |period, state, flow| {
        let base = *cumulative.get_or_insert_with(|| model.opening(state));
        let net = flow.net();
        let running = base + net;
        cumulative = Some(running);
        rows.push(YearProjection {
            year: period + 1,
            inflow: flow.inflow,
            outflow: flow.outflow,
            net,
            cumulative: running,
        });
    });
    rows
}

/// `base * (1 + rate)`, leaving a zero base at zero.
#[must_use]
pub(crate) fn grow(base: f64, rate: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        base * (1.0 + rate)
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
#[must_use]
pub(crate) fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
