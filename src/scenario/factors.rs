//! Factor schemas and option factor set construction.
//!
//! Each [`DecisionType`] owns a static [`FactorSchema`]: which factors are
//! required, which are optional (and their defaults), and which are rates
//! subject to clamping. Building an [`OptionFactorSet`] is a two-step
//! process: [`check_option`] validates the raw input without touching the
//! fact provider, then [`resolve_option`] looks up references and produces
//! immutable random variables.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::variable::{Bounds, Distribution, RandomVariable};
use super::{DecisionType, OptionSpec};
use crate::config::SamplingConfig;
use crate::error::{SimError, SimResult, Violation, ViolationKind};
use crate::facts::FactProvider;

/// Raw factor value as supplied by the scenario author.
///
/// Accepted shapes: a number (constant), a string (fact reference key), or a
/// map with a `kind` tag (distribution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorInput {
    /// Deterministic literal.
    Literal(f64),
    /// Key resolved through the [`FactProvider`].
    Reference(String),
    /// Uncertain quantity.
    Variable(VariableSpec),
}

impl FactorInput {
    /// Reference to an external fact.
    #[must_use]
    pub fn reference(key: impl Into<String>) -> Self {
        Self::Reference(key.into())
    }
}

impl From<f64> for FactorInput {
    fn from(value: f64) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for FactorInput {
    fn from(key: &str) -> Self {
        Self::Reference(key.to_string())
    }
}

impl From<String> for FactorInput {
    fn from(key: String) -> Self {
        Self::Reference(key)
    }
}

impl From<Distribution> for FactorInput {
    fn from(distribution: Distribution) -> Self {
        Self::Variable(VariableSpec::new(distribution))
    }
}

impl From<VariableSpec> for FactorInput {
    fn from(spec: VariableSpec) -> Self {
        Self::Variable(spec)
    }
}

/// Distribution-valued factor input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Distribution family and parameters.
    #[serde(flatten)]
    pub distribution: Distribution,
    /// Explicit clamping range; overrides rate clamping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    /// Set to `false` to disable rate clamping for this factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clamp: Option<bool>,
    /// Variables sharing a tag move together within a trial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_tag: Option<String>,
}

impl VariableSpec {
    /// Unbounded, uncorrelated spec.
    #[must_use]
    pub const fn new(distribution: Distribution) -> Self {
        Self {
            distribution,
            bounds: None,
            clamp: None,
            correlation_tag: None,
        }
    }

    /// Attach explicit bounds.
    #[must_use]
    pub const fn bounded(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some(Bounds { min, max });
        self
    }

    /// Disable rate clamping.
    #[must_use]
    pub const fn unclamped(mut self) -> Self {
        self.clamp = Some(false);
        self
    }

    /// Attach a correlation tag.
    #[must_use]
    pub fn correlated(mut self, tag: impl Into<String>) -> Self {
        self.correlation_tag = Some(tag.into());
        self
    }
}

/// Whether a factor must be supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Requirement {
    /// Missing factor is a validation failure.
    Required,
    /// Missing factor takes this constant.
    Optional(f64),
}

/// Admissible range of a factor's value, checked on constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    /// Any finite value.
    Any,
    /// Autocorrelation coefficient in `[0, 1)`.
    Correlation,
}

impl ValueDomain {
    fn check(self, value: f64) -> Option<Violation> {
        match self {
            Self::Any => None,
            Self::Correlation if (0.0..1.0).contains(&value) => None,
            Self::Correlation => Some(Violation::parameter(format!(
                "correlation must lie in [0, 1), got {value}"
            ))),
        }
    }
}

/// One entry of a factor schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorSpec {
    /// Factor name as it appears in the scenario.
    pub name: &'static str,
    /// Required or optional with default.
    pub requirement: Requirement,
    /// Per-period rate: subject to `sampling.rate_bounds`.
    pub rate: bool,
    /// Must be a constant (literal, reference or `kind: constant`).
    pub constant_only: bool,
    /// Value domain for constants.
    pub domain: ValueDomain,
}

impl FactorSpec {
    const fn required(name: &'static str) -> Self {
        Self {
            name,
            requirement: Requirement::Required,
            rate: false,
            constant_only: false,
            domain: ValueDomain::Any,
        }
    }

    const fn optional(name: &'static str, default: f64) -> Self {
        Self {
            requirement: Requirement::Optional(default),
            ..Self::required(name)
        }
    }

    const fn rate(mut self) -> Self {
        self.rate = true;
        self
    }

    const fn parameter(mut self, domain: ValueDomain) -> Self {
        self.constant_only = true;
        self.domain = domain;
        self
    }

    /// True if the factor must be supplied.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self.requirement, Requirement::Required)
    }
}

const RELOCATION: &[FactorSpec] = &[
    FactorSpec::required("income"),
    FactorSpec::required("cost_of_living"),
    FactorSpec::required("tax_rate"),
    FactorSpec::required("income_growth").rate(),
    FactorSpec::required("inflation").rate(),
    FactorSpec::required("quality_of_life"),
    FactorSpec::optional("moving_cost", 0.0),
    FactorSpec::optional("initial_savings", 0.0),
];

const PURCHASE: &[FactorSpec] = &[
    FactorSpec::required("purchase_price"),
    FactorSpec::required("depreciation_rate").rate(),
    FactorSpec::required("maintenance_cost"),
    FactorSpec::required("budget"),
    FactorSpec::optional("financing_rate", 0.0).rate(),
    FactorSpec::optional("financed_fraction", 0.0),
    FactorSpec::optional("maintenance_growth", 0.0).rate(),
    FactorSpec::optional("utility_value", 0.0),
];

const JOB: &[FactorSpec] = &[
    FactorSpec::required("salary"),
    FactorSpec::required("raise_rate").rate(),
    FactorSpec::required("bonus_amount"),
    FactorSpec::required("bonus_probability"),
    FactorSpec::required("work_life_balance"),
    FactorSpec::optional("benefits", 0.0),
];

const INVESTMENT: &[FactorSpec] = &[
    FactorSpec::required("initial_amount"),
    FactorSpec::required("expected_return").rate(),
    FactorSpec::optional("annual_contribution", 0.0),
    FactorSpec::optional("market_state", 0.0).rate(),
    FactorSpec::optional("serial_correlation", 0.0).parameter(ValueDomain::Correlation),
];

/// Factor schema of one decision type.
#[derive(Debug, Clone, Copy)]
pub struct FactorSchema {
    decision_type: DecisionType,
    factors: &'static [FactorSpec],
}

impl FactorSchema {
    /// Schema for `decision_type`.
    #[must_use]
    pub const fn for_type(decision_type: DecisionType) -> Self {
        let factors = match decision_type {
            DecisionType::Relocation => RELOCATION,
            DecisionType::Purchase => PURCHASE,
            DecisionType::Job => JOB,
            DecisionType::Investment => INVESTMENT,
        };
        Self {
            decision_type,
            factors,
        }
    }

    /// Decision type this schema belongs to.
    #[must_use]
    pub const fn decision_type(&self) -> DecisionType {
        self.decision_type
    }

    /// All factor specs in declaration order.
    #[must_use]
    pub const fn factors(&self) -> &'static [FactorSpec] {
        self.factors
    }

    /// Required factor specs.
    pub fn required(&self) -> impl Iterator<Item = &'static FactorSpec> {
        self.factors.iter().filter(|f| f.is_required())
    }

    /// Look up a factor spec by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static FactorSpec> {
        self.factors.iter().find(|f| f.name == name)
    }

    fn fully_covers(&self, factors: &IndexMap<String, FactorInput>) -> bool {
        self.required().all(|f| factors.contains_key(f.name))
    }
}

/// Resolved, immutable factors of one option.
///
/// Every factor of the schema is present: optional factors that were not
/// supplied hold their default as a constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionFactorSet {
    name: String,
    decision_type: DecisionType,
    factors: IndexMap<String, RandomVariable>,
}

impl OptionFactorSet {
    /// Option name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decision type the factors were resolved against.
    #[must_use]
    pub const fn decision_type(&self) -> DecisionType {
        self.decision_type
    }

    /// Factor by name.
    #[must_use]
    pub fn get(&self, factor: &str) -> Option<&RandomVariable> {
        self.factors.get(factor)
    }

    /// Factor by name, as an error if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Validation`] with a missing-factor violation.
    pub fn require(&self, factor: &str) -> SimResult<&RandomVariable> {
        self.factors.get(factor).ok_or_else(|| {
            SimError::validation(vec![Violation::factor(
                &self.name,
                factor,
                ViolationKind::MissingFactor,
            )])
        })
    }

    /// Iterate factors in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RandomVariable)> {
        self.factors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True if no factor carries randomness.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.factors.values().all(RandomVariable::is_constant)
    }
}

/// Validate one option's raw factors against its schema.
///
/// Collects every violation. Fact references are not resolved here.
#[must_use]
pub fn check_option(
    decision_type: DecisionType,
    option: &OptionSpec,
    sampling: &SamplingConfig,
) -> Vec<Violation> {
    let schema = FactorSchema::for_type(decision_type);
    let name = option.name.as_str();
    let missing: Vec<&str> = schema
        .required()
        .filter(|f| !option.factors.contains_key(f.name))
        .map(|f| f.name)
        .collect();

    if missing.len() == schema.required().count() {
        let detected = DecisionType::ALL
            .into_iter()
            .filter(|&other| other != decision_type)
            .find(|&other| FactorSchema::for_type(other).fully_covers(&option.factors));
        if let Some(detected) = detected {
            return vec![Violation {
                option: Some(name.to_string()),
                factor: None,
                kind: ViolationKind::SchemaMismatch { detected },
            }];
        }
    }

    let mut out: Vec<Violation> = missing
        .into_iter()
        .map(|factor| Violation::factor(name, factor, ViolationKind::MissingFactor))
        .collect();

    for (factor, input) in &option.factors {
        let Some(spec) = schema.get(factor) else {
            out.push(Violation::factor(name, factor, ViolationKind::UnknownFactor));
            continue;
        };
        let found = match input {
            FactorInput::Literal(value) => literal_violations(spec, *value),
            FactorInput::Reference(key) if key.trim().is_empty() => {
                vec![Violation::parameter("fact reference key is empty")]
            }
            FactorInput::Reference(_) => Vec::new(),
            FactorInput::Variable(vs) => match build_variable(spec, vs, sampling) {
                Ok(_) => Vec::new(),
                Err(violations) => violations,
            },
        };
        out.extend(found.into_iter().map(|v| v.within(name, factor)));
    }
    out
}

/// Resolve one option into an [`OptionFactorSet`].
///
/// References are looked up through `facts`; unresolved keys come back as
/// [`ViolationKind::FactNotFound`]. Assumes [`check_option`] passed, but
/// re-reports anything it finds rather than panicking.
///
/// # Errors
///
/// Returns every violation found while resolving.
pub fn resolve_option(
    decision_type: DecisionType,
    option: &OptionSpec,
    facts: &dyn FactProvider,
    sampling: &SamplingConfig,
) -> Result<OptionFactorSet, Vec<Violation>> {
    let schema = FactorSchema::for_type(decision_type);
    let name = option.name.as_str();
    let mut factors = IndexMap::with_capacity(schema.factors().len());
    let mut violations = Vec::new();

    for spec in schema.factors() {
        let resolved = match (option.factors.get(spec.name), spec.requirement) {
            (None, Requirement::Optional(default)) => Ok(RandomVariable::constant(default)),
            (None, Requirement::Required) => Err(vec![Violation::factor(
                name,
                spec.name,
                ViolationKind::MissingFactor,
            )]),
            (Some(FactorInput::Literal(value)), _) => {
                literal(spec, *value).map_err(|v| within(v, name, spec.name))
            }
            (Some(FactorInput::Reference(key)), _) => match facts.lookup(key) {
                Some(value) => literal(spec, value).map_err(|v| within(v, name, spec.name)),
                None => {
                    tracing::debug!(option = name, factor = spec.name, key = %key, "fact not found");
                    Err(vec![Violation::factor(
                        name,
                        spec.name,
                        ViolationKind::FactNotFound { key: key.clone() },
                    )])
                }
            },
            (Some(FactorInput::Variable(vs)), _) => {
                build_variable(spec, vs, sampling).map_err(|v| within(v, name, spec.name))
            }
        };
        match resolved {
            Ok(var) => {
                factors.insert(spec.name.to_string(), var);
            }
            Err(found) => violations.extend(found),
        }
    }

    if violations.is_empty() {
        Ok(OptionFactorSet {
            name: name.to_string(),
            decision_type,
            factors,
        })
    } else {
        Err(violations)
    }
}

fn within(violations: Vec<Violation>, option: &str, factor: &str) -> Vec<Violation> {
    violations
        .into_iter()
        .map(|v| v.within(option, factor))
        .collect()
}

fn literal_violations(spec: &FactorSpec, value: f64) -> Vec<Violation> {
    if !value.is_finite() {
        return vec![Violation::parameter(format!(
            "value must be finite, got {value}"
        ))];
    }
    spec.domain.check(value).into_iter().collect()
}

fn literal(spec: &FactorSpec, value: f64) -> Result<RandomVariable, Vec<Violation>> {
    let violations = literal_violations(spec, value);
    if violations.is_empty() {
        Ok(RandomVariable::constant(value))
    } else {
        Err(violations)
    }
}

fn build_variable(
    spec: &FactorSpec,
    vs: &VariableSpec,
    sampling: &SamplingConfig,
) -> Result<RandomVariable, Vec<Violation>> {
    if let Distribution::Constant { value } = vs.distribution {
        return literal(spec, value);
    }
    if spec.constant_only {
        return Err(vec![Violation {
            option: None,
            factor: None,
            kind: ViolationKind::WrongFactorKind {
                message: "must be a constant, not a distribution".to_string(),
            },
        }]);
    }

    let clamp_rate = spec.rate
        && vs.clamp.unwrap_or(sampling.clamp_rates)
        && matches!(
            vs.distribution,
            Distribution::Normal { .. } | Distribution::LogNormal { .. }
        );
    let bounds = vs.bounds.or_else(|| {
        clamp_rate.then(|| Bounds {
            min: sampling.rate_bounds[0],
            max: sampling.rate_bounds[1],
        })
    });

    RandomVariable::with_parts(vs.distribution.clone(), bounds, vs.correlation_tag.clone())
        .map_err(|err| err.violations().to_vec())
}
