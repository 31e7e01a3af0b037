//! Deterministic yearly projections.
//!
//! Each option's step model is run once with every random variable at its
//! expected value, producing a year-by-year view of the typical path next to
//! the Monte Carlo distribution.

use indexmap::IndexMap;

use crate::domains::PathModel;
use crate::scenario::TimeHorizon;

pub use crate::domains::YearProjection;

/// Expected path of every option, keyed by option name in input order.
#[must_use]
pub fn project_options<'a, I>(models: I, horizon: TimeHorizon) -> IndexMap<String, Vec<YearProjection>>
where
    I: IntoIterator<Item = (&'a str, &'a PathModel)>,
{
    models
        .into_iter()
        .map(|(name, model)| (name.to_string(), model.project(horizon)))
        .collect()
}

/// Cumulative position at the end of a projection.
#[must_use]
pub fn final_position(rows: &[YearProjection]) -> Option<f64> {
    rows.last().map(|row| row.cumulative)
}

/// First year in which the cumulative position turns non-negative, if any.
#[must_use]
pub fn break_even_year(rows: &[YearProjection]) -> Option<u32> {
    rows.iter().find(|row| row.cumulative >= 0.0).map(|row| row.year)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{SamplingConfig, ValuationConfig};
    use crate::facts::StaticFactProvider;
    use crate::scenario::factors::resolve_option;
    use crate::scenario::{DecisionType, OptionSpec};

    fn job(name: &str, salary: f64) -> PathModel {
        let option = OptionSpec::new(name)
            .factor("salary", salary)
            .factor("raise_rate", 0.0)
            .factor("bonus_amount", 0.0)
            .factor("bonus_probability", 0.0)
            .factor("work_life_balance", 10.0);
        let set = resolve_option(
            DecisionType::Job,
            &option,
            &StaticFactProvider::default(),
            &SamplingConfig::default(),
        )
        .unwrap();
        PathModel::build(&set, &ValuationConfig::default()).unwrap()
    }

    #[test]
    fn test_projects_every_option_in_order() {
        let a = job("Corp", 90_000.0);
        let b = job("Startup", 70_000.0);
        let horizon = TimeHorizon::new(3).unwrap();
        let map = project_options([("Corp", &a), ("Startup", &b)], horizon);

        assert_eq!(map.keys().collect::<Vec<_>>(), ["Corp", "Startup"]);
        assert_eq!(map["Corp"].len(), 3);
        assert!((final_position(&map["Corp"]).unwrap() - 270_000.0).abs() < 1e-6);
        assert!((final_position(&map["Startup"]).unwrap() - 210_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_break_even_year() {
        let rows = [-5.0, -1.0, 2.0, 6.0]
            .iter()
            .zip(1..)
            .map(|(&cumulative, year)| YearProjection {
                year,
                inflow: 0.0,
                outflow: 0.0,
                net: 0.0,
                cumulative,
            })
            .collect::<Vec<_>>();
        assert_eq!(break_even_year(&rows), Some(3));
        assert_eq!(break_even_year(&rows[..2]), None);
        assert_eq!(final_position(&[]), None);
    }
}
