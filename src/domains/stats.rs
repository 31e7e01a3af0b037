//! Outcome distribution statistics.
//!
//! # Convergence
//!
//! The standard error of the mean shrinks as O(n^{-1/2}); it is reported so
//! callers can judge whether more runs are warranted. The engine never
//! extends a run on its own.

use serde::{Deserialize, Serialize};

use crate::scenario::Polarity;

/// z-value of a two-sided 95% normal confidence interval.
const Z_95: f64 = 1.96;

/// Summary statistics of one option's outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStatistics {
    /// Trials contributing to the statistics.
    pub count: usize,
    /// Non-finite trials dropped before summarizing.
    pub discarded: usize,
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    /// 50th percentile.
    pub median: f64,
    /// 5th percentile.
    pub p5: f64,
    /// 25th percentile.
    pub p25: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 95th percentile.
    pub p95: f64,
    /// Smallest outcome.
    pub min: f64,
    /// Largest outcome.
    pub max: f64,
    /// Standard error of the mean, `std_dev / sqrt(count)`.
    pub standard_error: f64,
    /// 95% confidence interval of the mean.
    pub confidence_interval: (f64, f64),
    /// Share of trials on the wrong side of the adverse threshold.
    pub probability_adverse: f64,
    /// True when computed over the batches completed before cancellation.
    pub partial: bool,
}

impl OutcomeStatistics {
    /// Summarize finite outcomes.
    ///
    /// An empty slice yields all-zero statistics.
    #[must_use]
    pub fn from_outcomes(outcomes: &[f64], threshold: f64, polarity: Polarity) -> Self {
        let count = outcomes.len();
        if count == 0 {
            return Self::empty();
        }

        let n = count as f64;
        let mean = sample_mean(outcomes, n);
        let std_dev = if count > 1 {
            sample_std_dev(outcomes, mean, n)
        } else {
            0.0
        };
        let standard_error = std_dev / n.sqrt();

        let mut sorted = outcomes.to_vec();
        sorted.sort_by(f64::total_cmp);

        let adverse = outcomes
            .iter()
            .filter(|&&x| polarity.is_adverse(x, threshold))
            .count();

        Self {
            count,
            discarded: 0,
            mean,
            std_dev,
            median: percentile(&sorted, 0.50),
            p5: percentile(&sorted, 0.05),
            p25: percentile(&sorted, 0.25),
            p75: percentile(&sorted, 0.75),
            p95: percentile(&sorted, 0.95),
            min: sorted[0],
            max: sorted[count - 1],
            standard_error,
            confidence_interval: (mean - Z_95 * standard_error, mean + Z_95 * standard_error),
            probability_adverse: adverse as f64 / n,
            partial: false,
        }
    }

    fn empty() -> Self {
        Self {
            count: 0,
            discarded: 0,
            mean: 0.0,
            std_dev: 0.0,
            median: 0.0,
            p5: 0.0,
            p25: 0.0,
            p75: 0.0,
            p95: 0.0,
            min: 0.0,
            max: 0.0,
            standard_error: 0.0,
            confidence_interval: (0.0, 0.0),
            probability_adverse: 0.0,
            partial: false,
        }
    }

    /// Standard error relative to the magnitude of the mean.
    ///
    /// A zero mean with zero error is fully converged; a zero mean with
    /// nonzero error falls back to the absolute error.
    #[must_use]
    pub fn relative_error(&self) -> f64 {
        if self.mean.abs() < f64::EPSILON {
            self.standard_error
        } else {
            self.standard_error / self.mean.abs()
        }
    }

    /// True if the relative error is within `tolerance`.
    #[must_use]
    pub fn is_converged(&self, tolerance: f64) -> bool {
        self.relative_error() <= tolerance
    }
}

/// Mean of finite outcomes; rescales when the plain sum overflows.
fn sample_mean(outcomes: &[f64], n: f64) -> f64 {
    let total = outcomes.iter().sum::<f64>();
    if total.is_finite() {
        total / n
    } else {
        outcomes.iter().map(|x| x / n).sum()
    }
}

/// Sample standard deviation; rescales by the largest deviation when the
/// sum of squares overflows.
fn sample_std_dev(outcomes: &[f64], mean: f64, n: f64) -> f64 {
    let sum_sq = outcomes.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    if sum_sq.is_finite() {
        return (sum_sq / (n - 1.0)).sqrt();
    }
    let scale = outcomes.iter().map(|x| (x - mean).abs()).fold(0.0, f64::max);
    let scaled = outcomes.iter().map(|x| ((x - mean) / scale).powi(2)).sum::<f64>();
    scale * (scaled / (n - 1.0)).sqrt()
}

/// Percentile `p` in `[0, 1]` of an ascending slice, interpolating linearly
/// between order statistics. NaN for an empty slice.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let p = p.clamp(0.0, 1.0);
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = idx - lo as f64;
    (sorted[lo] + (sorted[hi] - sorted[lo]) * w).min(sorted[hi])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates_between_points() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert!((percentile(&sorted, 0.0) - 10.0).abs() < 1e-12);
        assert!((percentile(&sorted, 1.0) - 40.0).abs() < 1e-12);
        assert!((percentile(&sorted, 0.5) - 25.0).abs() < 1e-12);
        assert!((percentile(&sorted, 0.25) - 17.5).abs() < 1e-12);
        assert!(percentile(&[], 0.5).is_nan());
        assert!((percentile(&[7.0], 0.9) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_basic_moments() {
        let stats = OutcomeStatistics::from_outcomes(
            &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0],
            0.0,
            Polarity::HigherIsBetter,
        );
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!((stats.min - 2.0).abs() < 1e-12);
        assert!((stats.max - 9.0).abs() < 1e-12);
        assert!((stats.standard_error - stats.std_dev / 8.0_f64.sqrt()).abs() < 1e-12);
        let (lo, hi) = stats.confidence_interval;
        assert!(lo < stats.mean && stats.mean < hi);
        assert!(stats.probability_adverse.abs() < f64::EPSILON);
    }

    #[test]
    fn test_probability_adverse_respects_polarity() {
        let outcomes = [-2.0, -1.0, 1.0, 2.0, 3.0];
        let higher = OutcomeStatistics::from_outcomes(&outcomes, 0.0, Polarity::HigherIsBetter);
        let lower = OutcomeStatistics::from_outcomes(&outcomes, 0.0, Polarity::LowerIsBetter);
        assert!((higher.probability_adverse - 0.4).abs() < 1e-12);
        assert!((lower.probability_adverse - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_constant_outcomes_have_zero_spread() {
        let stats = OutcomeStatistics::from_outcomes(&[3.0; 200], 0.0, Polarity::HigherIsBetter);
        assert!(stats.std_dev.abs() < f64::EPSILON);
        assert!(stats.is_converged(0.0));
        assert!((stats.p5 - 3.0).abs() < f64::EPSILON && (stats.p95 - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outcomes_near_f64_max_keep_finite_moments() {
        let outcomes = [1.5e308, 1.0e308, 0.5e308, 1.2e308];
        let stats = OutcomeStatistics::from_outcomes(&outcomes, 0.0, Polarity::HigherIsBetter);
        assert!((stats.mean / 1.05e308 - 1.0).abs() < 1e-12, "{}", stats.mean);
        assert!(stats.std_dev.is_finite() && stats.std_dev > 0.0);
        let (lo, hi) = stats.confidence_interval;
        assert!(lo.is_finite() && hi.is_finite());
    }

    #[test]
    fn test_empty_is_zeroed() {
        let stats = OutcomeStatistics::from_outcomes(&[], 0.0, Polarity::HigherIsBetter);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.abs() < f64::EPSILON);
    }

    #[test]
    fn test_relative_error() {
        let mut stats = OutcomeStatistics::from_outcomes(&[1.0, 3.0], 0.0, Polarity::HigherIsBetter);
        stats.standard_error = 0.2;
        assert!((stats.relative_error() - 0.1).abs() < 1e-12);
        assert!(!stats.is_converged(0.05));
        assert!(stats.is_converged(0.1));
    }
}
