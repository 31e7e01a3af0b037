//! Option comparison: scoring, ranking, tie detection and pairwise wins.
//!
//! Scores are in natural units of the chosen [`Criterion`]. Two options
//! whose scores differ by at most `tie_epsilon * max(|a|, |b|)` are a
//! statistical tie and share a rank.

use serde::{Deserialize, Serialize};

use crate::config::ComparisonConfig;
use crate::domains::OutcomeDistribution;
use crate::error::Violation;
use crate::scenario::Polarity;

/// Ranking criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// Mean outcome.
    ExpectedValue,
    /// Mean penalized by `k` standard deviations.
    RiskAdjusted {
        /// Risk aversion; the configured default when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        k: Option<f64>,
    },
    /// Probability of landing on the good side of a bar.
    ProbabilityOfThreshold {
        /// The bar; the scenario's adverse threshold when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
}

impl Default for Criterion {
    fn default() -> Self {
        Self::RiskAdjusted { k: None }
    }
}

impl Criterion {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ExpectedValue => "expected_value",
            Self::RiskAdjusted { .. } => "risk_adjusted",
            Self::ProbabilityOfThreshold { .. } => "probability_of_threshold",
        }
    }

    /// Parameter problems.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        match *self {
            Self::RiskAdjusted { k: Some(k) } if !k.is_finite() || k < 0.0 => {
                out.push(Violation::scenario(format!(
                    "risk_adjusted k must be finite and >= 0, got {k}"
                )));
            }
            Self::ProbabilityOfThreshold { threshold: Some(t) } if !t.is_finite() => {
                out.push(Violation::scenario(format!(
                    "probability_of_threshold threshold must be finite, got {t}"
                )));
            }
            _ => {}
        }
        out
    }
}

/// Scored option with its rank (1 = best; tied options share a rank).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// Option name.
    pub option: String,
    /// Criterion score.
    pub score: f64,
    /// Competition rank.
    pub rank: usize,
}

/// What the comparator recommends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// One option is best.
    Winner {
        /// Winning option.
        option: String,
        /// Probability that the winner beats the runner-up on a paired trial.
        confidence: f64,
    },
    /// Several options are statistically indistinguishable at the top.
    Tie {
        /// Options sharing rank 1, in ranking order.
        options: Vec<String>,
    },
}

impl Recommendation {
    /// Recommended option, if there is a single winner.
    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        match self {
            Self::Winner { option, .. } => Some(option),
            Self::Tie { .. } => None,
        }
    }

    /// True for a statistical tie.
    #[must_use]
    pub const fn is_tie(&self) -> bool {
        matches!(self, Self::Tie { .. })
    }
}

/// Pairwise win probabilities.
///
/// `probabilities[a][b]` is the share of paired trials where option `a`
/// beats option `b`; equal outcomes count one half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseMatrix {
    /// Option names, in declaration order.
    pub options: Vec<String>,
    /// Row beats column.
    pub probabilities: Vec<Vec<f64>>,
}

impl PairwiseMatrix {
    /// Probability that `a` beats `b`.
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.options.iter().position(|o| o == a)?;
        let j = self.options.iter().position(|o| o == b)?;
        Some(self.probabilities[i][j])
    }
}

/// Output of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Best first; stable on declaration order.
    pub standings: Vec<Standing>,
    /// Winner or tie.
    pub recommendation: Recommendation,
    /// Pairwise win probabilities.
    pub pairwise: PairwiseMatrix,
}

/// Comparator bound to one scenario.
#[derive(Debug, Clone)]
pub struct Comparator {
    criterion: Criterion,
    risk_aversion: f64,
    threshold: f64,
    tie_epsilon: f64,
    polarity: Polarity,
}

impl Comparator {
    /// Bind `criterion` to the configured defaults, the decision type's
    /// polarity and the scenario's adverse threshold.
    #[must_use]
    pub fn new(
        criterion: Criterion,
        config: &ComparisonConfig,
        polarity: Polarity,
        adverse_threshold: f64,
    ) -> Self {
        let risk_aversion = match criterion {
            Criterion::RiskAdjusted { k: Some(k) } => k,
            _ => config.risk_aversion,
        };
        let threshold = match criterion {
            Criterion::ProbabilityOfThreshold { threshold: Some(t) } => t,
            _ => adverse_threshold,
        };
        Self {
            criterion,
            risk_aversion,
            threshold,
            tie_epsilon: config.tie_epsilon,
            polarity,
        }
    }

    /// Criterion with every defaulted parameter filled in.
    #[must_use]
    pub const fn effective_criterion(&self) -> Criterion {
        match self.criterion {
            Criterion::ExpectedValue => Criterion::ExpectedValue,
            Criterion::RiskAdjusted { .. } => Criterion::RiskAdjusted {
                k: Some(self.risk_aversion),
            },
            Criterion::ProbabilityOfThreshold { .. } => Criterion::ProbabilityOfThreshold {
                threshold: Some(self.threshold),
            },
        }
    }

    /// Direction in which scores improve.
    #[must_use]
    pub const fn score_polarity(&self) -> Polarity {
        match self.criterion {
            Criterion::ProbabilityOfThreshold { .. } => Polarity::HigherIsBetter,
            _ => self.polarity,
        }
    }

    /// Criterion score of one distribution.
    #[must_use]
    pub fn score(&self, dist: &OutcomeDistribution) -> f64 {
        let stats = &dist.statistics;
        match self.criterion {
            Criterion::ExpectedValue => stats.mean,
            Criterion::RiskAdjusted { .. } => match self.polarity {
                Polarity::HigherIsBetter => stats.mean - self.risk_aversion * stats.std_dev,
                Polarity::LowerIsBetter => stats.mean + self.risk_aversion * stats.std_dev,
            },
            Criterion::ProbabilityOfThreshold { .. } => {
                let (hits, n) = dist.finite().fold((0usize, 0usize), |(hits, n), x| {
                    let good = match self.polarity {
                        Polarity::HigherIsBetter => x >= self.threshold,
                        Polarity::LowerIsBetter => x <= self.threshold,
                    };
                    (hits + usize::from(good), n + 1)
                });
                if n == 0 {
                    0.0
                } else {
                    hits as f64 / n as f64
                }
            }
        }
    }

    /// True if two scores are a statistical tie.
    #[must_use]
    pub fn is_tie(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.tie_epsilon * a.abs().max(b.abs())
    }

    /// Rank `distributions` and recommend.
    ///
    /// An empty slice yields an empty tie.
    #[must_use]
    pub fn compare(&self, distributions: &[OutcomeDistribution]) -> Comparison {
        let direction = self.score_polarity();
        let scores: Vec<f64> = distributions.iter().map(|d| self.score(d)).collect();

        let mut order: Vec<usize> = (0..distributions.len()).collect();
        order.sort_by(|&a, &b| match direction {
            Polarity::HigherIsBetter => scores[b].total_cmp(&scores[a]),
            Polarity::LowerIsBetter => scores[a].total_cmp(&scores[b]),
        });

        let standings: Vec<Standing> = order
            .iter()
            .map(|&i| {
                let better = scores
                    .iter()
                    .filter(|&&other| direction.beats(other, scores[i]) && !self.is_tie(other, scores[i]))
                    .count();
                Standing {
                    option: distributions[i].option.clone(),
                    score: scores[i],
                    rank: better + 1,
                }
            })
            .collect();

        let pairwise = pairwise_matrix(distributions, self.polarity);
        let leaders: Vec<String> = standings
            .iter()
            .filter(|s| s.rank == 1)
            .map(|s| s.option.clone())
            .collect();

        let recommendation = match (leaders.as_slice(), standings.get(1)) {
            ([winner], Some(runner_up)) => Recommendation::Winner {
                option: winner.clone(),
                confidence: pairwise.get(winner, &runner_up.option).unwrap_or(0.5),
            },
            ([winner], None) => Recommendation::Winner {
                option: winner.clone(),
                confidence: 1.0,
            },
            _ => Recommendation::Tie { options: leaders },
        };

        tracing::debug!(
            criterion = self.criterion.name(),
            options = distributions.len(),
            tie = recommendation.is_tie(),
            "ranked options"
        );

        Comparison {
            standings,
            recommendation,
            pairwise,
        }
    }
}

/// Pairwise win probabilities over trials paired by index.
///
/// Pairs where either outcome was discarded are skipped; a pair with no
/// usable trials is a coin flip.
#[must_use]
pub fn pairwise_matrix(distributions: &[OutcomeDistribution], polarity: Polarity) -> PairwiseMatrix {
    let n = distributions.len();
    let mut probabilities = vec![vec![0.5; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let p = win_probability(&distributions[i].outcomes, &distributions[j].outcomes, polarity);
            probabilities[i][j] = p;
            probabilities[j][i] = 1.0 - p;
        }
    }
    PairwiseMatrix {
        options: distributions.iter().map(|d| d.option.clone()).collect(),
        probabilities,
    }
}

fn win_probability(a: &[f64], b: &[f64], polarity: Polarity) -> f64 {
    let (score, pairs) = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .fold((0.0, 0usize), |(score, pairs), (&x, &y)| {
            let point = if polarity.beats(x, y) {
                1.0
            } else if polarity.beats(y, x) {
                0.0
            } else {
                0.5
            };
            (score + point, pairs + 1)
        });
    if pairs == 0 {
        0.5
    } else {
        score / pairs as f64
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domains::OutcomeStatistics;
    use proptest::prelude::*;

    proptest! {
        /// Win probabilities of a pair sum to one.
        #[test]
        fn prop_pairwise_complementary(
            a in prop::collection::vec(-100.0f64..100.0, 1..100),
            b in prop::collection::vec(-100.0f64..100.0, 1..100),
        ) {
            let make = |name: &str, xs: &[f64]| OutcomeDistribution {
                option: name.to_string(),
                outcomes: xs.to_vec(),
                statistics: OutcomeStatistics::from_outcomes(xs, 0.0, Polarity::HigherIsBetter),
            };
            let m = pairwise_matrix(&[make("a", &a), make("b", &b)], Polarity::HigherIsBetter);
            let sum = m.probabilities[0][1] + m.probabilities[1][0];
            prop_assert!((sum - 1.0).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&m.probabilities[0][1]));
        }
    }
}
