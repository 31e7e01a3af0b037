//! Deterministic random number generation.
//!
//! Implements PCG (Permuted Congruential Generator) with per-trial streams
//! for reproducible parallel execution.
//!
//! # Reproducibility Guarantee
//!
//! Given the same master seed, the stream for trial `i` is bitwise-identical
//! across:
//! - Different runs
//! - Different platforms
//! - Different worker counts and execution orders

use rand::prelude::*;
use rand_pcg::Pcg64;

/// Golden-ratio increment used to spread stream indices across seed space.
const STREAM_INCREMENT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Deterministic, reproducible random number generator.
///
/// Each Monte Carlo trial owns one `SimRng` derived from `(master_seed, trial)`,
/// so trials never share mutable generator state.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: Pcg64,
}

impl SimRng {
    /// Create a new RNG with the given master seed (stream 0).
    #[must_use]
    pub fn new(master_seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(master_seed),
        }
    }

    /// Create the generator for one trial.
    ///
    /// The sub-seed depends only on `(master_seed, trial)`, so any worker can
    /// build any trial's generator without coordination.
    ///
    /// # Example
    ///
    /// ```rust
    /// use decisim::engine::rng::SimRng;
    ///
    /// let mut a = SimRng::for_trial(42, 7);
    /// let mut b = SimRng::for_trial(42, 7);
    /// assert_eq!(a.gen_f64(), b.gen_f64());
    /// ```
    #[must_use]
    pub fn for_trial(master_seed: u64, trial: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(derive_seed(master_seed, trial)),
        }
    }

    /// Generate a random f64 in [0, 1).
    pub fn gen_f64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Generate a random f64 in `[min, max]`; returns `min` when the range is empty.
    pub fn gen_range_f64(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        interpolate(min, max, self.gen_f64())
    }

    /// Bernoulli draw: `true` with probability `p` (clamped to [0, 1]).
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.gen_f64() < p.clamp(0.0, 1.0)
    }

    /// Generate a standard normal sample using Box-Muller transform.
    pub fn gen_standard_normal(&mut self) -> f64 {
        let u1 = self.gen_f64();
        let u2 = self.gen_f64();

        // Avoid log(0)
        let u1 = if u1 < f64::EPSILON { f64::EPSILON } else { u1 };

        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Generate a normal sample with given mean and std.
    pub fn gen_normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.gen_standard_normal()
    }
}

/// Point at fraction `t` of the way from `min` to `max`, never outside
/// `[min, max]`.
///
/// Falls back to the weighted form when `max - min` overflows, which happens
/// for finite bounds of opposite sign near `f64::MAX`.
#[must_use]
pub fn interpolate(min: f64, max: f64, t: f64) -> f64 {
    let width = max - min;
    let x = if width.is_finite() {
        min + width * t
    } else {
        min.mul_add(1.0 - t, max * t)
    };
    x.clamp(min, max)
}

/// Derive the sub-seed for stream `stream` of `master_seed`.
///
/// SplitMix64 finalizer over the golden-ratio-spaced stream offset.
#[must_use]
pub const fn derive_seed(master_seed: u64, stream: u64) -> u64 {
    let mut z = master_seed.wrapping_add(stream.wrapping_mul(STREAM_INCREMENT));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification test: reproducibility holds for any seed and trial.
        #[test]
        fn prop_trial_reproducibility(seed in 0u64..u64::MAX, trial in 0u64..1_000_000) {
            let mut rng1 = SimRng::for_trial(seed, trial);
            let mut rng2 = SimRng::for_trial(seed, trial);

            let seq1: Vec<f64> = (0..50).map(|_| rng1.gen_f64()).collect();
            let seq2: Vec<f64> = (0..50).map(|_| rng2.gen_f64()).collect();

            prop_assert_eq!(seq1, seq2);
        }

        /// Falsification test: values in [0, 1) for any seed.
        #[test]
        fn prop_unit_interval(seed in 0u64..u64::MAX) {
            let mut rng = SimRng::new(seed);

            for _ in 0..100 {
                let v = rng.gen_f64();
                prop_assert!((0.0..1.0).contains(&v), "Value {} not in [0, 1)", v);
            }
        }
    }
}
