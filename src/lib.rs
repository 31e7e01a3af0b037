//! # decisim
//!
//! Monte Carlo engine for comparing discrete life and financial decisions
//! (relocation, purchase, job offer, investment) under uncertainty.
//!
//! A structured [`scenario::Scenario`] names competing options and their
//! uncertain factors. The engine validates it, resolves referenced facts,
//! simulates every option many times over the time horizon, and returns a
//! [`report::ComparisonResult`] with outcome statistics, a ranking, pairwise
//! win probabilities and a recommendation.
//!
//! - Reproducible: seed `s`, trial `i` always draws from the same sub-stream
//! - Paired: trial `i` of every option shares its random numbers
//! - Cancellable between batches, with partial results labelled as such
//!
//! ## Example
//!
//! ```rust
//! use decisim::prelude::*;
//!
//! let config = EngineConfig::builder()
//!     .seed(42)
//!     .default_runs(500)
//!     .build();
//! let engine = DecisionEngine::new(config)?;
//! # Ok::<(), decisim::SimError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops,
    clippy::imprecise_flops,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,
    clippy::needless_range_loop,
    clippy::manual_midpoint,
)]

pub mod cli;
pub mod comparison;
pub mod config;
pub mod domains;
pub mod engine;
pub mod error;
pub mod facts;
pub mod projection;
pub mod report;
pub mod scenario;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::comparison::{Criterion, Recommendation};
    pub use crate::config::{EngineConfig, EngineConfigBuilder};
    pub use crate::domains::{BatchProgress, OutcomeStatistics};
    pub use crate::engine::{CancellationToken, DecisionEngine};
    pub use crate::error::{SimError, SimResult, Violation, ViolationKind};
    pub use crate::facts::{FactProvider, StaticFactProvider};
    pub use crate::report::{ComparisonResult, RunStatus, Warning};
    pub use crate::scenario::{
        DecisionType, Distribution, OptionSpec, RandomVariable, Scenario, VariableSpec,
    };
}

/// Re-export for public API
pub use error::{SimError, SimResult};
