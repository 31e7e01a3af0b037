//! CLI module for decisim.
//!
//! All CLI logic lives here so it can be tested; `main.rs` only parses the
//! arguments, installs logging and calls [`run_cli`].

mod args;
mod commands;
mod output;

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use args::{Args, Command, Inputs};
pub use commands::{
    load_inputs, run_cli, run_scenario, validate_scenario, verify_scenario, VerifyReport,
};
pub use output::{format_error, format_summary, print_help, print_version};

static INIT: Once = Once::new();

/// Install the stderr log subscriber.
///
/// Reads the filter from `DECISIM_LOG`; falls back to `decisim=debug` when
/// `verbose`, `warn` otherwise. Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose { "decisim=debug" } else { "warn" };
        let filter =
            EnvFilter::try_from_env("DECISIM_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .try_init();
    });
}
