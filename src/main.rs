//! decisim CLI - Monte Carlo decision comparison
//!
//! Command-line interface for simulating decision scenarios.

use std::process::ExitCode;

use decisim::cli::{init_tracing, run_cli, Args};

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose());
    run_cli(args)
}
