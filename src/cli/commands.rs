//! CLI command handlers.
//!
//! Each handler has a fallible core returning [`SimResult`] and a thin
//! wrapper that prints and maps the outcome to an exit code.

use std::process::ExitCode;

use crate::config::EngineConfig;
use crate::engine::DecisionEngine;
use crate::error::{SimError, SimResult};
use crate::facts::StaticFactProvider;
use crate::report::ComparisonResult;
use crate::scenario::Scenario;

use super::args::Inputs;
use super::output::{print_error, print_help, print_summary, print_version, print_warnings};
use super::{Args, Command};

/// Outcome of a reproducibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Repetitions performed.
    pub runs: usize,
    /// True if every repetition produced the same JSON document.
    pub identical: bool,
}

/// Main CLI entry point.
#[must_use]
pub fn run_cli(args: Args) -> ExitCode {
    match args.command {
        Command::Run {
            inputs,
            seed_override,
            runs_override,
            verbose,
        } => match run_scenario(&inputs, seed_override, runs_override) {
            Ok(result) => match result.to_json() {
                Ok(json) => {
                    println!("{json}");
                    print_warnings(&result);
                    if verbose {
                        print_summary(&result);
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => fail(&e),
            },
            Err(e) => fail(&e),
        },
        Command::Validate { inputs } => match validate_scenario(&inputs) {
            Ok(()) => {
                println!("✓ {} is valid", inputs.scenario_path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Command::Verify { inputs, runs } => match verify_scenario(&inputs, runs) {
            Ok(report) if report.identical => {
                println!("✓ {} runs produced identical results", report.runs);
                ExitCode::SUCCESS
            }
            Ok(report) => {
                println!("✗ results differed across {} runs", report.runs);
                ExitCode::from(1)
            }
            Err(e) => fail(&e),
        },
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        Command::Version => {
            print_version();
            ExitCode::SUCCESS
        }
    }
}

fn fail(error: &SimError) -> ExitCode {
    print_error(error);
    if error.is_input_error() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

/// Load the scenario, facts and engine for `inputs`.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, or the configuration
/// is invalid.
pub fn load_inputs(inputs: &Inputs) -> SimResult<(Scenario, StaticFactProvider, DecisionEngine)> {
    let scenario = Scenario::load(&inputs.scenario_path)?;
    let facts = match &inputs.facts_path {
        Some(path) => StaticFactProvider::load(path)?,
        None => StaticFactProvider::default(),
    };
    let config = match &inputs.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok((scenario, facts, DecisionEngine::new(config)?))
}

/// Simulate a scenario file.
///
/// # Errors
///
/// Returns any loading or engine error.
pub fn run_scenario(
    inputs: &Inputs,
    seed_override: Option<u64>,
    runs_override: Option<usize>,
) -> SimResult<ComparisonResult> {
    let (mut scenario, facts, engine) = load_inputs(inputs)?;
    if seed_override.is_some() {
        scenario.seed = seed_override;
    }
    if runs_override.is_some() {
        scenario.monte_carlo_runs = runs_override;
    }
    engine.simulate(&scenario, &facts)
}

/// Validate a scenario file, facts included.
///
/// # Errors
///
/// Returns the validation error listing every violation.
pub fn validate_scenario(inputs: &Inputs) -> SimResult<()> {
    let (scenario, facts, engine) = load_inputs(inputs)?;
    engine.validate(&scenario, &facts)
}

/// Run a scenario `runs` times and compare the serialized results.
///
/// # Errors
///
/// Returns any loading or engine error.
pub fn verify_scenario(inputs: &Inputs, runs: usize) -> SimResult<VerifyReport> {
    let (scenario, facts, engine) = load_inputs(inputs)?;
    let reference = engine.simulate(&scenario, &facts)?.to_json()?;
    let mut identical = true;
    for _ in 1..runs {
        let again = engine.simulate(&scenario, &facts)?.to_json()?;
        identical &= again == reference;
    }
    Ok(VerifyReport { runs, identical })
}
