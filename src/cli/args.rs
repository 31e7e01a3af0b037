//! CLI argument parsing.
//!
//! Parsing takes any iterator of strings so it can be tested without a
//! process environment.

use std::path::PathBuf;

/// CLI arguments container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// The command to execute.
    pub command: Command,
}

/// Files a simulation reads besides the scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inputs {
    /// Scenario document (YAML or JSON).
    pub scenario_path: PathBuf,
    /// Fact table for reference keys.
    pub facts_path: Option<PathBuf>,
    /// Engine configuration.
    pub config_path: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Simulate a scenario and print the JSON result.
    Run {
        /// Input files.
        inputs: Inputs,
        /// Optional seed override.
        seed_override: Option<u64>,
        /// Optional run-count override.
        runs_override: Option<usize>,
        /// Enable verbose output.
        verbose: bool,
    },
    /// Report every violation without simulating.
    Validate {
        /// Input files.
        inputs: Inputs,
    },
    /// Re-run a scenario and check the results are bit-identical.
    Verify {
        /// Input files.
        inputs: Inputs,
        /// Number of repetitions.
        runs: usize,
    },
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Options shared by the scenario commands.
#[derive(Debug, Default)]
struct Flags {
    facts_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    runs: Option<usize>,
    verbose: bool,
}

impl Args {
    /// Parse command-line arguments from an iterator.
    #[must_use]
    pub fn parse_from<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::parse_from_vec(&args)
    }

    /// Parse command-line arguments from the environment.
    #[must_use]
    pub fn parse() -> Self {
        Self::parse_from(std::env::args())
    }

    /// True if the command asked for verbose output.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        matches!(self.command, Command::Run { verbose: true, .. })
    }

    fn parse_from_vec(args: &[String]) -> Self {
        if args.len() < 2 {
            return Self {
                command: Command::Help,
            };
        }

        let command = match args[1].as_str() {
            name @ ("run" | "validate" | "verify") => Self::parse_scenario_command(name, args),
            "-h" | "--help" | "help" => Command::Help,
            "-V" | "--version" | "version" => Command::Version,
            unknown => {
                eprintln!("Unknown command: {unknown}");
                Command::Help
            }
        };

        Self { command }
    }

    fn parse_scenario_command(name: &str, args: &[String]) -> Command {
        let Some(path) = args.get(2).filter(|a| !a.starts_with('-')) else {
            eprintln!("Error: '{name}' command requires a scenario path");
            return Command::Help;
        };
        let flags = parse_flags(&args[3..]);
        let inputs = Inputs {
            scenario_path: PathBuf::from(path),
            facts_path: flags.facts_path,
            config_path: flags.config_path,
        };

        match name {
            "run" => Command::Run {
                inputs,
                seed_override: flags.seed,
                runs_override: flags.runs,
                verbose: flags.verbose,
            },
            "verify" => Command::Verify {
                inputs,
                runs: flags.runs.unwrap_or(3).max(2),
            },
            _ => Command::Validate { inputs },
        }
    }
}

fn parse_flags(rest: &[String]) -> Flags {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < rest.len() {
        let value = rest.get(i + 1);
        match (rest[i].as_str(), value) {
            ("--facts", Some(v)) => {
                flags.facts_path = Some(PathBuf::from(v));
                i += 2;
            }
            ("--config", Some(v)) => {
                flags.config_path = Some(PathBuf::from(v));
                i += 2;
            }
            ("--seed", Some(v)) => {
                match v.parse() {
                    Ok(seed) => flags.seed = Some(seed),
                    Err(_) => eprintln!("Warning: ignoring invalid seed '{v}'"),
                }
                i += 2;
            }
            ("--runs", Some(v)) => {
                match v.parse() {
                    Ok(runs) => flags.runs = Some(runs),
                    Err(_) => eprintln!("Warning: ignoring invalid run count '{v}'"),
                }
                i += 2;
            }
            ("-v" | "--verbose", _) => {
                flags.verbose = true;
                i += 1;
            }
            (other, _) => {
                eprintln!("Warning: ignoring argument '{other}'");
                i += 1;
            }
        }
    }
    flags
}
