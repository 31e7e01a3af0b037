//! CLI output formatting.
//!
//! The JSON result goes to stdout; everything meant for a human goes to
//! stderr so the result can be piped.

use crate::comparison::Recommendation;
use crate::error::SimError;
use crate::report::ComparisonResult;

/// Print version information.
pub fn print_version() {
    println!("decisim {}", env!("CARGO_PKG_VERSION"));
}

/// Print help message.
pub fn print_help() {
    println!(
        r"decisim - Monte Carlo comparison of decision options

USAGE:
    decisim <COMMAND> [OPTIONS]

COMMANDS:
    run <scenario>              Simulate a scenario and print the JSON result
        --facts <file>          Fact table (YAML or JSON) for reference keys
        --config <file>         Engine configuration (YAML)
        --seed <N>              Override the scenario seed
        --runs <N>              Override the Monte Carlo run count
        -v, --verbose           Print a ranking summary to stderr

    validate <scenario>         Report every violation without simulating
        --facts <file>
        --config <file>

    verify <scenario>           Re-run and check results are bit-identical
        --runs <N>              Number of repetitions (default: 3)
        --facts <file>
        --config <file>

    help                        Show this help message
    version                     Show version information

ENVIRONMENT:
    DECISIM_LOG                 Log filter, e.g. decisim=debug (default: warn)

EXAMPLES:
    decisim run demos/investment.yaml --seed 7
    decisim validate demos/relocation.yaml --facts demos/facts.yaml
    decisim verify demos/job.yaml --runs 5
"
    );
}

/// Format an error, listing every violation on its own line.
#[must_use]
pub fn format_error(error: &SimError) -> String {
    let violations = error.violations();
    if violations.is_empty() {
        return format!("✗ {error}");
    }
    let mut out = format!("✗ {} violation(s):", violations.len());
    for v in violations {
        out.push_str("\n  - ");
        out.push_str(&v.to_string());
    }
    out
}

/// Print an error to stderr.
pub fn print_error(error: &SimError) {
    eprintln!("{}", format_error(error));
}

/// Print result warnings to stderr.
pub fn print_warnings(result: &ComparisonResult) {
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
}

/// Human-readable ranking table.
#[must_use]
pub fn format_summary(result: &ComparisonResult) -> String {
    let mut out = format!(
        "{} | {} years | {} runs | seed {} | {:?}\n",
        result.decision_type,
        result.time_horizon_years,
        result.monte_carlo_runs,
        result.seed,
        result.status
    );
    out.push_str(&format!(
        "{:<4} {:<20} {:>14} {:>14} {:>14} {:>9}\n",
        "rank", "option", "score", "mean", "std_dev", "p_adverse"
    ));
    for r in &result.rankings {
        out.push_str(&format!(
            "{:<4} {:<20} {:>14.2} {:>14.2} {:>14.2} {:>9.3}\n",
            r.rank,
            r.option,
            r.score,
            r.statistics.mean,
            r.statistics.std_dev,
            r.statistics.probability_adverse
        ));
    }
    match &result.recommendation {
        Recommendation::Winner { option, confidence } => out.push_str(&format!(
            "recommendation: {option} (confidence {:.1}%)",
            confidence * 100.0
        )),
        Recommendation::Tie { options } => out.push_str(&format!(
            "recommendation: statistical tie between {}",
            options.join(", ")
        )),
    }
    out
}

/// Print the ranking table to stderr.
pub fn print_summary(result: &ComparisonResult) {
    eprintln!("{}", format_summary(result));
}
