use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covgate::cli::{self, Acceptable, MeasureOptions, Outcome, Style};
use covgate::fuzzy::PathReconciler;
use covgate::parsers::Format;
use covgate::ratio::RatioConfig;
use covgate::threshold;

/// covgate: measure code coverage, compare it with a baseline and decide
/// whether the result is acceptable.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Rules {
    /// Acceptability expression, e.g. "current.coverage >= 80% && diff.coverage >= 0".
    /// May be repeated; all must hold.
    #[arg(long = "acceptable", value_name = "EXPR")]
    expressions: Vec<String>,

    /// Coverage rule, e.g. "80%" or "diff >= -1".
    #[arg(long, value_name = "EXPR")]
    acceptable_coverage: Option<String>,

    /// Code to test ratio rule, e.g. "1:1.2".
    #[arg(long, value_name = "EXPR")]
    acceptable_ratio: Option<String>,

    /// Test execution time rule, e.g. "5min".
    #[arg(long, value_name = "EXPR")]
    acceptable_time: Option<String>,
}

impl From<Rules> for Acceptable {
    fn from(rules: Rules) -> Self {
        Acceptable {
            expressions: rules.expressions,
            coverage: rules.acceptable_coverage,
            ratio: rules.acceptable_ratio,
            time: rules.acceptable_time,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Measure a run, optionally compare it with a baseline and check it.
    Measure {
        /// Coverage report, or a project root to search for one at the
        /// usual locations.
        #[arg(long)]
        coverage: Option<PathBuf>,

        /// Override format detection (lcov, gocover, simplecov, cobertura, clover, jacoco).
        #[arg(long)]
        format: Option<Format>,

        /// Project root for the code to test ratio and for resolving
        /// relative paths.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Glob of production code, relative to the root. Prefix with '!'
        /// to exclude. Enables the code to test ratio.
        #[arg(long = "code", value_name = "GLOB")]
        code: Vec<String>,

        /// Glob of test code, relative to the root.
        #[arg(long = "test", value_name = "GLOB")]
        test: Vec<String>,

        /// Test execution time, e.g. "1m30s".
        #[arg(long, value_parser = parse_duration)]
        test_execution_time: Option<std::time::Duration>,

        /// Saved report to compare against.
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Save the measured report as JSON.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Save only totals, without line and block detail.
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        rules: Rules,

        #[arg(long, value_enum, default_value = "text")]
        style: Style,
    },

    /// List per-file coverage of a coverage report.
    Files {
        /// Coverage report, or a project root.
        input: PathBuf,

        #[arg(long)]
        format: Option<Format>,

        /// Sort by coverage rate ascending (show worst files first).
        #[arg(long)]
        sort_by_coverage: bool,
    },

    /// Show line-level coverage for a source file.
    Lines {
        /// Coverage report, or a project root.
        input: PathBuf,

        /// The source file path; need not match the report's spelling.
        source_file: String,

        #[arg(long)]
        format: Option<Format>,

        /// Project root that relative paths are resolved against.
        #[arg(long)]
        root: Option<String>,

        /// Show only uncovered lines.
        #[arg(long)]
        uncovered: bool,
    },

    /// Compare two saved reports.
    Diff {
        current: PathBuf,
        baseline: PathBuf,

        #[arg(long)]
        root: Option<String>,

        #[arg(long, value_enum, default_value = "text")]
        style: Style,
    },

    /// Check a saved report against acceptability rules.
    Check {
        report: PathBuf,

        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Project root that relative paths are resolved against.
        #[arg(long)]
        root: Option<String>,

        #[command(flatten)]
        rules: Rules,

        #[arg(long, value_enum, default_value = "text")]
        style: Style,
    },
}

fn parse_duration(src: &str) -> std::result::Result<std::time::Duration, String> {
    threshold::parse_duration(src).map_err(|e| e.to_string())
}

fn reconciler(root: Option<String>) -> PathReconciler {
    root.map_or_else(PathReconciler::new, PathReconciler::with_root)
}

fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_env("COVGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Measure {
            coverage,
            format,
            root,
            code,
            test,
            test_execution_time,
            baseline,
            out,
            compact,
            rules,
            style,
        } => {
            let ratio = (!code.is_empty()).then_some(RatioConfig { code, test });
            let reconciler = PathReconciler::with_root(root.to_string_lossy());
            cli::cmd_measure(&MeasureOptions {
                coverage,
                format,
                root,
                ratio,
                test_execution_time,
                reconciler,
                baseline,
                acceptable: rules.into(),
                out,
                compact,
                style,
            })?
        }
        Commands::Files {
            input,
            format,
            sort_by_coverage,
        } => passed(cli::cmd_files(&input, format, sort_by_coverage)?),
        Commands::Lines {
            input,
            source_file,
            format,
            root,
            uncovered,
        } => passed(cli::cmd_lines(
            &input,
            format,
            &source_file,
            &reconciler(root),
            uncovered,
        )?),
        Commands::Diff {
            current,
            baseline,
            root,
            style,
        } => passed(cli::cmd_diff(&current, &baseline, &reconciler(root), style)?),
        Commands::Check {
            report,
            baseline,
            root,
            rules,
            style,
        } => cli::cmd_check(
            &report,
            baseline.as_deref(),
            &reconciler(root),
            &rules.into(),
            style,
        )?,
    };

    print!("{}", outcome.output);
    std::io::Write::flush(&mut std::io::stdout()).context("Failed to write output")?;
    Ok(if outcome.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn passed(output: String) -> Outcome {
    Outcome {
        output,
        passed: true,
    }
}
