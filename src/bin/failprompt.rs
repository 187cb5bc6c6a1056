//! failprompt CLI binary entry point.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use failprompt::{run_analysis, AnalysisOutcome, Config};

/// Analyze failing Python unit tests and assemble a minimal-context prompt.
#[derive(Parser)]
#[command(name = "failprompt")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root directory of the project (default: current directory)
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Directory containing tests, relative to the project root
    #[arg(long, default_value = "tests")]
    test_dir: String,

    /// Number of test failures to include (0 for all)
    #[arg(long, default_value_t = 1)]
    number_of_issues: usize,

    /// Output file path
    #[arg(long, default_value = "prompt.txt")]
    output_file: PathBuf,

    /// Keep every top-level import instead of filtering to the used ones
    #[arg(long)]
    all_imports: bool,

    /// Write a JSON report instead of the prompt text
    #[arg(long)]
    json: bool,

    /// Kill the test run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let config = Config {
        project_root: cli.project_root,
        test_dir: cli.test_dir,
        number_of_issues: cli.number_of_issues,
        output_file: cli.output_file,
        all_imports: cli.all_imports,
        json: cli.json,
        timeout_secs: cli.timeout_secs,
    };

    let config = match config.validate() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(err.exit_code());
        }
    };

    match run_analysis(&config) {
        Ok(AnalysisOutcome::AllPassed) => {
            info!("all tests passed; no prompt written");
            ExitCode::SUCCESS
        }
        Ok(AnalysisOutcome::NoFailuresParsed) => {
            info!("no parseable failures; no prompt written");
            ExitCode::SUCCESS
        }
        Ok(AnalysisOutcome::Written { failures }) => {
            info!(failures, "analysis complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
