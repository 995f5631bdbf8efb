//! LicenseSweep CLI — runs the assessment pipeline from the terminal.

use clap::{Parser, Subcommand};
use licensesweep_core::AssessmentConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "licensesweep", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full assessment pipeline and write the CSV report plus snapshot.
    Run {
        /// Path to the assessment's `.properties` configuration file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the pipeline and report new/changed/removed files against a prior snapshot.
    Diff {
        /// Path to the assessment's `.properties` configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Prior snapshot JSON file to diff against.
        #[arg(long)]
        against: PathBuf,
    },
    /// Load and validate configuration only, without running the pipeline.
    Validate {
        /// Path to the assessment's `.properties` configuration file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<AssessmentConfig, ExitCode> {
    AssessmentConfig::load(path).map_err(|e| {
        eprintln!("configuration error: {e}");
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("licensesweep=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = match load_config(&config) {
                Ok(c) => c,
                Err(code) => return code,
            };
            match licensesweep_core::run(&config) {
                Ok(errors) => {
                    if !errors.is_empty() {
                        tracing::warn!(count = errors.len(), "assessment completed with non-fatal errors");
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("assessment failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Diff { config, against } => {
            let config = match load_config(&config) {
                Ok(c) => c,
                Err(code) => return code,
            };
            match licensesweep_core::pipeline::run_diff(&config, &against) {
                Ok(diff) => {
                    let output = serde_json::json!({
                        "new_or_changed": diff.new_or_changed.iter().map(|r| &r.file_path).collect::<Vec<_>>(),
                        "removed": diff.removed.iter().map(|r| &r.file_path).collect::<Vec<_>>(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("diff failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Validate { config } => match load_config(&config) {
            Ok(c) => {
                println!("configuration valid: source={}, dest={}", c.source_dir.display(), c.dest_dir.display());
                ExitCode::SUCCESS
            }
            Err(code) => code,
        },
    }
}
