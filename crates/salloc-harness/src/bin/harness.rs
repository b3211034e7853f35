//! CLI entrypoint for the salloc harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use salloc_harness::ScenarioParams;
use salloc_harness::structured_log::LogEmitter;

/// Fault-injection tooling for salloc.
#[derive(Debug, Parser)]
#[command(name = "salloc-harness")]
#[command(about = "Scenario runner and audit-trail checker for salloc")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run allocate/release cycles under a failure policy.
    Scenario {
        /// Identifier armed for failure (negative disarms).
        #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
        fail_id: i64,
        /// Successful armed calls before failures begin.
        #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
        budget: i64,
        /// Number of cycles.
        #[arg(long, default_value_t = 3)]
        calls: u32,
        /// Identifier passed on each call (defaults to --fail-id).
        #[arg(long, allow_negative_numbers = true)]
        id: Option<i64>,
        /// Bytes requested per call.
        #[arg(long, default_value_t = 64)]
        size: usize,
        /// Append audit records to this file.
        #[arg(long)]
        audit: Option<PathBuf>,
        /// Terminate when an audit record cannot be written.
        #[arg(long)]
        fatal: bool,
        /// JSONL log path (if omitted, prints to stdout).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Replay an audit trail and report leaks and unknown frees.
    AuditCheck {
        /// Audit file to check.
        #[arg(long)]
        audit: PathBuf,
        /// Output path for the JSON report (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scenario {
            fail_id,
            budget,
            calls,
            id,
            size,
            audit,
            fatal,
            log,
        } => {
            let params = ScenarioParams {
                fail_id,
                budget,
                calls,
                id,
                size,
                audit,
                fatal,
            };
            let run_id = format!("scenario-{}", std::process::id());
            let mut emitter = match log {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    LogEmitter::to_file(&path, &run_id)?
                }
                None => LogEmitter::to_stdout(&run_id),
            };
            let (summary, _) = salloc_harness::run_scenario(&params, &mut emitter)?;
            eprintln!(
                "scenario: {} call(s), {} succeeded, {} failed",
                summary.calls, summary.succeeded, summary.failed
            );
        }
        Command::AuditCheck { audit, output } => {
            let report = salloc_harness::check_file(&audit)?;
            let body = serde_json::to_string_pretty(&report)?;

            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, body)?;
            } else {
                println!("{body}");
            }

            if !report.ok {
                return Err(format!(
                    "audit check failed: {} leak(s), {} unknown free(s)",
                    report.leaks.len(),
                    report.unknown_frees.len()
                )
                .into());
            }
        }
    }

    Ok(())
}
