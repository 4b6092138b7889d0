//! CLI entrypoint for the stb_truetype bridge harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stbtt_bridge_harness::HarnessError;
use stbtt_bridge_harness::contract::{probe_assert, run_contract};
use stbtt_bridge_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file,
};
use stbtt_bridge_membrane::SafetyLevel;

/// Contract tooling for the stb_truetype bridge.
#[derive(Debug, Parser)]
#[command(name = "stbtt-bridge-harness")]
#[command(about = "Contract harness for the stb_truetype allocator/utility bridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every contract check in-process and print a JSON report.
    Contract {
        /// Runtime mode to check (strict, hardened, or off).
        #[arg(long, default_value = "strict")]
        mode: String,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index output path (requires --log).
        #[arg(long, requires = "log")]
        artifact_index: Option<PathBuf>,
        /// Report output path (if omitted, prints to stdout).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Run identifier embedded in trace ids.
        #[arg(long, default_value = "contract")]
        run_id: String,
    },
    /// Call stb_zig_assert once with the given value, then exit 0 if it returned.
    AssertProbe {
        #[arg(long, allow_hyphen_values = true)]
        value: i32,
    },
    /// Validate a structured JSONL log file.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Contract {
            mode,
            log,
            artifact_index,
            report,
            run_id,
        } => {
            let mode = SafetyLevel::from_str_loose(&mode);
            let result = run_contract(mode);

            if let Some(log_path) = &log {
                let mut emitter = LogEmitter::to_file(log_path, &run_id)?;
                emitter.emit_entry(
                    LogEntry::new("", LogLevel::Info, "contract_start").with_mode(mode.as_str()),
                )?;
                for check in &result.results {
                    let level = match check.outcome {
                        Outcome::Fail | Outcome::Error => LogLevel::Error,
                        Outcome::Pass | Outcome::Skip => LogLevel::Info,
                    };
                    let mut entry = LogEntry::new("", level, "contract_check")
                        .with_mode(mode.as_str())
                        .with_symbol(&check.symbol)
                        .with_property(&check.id)
                        .with_outcome(check.outcome)
                        .with_duration_us(check.duration_us);
                    if let Some(message) = &check.message {
                        entry = entry.with_details(serde_json::json!({ "message": message }));
                    }
                    emitter.emit_entry(entry)?;
                }
                for event in &result.events {
                    let mut entry = LogEntry::new("", LogLevel::Warn, "bridge_event")
                        .with_mode(mode.as_str())
                        .with_symbol(&event.symbol)
                        .with_details(serde_json::to_value(event)?);
                    if let Some(action) = &event.healing_action {
                        entry = entry.with_healing_action(action);
                    }
                    emitter.emit_entry(entry)?;
                }
                let (outcome, exit_code) = if result.passed() {
                    (Outcome::Pass, 0)
                } else {
                    (Outcome::Fail, 1)
                };
                let artifacts: Vec<String> = [&report, &artifact_index]
                    .into_iter()
                    .flatten()
                    .map(|path| path.display().to_string())
                    .collect();
                let mut end = LogEntry::new("", LogLevel::Info, "contract_end")
                    .with_mode(mode.as_str())
                    .with_outcome(outcome)
                    .with_exit_code(exit_code)
                    .with_details(serde_json::to_value(result.stats)?);
                if !artifacts.is_empty() {
                    end = end.with_artifacts(artifacts);
                }
                emitter.emit_entry(end)?;
                emitter.flush()?;
                eprintln!("Wrote structured log to {}", log_path.display());

                if let Some(index_path) = &artifact_index {
                    let mut index = ArtifactIndex::new(&run_id);
                    index.add_file(log_path, "log")?;
                    std::fs::write(index_path, index.to_json()?)?;
                    eprintln!("Wrote artifact index to {}", index_path.display());
                }
            }

            let json = serde_json::to_string_pretty(&result)?;
            match &report {
                Some(path) => std::fs::write(path, &json)?,
                None => println!("{json}"),
            }

            if !result.passed() {
                return Err(HarnessError::ContractFailed {
                    failures: result.failures(),
                }
                .into());
            }
        }
        Command::AssertProbe { value } => {
            probe_assert(value);
            println!("assert({value}) returned");
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(HarnessError::InvalidLog {
                    path: log.display().to_string(),
                    errors: errors.len(),
                }
                .into());
            }
            println!("{lines} valid line(s)");
        }
    }

    Ok(())
}
