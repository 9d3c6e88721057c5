//! CLI entrypoint for the value-profiling stress harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use valprof_harness::structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel, RunOutcome};
use valprof_harness::{HarnessError, StressConfig, memop_bucket_table, run_stress};

/// Stress and inspection tooling for the value-profiling store.
#[derive(Debug, Parser)]
#[command(name = "valprof-harness")]
#[command(about = "Stress and inspection harness for the value-profiling store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hammer a private store from many threads and audit its invariants.
    Stress {
        #[arg(long, default_value_t = 4)]
        threads: usize,
        /// Value sites in the head table.
        #[arg(long, default_value_t = 16)]
        sites: usize,
        /// Distinct values drawn per site.
        #[arg(long, default_value_t = 64)]
        values: u64,
        /// Observations per thread.
        #[arg(long, default_value_t = 100_000)]
        iterations: u64,
        /// Arena capacity in records.
        #[arg(long, default_value_t = 1024)]
        nodes: usize,
        #[arg(long, default_value_t = 16)]
        max_per_site: usize,
        #[arg(long, default_value_t = 0x5EED)]
        seed: u64,
        /// Structured JSONL log path. An artifact index is written next to it.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Print the memop size buckets for sizes `0..=max` as JSON.
    Buckets {
        #[arg(long, default_value_t = 1024)]
        max: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Stress {
            threads,
            sites,
            values,
            iterations,
            nodes,
            max_per_site,
            seed,
            log,
        } => {
            let config = StressConfig {
                threads,
                sites,
                values,
                iterations,
                nodes,
                max_per_site,
                seed,
            };
            let run_id = format!("stress-{seed:x}");
            let mut emitter = log
                .as_deref()
                .map(|path| LogEmitter::to_file(path, &run_id))
                .transpose()?;
            if let Some(emitter) = emitter.as_mut() {
                emitter.emit_entry(
                    LogEntry::new("", LogLevel::Info, "stress_start")
                        .with_details(serde_json::to_value(&config)?),
                )?;
            }

            let report = run_stress(&config)?;
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");

            if let (Some(mut emitter), Some(path)) = (emitter, log.as_deref()) {
                let (level, outcome) = if report.passed() {
                    (LogLevel::Info, RunOutcome::Pass)
                } else {
                    (LogLevel::Error, RunOutcome::Fail)
                };
                emitter.emit_entry(
                    LogEntry::new("", level, "stress_done")
                        .with_outcome(outcome)
                        .with_duration_ms(report.duration_ms)
                        .with_stats(report.stats)
                        .with_details(serde_json::json!({
                            "allocated": report.allocated,
                            "linked_records": report.linked_records,
                            "violations": report.violations,
                        })),
                )?;
                emitter.flush()?;
                drop(emitter);

                let mut index = ArtifactIndex::new(&run_id);
                index.add_file(path, "log")?;
                let index_path = path.with_extension("index.json");
                std::fs::write(&index_path, index.to_json()?)?;
                eprintln!("Wrote {} and {}", path.display(), index_path.display());
            }

            if !report.passed() {
                for violation in &report.violations {
                    eprintln!("violation: {violation}");
                }
                return Err(HarnessError::InvariantViolated {
                    count: report.violations.len(),
                }
                .into());
            }
        }
        Command::Buckets { max } => {
            let table = memop_bucket_table(max);
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
    }

    Ok(())
}
