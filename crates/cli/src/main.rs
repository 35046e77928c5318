//! optiloop CLI - runs an optimization cycle from a scenario file.

mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use optiloop_core::{CycleConfig, CycleStatus};
use optiloop_execution::{CycleDriver, RunSummary};
use optiloop_storage::{JsonStateStore, StateStore};
use scenario::Scenario;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "optiloop")]
#[command(about = "Cycle-aware metric optimization loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cycle to completion
    Run {
        /// Scenario file
        scenario: PathBuf,
        /// Override the iteration ceiling
        #[arg(long)]
        max_iterations: Option<u64>,
        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override the convergence threshold
        #[arg(long)]
        threshold: Option<f64>,
        /// Write the final state snapshot here
        #[arg(long)]
        state: Option<PathBuf>,
        /// Continue from the snapshot at --state instead of starting fresh
        #[arg(long, requires = "state")]
        resume: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a scenario file without running it
    Validate {
        /// Scenario file
        scenario: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            scenario,
            max_iterations,
            seed,
            threshold,
            state,
            resume,
            json,
        } => {
            let scenario = Scenario::load(&scenario)?;
            let config = apply_overrides(scenario.config.clone(), max_iterations, seed, threshold);

            let mut driver = CycleDriver::new(config)
                .context("invalid configuration")?
                .with_seed_tasks(scenario.tasks());

            let token = driver.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current tick");
                    token.cancel();
                }
            });

            let mut store = match &state {
                Some(path) => Some(JsonStateStore::new(path).await?),
                None => None,
            };

            let initial = match (&store, resume) {
                (Some(store), true) => {
                    let snapshot = store.load_required().await.context("cannot resume")?;
                    driver
                        .resume(snapshot)
                        .with_context(|| format!("snapshot {} is not a valid cycle", store.path().display()))?
                }
                _ => driver.new_cycle(&scenario.metrics, scenario.workers.clone())?,
            };

            let (final_state, summary) = driver.run(initial).await;

            if let Some(store) = store.as_mut() {
                store.save(&final_state).await?;
                info!(path = %store.path().display(), "state saved");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Validate { scenario } => {
            let path = scenario;
            let scenario = Scenario::load(&path)?;
            let mut driver = CycleDriver::new(scenario.config.clone()).context("invalid configuration")?;
            let state = driver.new_cycle(&scenario.metrics, scenario.workers.clone())?;
            println!(
                "{}: {} metrics, {} workers, {} seed tasks",
                path.display(),
                state.metrics.len(),
                state.worker_pool.len(),
                scenario.seed_tasks.len(),
            );
        }
    }

    Ok(())
}

fn apply_overrides(
    mut config: CycleConfig,
    max_iterations: Option<u64>,
    seed: Option<u64>,
    threshold: Option<f64>,
) -> CycleConfig {
    if let Some(max) = max_iterations {
        config = config.with_max_iterations(max);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(threshold) = threshold {
        config = config.with_threshold(threshold);
    }
    config
}

fn print_summary(summary: &RunSummary) {
    println!("Cycle {}", format_status(summary.status));
    println!("  Iterations: {} ({} failed)", summary.total_iterations, summary.failed_ticks);
    println!("  Final score: {:.4}", summary.final_score);
    println!("  Value generated: {:.2}", summary.total_value_generated);
    println!("  Metrics:");
    for (name, value) in &summary.per_metric_final_values {
        println!("    {}: {:.4}", name, value);
    }
    let elapsed = summary.finished_at - summary.started_at;
    println!("  Elapsed: {} ms", elapsed.num_milliseconds());
}

fn format_status(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Running => "RUNNING",
        CycleStatus::Converged => "CONVERGED",
        CycleStatus::Exhausted => "EXHAUSTED",
        CycleStatus::Stagnated => "STAGNATED",
        CycleStatus::Cancelled => "CANCELLED",
        CycleStatus::Aborted => "ABORTED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_scenario_values() {
        let config = apply_overrides(CycleConfig::new().with_seed(1), Some(5), None, Some(0.8));
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.convergence_threshold, 0.8);
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "optiloop", "run", "s.json", "--max-iterations", "3", "--state", "out.json", "--resume", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { max_iterations, resume, json, state, .. } => {
                assert_eq!(max_iterations, Some(3));
                assert!(resume && json);
                assert_eq!(state, Some(PathBuf::from("out.json")));
            }
            Commands::Validate { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_resume_requires_state() {
        assert!(Cli::try_parse_from(["optiloop", "run", "s.json", "--resume"]).is_err());
    }
}
