//! Lineage CLI - track a component's evolution across generations.

mod simulate;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lineage_blueprint::BlueprintStore;
use lineage_core::{GenerationIndex, GenerationSnapshot, VersionId};
use lineage_improvement::{CycleInput, LoopConfig, Pipeline};
use lineage_storage::{ComponentRecord, JsonStorage, Storage};
use lineage_tracker::GenerationTracker;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::simulate::{initial_blueprint, SimulatedHooks};

#[derive(Parser)]
#[command(name = "lineage")]
#[command(about = "Generational improvement tracking for software components", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, global = true, default_value = ".lineage")]
    data_dir: PathBuf,

    /// Component to operate on
    #[arg(long, global = true, default_value = "DataProcessor")]
    component: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulated improvement cycles
    Run {
        /// Number of generations to evolve
        #[arg(long, default_value = "3")]
        generations: usize,
        /// Stop after a failed or aborted cycle
        #[arg(long)]
        stop_on_failure: bool,
        /// Skip validation of PARTIAL generations
        #[arg(long)]
        skip_partial_validation: bool,
    },
    /// List generations
    History,
    /// Show one generation
    Show {
        /// Generation index
        generation: GenerationIndex,
    },
    /// Show the trend of a metric
    Trend {
        /// Metric name
        metric: String,
        /// Also list non-numeric readings
        #[arg(long)]
        raw: bool,
    },
    /// Diff two blueprint versions
    Diff {
        /// Older version (e.g. v1)
        from: VersionId,
        /// Newer version (e.g. v2)
        to: VersionId,
        /// Hide unchanged keys
        #[arg(long)]
        changes_only: bool,
    },
    /// Commit a JSON blueprint file
    Commit {
        /// Path to a JSON object
        file: PathBuf,
    },
    /// Re-commit an older blueprint as the newest version
    Rollback {
        /// Version to restore
        version: VersionId,
    },
    /// List stored components
    Components,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut storage = JsonStorage::new(&cli.data_dir).await?;
    let component = cli.component;

    match cli.command {
        Commands::Run {
            generations,
            stop_on_failure,
            skip_partial_validation,
        } => {
            let (tracker, mut blueprints) = load(&storage, &component).await?;
            if blueprints.is_empty() {
                blueprints.commit(initial_blueprint(&component));
            }

            let config = blueprints
                .latest()
                .map(|v| v.content.clone())
                .unwrap_or_default();
            let finalized = tracker.get_history().iter().filter(|s| !s.is_open()).count();
            let hooks = SimulatedHooks::new(finalized, config);

            let mut pipeline = Pipeline::from_parts(tracker, blueprints, hooks)?.with_config(
                LoopConfig {
                    stop_on_failure,
                    validate_partial: !skip_partial_validation,
                    ..Default::default()
                },
            );

            let input: CycleInput = json!({"env": "prod-sim"});
            let reports = pipeline.run_cycles(&input, generations)?;

            for report in &reports {
                let index = report
                    .generation_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".to_string());
                match report.aborted_at {
                    Some(phase) => println!("Generation {}: aborted at {}", index, phase),
                    None => println!(
                        "Generation {}: {}",
                        index,
                        report
                            .status
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string())
                    ),
                }
                if let Some(version) = report.blueprint_version {
                    println!("  Blueprint: {}", version);
                }
                if let Some(diff) = &report.blueprint_diff {
                    println!("  Diff: {}", diff.summary());
                }
                if let Some(passed) = report.validation_result {
                    println!("  Validation: {}", if passed { "passed" } else { "failed" });
                }
                if let Some(failure) = &report.failure {
                    println!("  Failure: {}", failure);
                }
            }

            println!("Latency trend (ms):");
            for (index, value) in pipeline.get_metric_trend("avg_latency_ms") {
                println!("  Gen {}: {}", index, value);
            }

            let (tracker, blueprints, _) = pipeline.into_parts();
            save(&mut storage, &tracker, &blueprints).await?;
            info!("Completed {} cycles for {}", reports.len(), component);
        }
        Commands::History => {
            let (tracker, _) = load(&storage, &component).await?;

            println!("{} ({} generations)", component, tracker.len());
            for snap in tracker.get_history() {
                println!(
                    "  {} | {} | {} | {} metrics | {}",
                    snap.index,
                    format_status(snap),
                    snap.blueprint_version
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    snap.metrics.len(),
                    snap.notes.lines().next().unwrap_or(""),
                );
            }
        }
        Commands::Show { generation } => {
            let (tracker, _) = load(&storage, &component).await?;
            let snap = tracker.get_generation(generation)?;

            println!("Generation: {} of {}", snap.index, snap.component);
            println!("  Status: {}", format_status(snap));
            if let Some(parent) = snap.parent {
                println!("  Parent: {}", parent);
            }
            if let Some(version) = snap.blueprint_version {
                println!("  Blueprint: {}", version);
            }
            println!("  Started: {}", snap.started_at);
            if let Some(at) = snap.finalized_at {
                println!("  Finalized: {}", at);
            }
            if !snap.notes.is_empty() {
                println!("  Notes:");
                for line in snap.notes.lines() {
                    println!("    {}", line);
                }
            }
            println!("  Metrics:");
            for (name, values) in &snap.metrics {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                println!("    {}: {}", name, values.join(", "));
            }
            if !snap.artifacts.is_empty() {
                println!("  Artifacts:");
                for (kind, refs) in &snap.artifacts {
                    println!("    {}: {}", kind, refs.join(", "));
                }
            }
        }
        Commands::Trend { metric, raw } => {
            let (tracker, _) = load(&storage, &component).await?;

            println!("Trend of {}:", metric);
            if raw {
                for (index, value) in tracker.metric_values(&metric) {
                    println!("  Gen {}: {}", index, value);
                }
            } else {
                for (index, value) in tracker.get_metric_trend(&metric) {
                    println!("  Gen {}: {}", index, value);
                }
            }

            match tracker.trend_summary(&metric) {
                Some(summary) => println!(
                    "  {} points, min {}, max {}, mean {:.2}, delta {:+}",
                    summary.points,
                    summary.min,
                    summary.max,
                    summary.mean,
                    summary.delta()
                ),
                None => println!("  No numeric readings"),
            }
        }
        Commands::Diff {
            from,
            to,
            changes_only,
        } => {
            let (_, blueprints) = load(&storage, &component).await?;
            let diff = blueprints.diff(from, to)?;

            if changes_only {
                println!("--- {}", diff.from);
                println!("+++ {}", diff.to);
                for entry in diff.changes() {
                    println!("{}", entry);
                }
            } else {
                print!("{}", diff);
            }
            println!("{}", diff.summary());
        }
        Commands::Commit { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let serde_json::Value::Object(content) = serde_json::from_str::<serde_json::Value>(&text)
                .with_context(|| format!("parsing {}", file.display()))?
            else {
                bail!("{} must contain a JSON object", file.display());
            };

            let (tracker, mut blueprints) = load(&storage, &component).await?;
            let version = blueprints.commit(content).version_id;
            save(&mut storage, &tracker, &blueprints).await?;
            println!("Committed {} for {}", version, component);
        }
        Commands::Rollback { version } => {
            let (tracker, mut blueprints) = load(&storage, &component).await?;
            let restored = blueprints.rollback(version)?.version_id;
            save(&mut storage, &tracker, &blueprints).await?;
            println!("Restored {} as {} for {}", version, restored, component);
        }
        Commands::Components => {
            let names = storage.list_components().await?;

            println!("Components ({})", names.len());
            for name in names {
                println!("  {}", name);
            }
        }
    }

    Ok(())
}

/// Load a component's history, or start an empty one.
async fn load(storage: &JsonStorage, component: &str) -> Result<(GenerationTracker, BlueprintStore)> {
    match storage.load_component(component).await? {
        Some(record) => Ok(record.restore()?),
        None => Ok((
            GenerationTracker::new(component),
            BlueprintStore::new(component),
        )),
    }
}

async fn save(
    storage: &mut JsonStorage,
    tracker: &GenerationTracker,
    blueprints: &BlueprintStore,
) -> Result<()> {
    let record = ComponentRecord::capture(tracker, blueprints)?;
    storage.save_component(&record).await?;
    Ok(())
}

fn format_status(snap: &GenerationSnapshot) -> String {
    match snap.status {
        Some(status) => status.to_string(),
        None => "OPEN".to_string(),
    }
}
