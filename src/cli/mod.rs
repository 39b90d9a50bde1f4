//! CLI argument parsing and command dispatch

mod file;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use relevance_bench_core::{
    ExperimentOutcome, FileJudgmentStore, JudgmentStore, OpenSearchClient, OrchestratorBuilder,
};

pub use file::ExperimentFile;

#[derive(Parser)]
#[command(name = "relevance-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a relevance experiment
    Run {
        /// Path to experiment file
        #[arg(short, long)]
        config: PathBuf,
        /// Write the outcome here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate an experiment file
    Validate {
        /// Path to experiment file
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Execute the parsed command
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Run { config, output }) => run(&config, output.as_deref()).await,
        Some(Commands::Validate { config }) => validate(&config),
        None => {
            tracing::warn!("No command given, see --help");
            Ok(())
        }
    }
}

async fn run(config: &Path, output: Option<&Path>) -> Result<()> {
    let file = ExperimentFile::load(config)?;

    let client = Arc::new(
        OpenSearchClient::new(file.backend.opensearch.clone())
            .context("failed to create OpenSearch client")?,
    );
    let store: Arc<dyn JudgmentStore> = match &file.backend.judgments_dir {
        Some(dir) => Arc::new(FileJudgmentStore::new(dir)),
        None => client.clone(),
    };

    let orchestrator = OrchestratorBuilder::new()
        .config(file.orchestrator.clone())
        .judgment_store(store)
        .search_engine(client)
        .build()?;

    tracing::debug!(orchestrator = ?orchestrator, "Orchestrator ready");

    let outcome = orchestrator
        .run_with_signal_handling(file.experiment)
        .await
        .context("experiment failed")?;

    write_outcome(&outcome, output)
}

fn validate(config: &Path) -> Result<()> {
    let file = ExperimentFile::load(config)?;
    tracing::info!(
        experiment_id = %file.experiment.experiment_id,
        run_id = %file.experiment.run_id,
        configurations = file.experiment.search_configurations.len(),
        judgments = file.experiment.judgment_ids.len(),
        "Experiment file is valid"
    );
    Ok(())
}

fn write_outcome(outcome: &ExperimentOutcome, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), branches = outcome.results.len(), "Outcome written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
