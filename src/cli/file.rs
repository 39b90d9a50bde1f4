//! Experiment file model

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use relevance_bench_core::{ExperimentRequest, OpenSearchConfig, OrchestratorConfig};

/// Contents of a `--config` file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentFile {
    /// The experiment run to execute
    pub experiment: ExperimentRequest,

    /// Orchestrator tuning
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Where searches and judgments come from
    pub backend: BackendConfig,
}

/// Search backend and judgment source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// OpenSearch connection settings
    #[serde(flatten)]
    pub opensearch: OpenSearchConfig,

    /// Read judgments from `{dir}/{id}.json` instead of the judgment index
    #[serde(default)]
    pub judgments_dir: Option<PathBuf>,
}

impl ExperimentFile {
    /// Read and validate a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        file.validate()
            .with_context(|| format!("invalid experiment file {}", path.display()))?;
        Ok(file)
    }

    /// Check the request, orchestrator settings and backend
    pub fn validate(&self) -> Result<()> {
        self.experiment.validate().context("experiment")?;
        self.orchestrator.validate().context("orchestrator")?;
        if self.backend.opensearch.endpoint.trim().is_empty() {
            anyhow::bail!("backend endpoint must not be empty");
        }
        if let Some(dir) = &self.backend.judgments_dir {
            if !dir.is_dir() {
                anyhow::bail!("judgments directory {} does not exist", dir.display());
            }
        }
        Ok(())
    }
}
