//! Final result of a successful experiment run

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ExperimentType, HybridVariant};
use crate::fanout::BranchKey;
use crate::metrics::Metrics;

/// Scored result of one branch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    /// Branch key (`configId` or `configId#variant`)
    pub key: BranchKey,

    /// Hybrid parameters of this branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<HybridVariant>,

    /// Metric name to value
    pub metrics: Metrics,

    /// Returned document ids in rank order
    pub doc_ids: Vec<String>,
}

/// Best variant of one configuration for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridSelection {
    /// Configuration the variants were derived from
    pub config_id: String,

    /// Metric name
    pub metric: String,

    /// Winning branch
    pub best_key: BranchKey,

    /// Winning parameters
    pub variant: HybridVariant,

    /// Winning metric value
    pub value: f64,
}

/// Summary across all branches of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    /// Number of branches aggregated
    pub total_branches: usize,

    /// Per-metric mean across branches reporting the metric
    pub metric_means: Metrics,
}

impl OutcomeSummary {
    /// Summarize branch records
    pub fn from_records(records: &[BranchRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut totals: Metrics = Metrics::new();
        let mut counts: std::collections::BTreeMap<&str, usize> = Default::default();
        for record in records {
            for (name, value) in &record.metrics {
                *totals.entry(name.clone()).or_insert(0.0) += value;
                *counts.entry(name.as_str()).or_insert(0) += 1;
            }
        }

        let metric_means = totals
            .iter()
            .map(|(name, total)| {
                let count = counts.get(name.as_str()).copied().unwrap_or(1);
                (name.clone(), total / count as f64)
            })
            .collect();

        Self {
            total_branches: records.len(),
            metric_means,
        }
    }
}

/// Combined result delivered to the listener on success
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentOutcome {
    /// Experiment identifier
    pub experiment_id: String,

    /// Run identifier
    pub run_id: String,

    /// Query text
    pub query_text: String,

    /// Experiment flavour
    pub experiment_type: ExperimentType,

    /// Branch results ordered by key
    pub results: Vec<BranchRecord>,

    /// Best variant per configuration and metric (hybrid optimizer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<Vec<HybridSelection>>,

    /// Cross-branch summary
    pub summary: OutcomeSummary,

    /// When aggregation finished
    pub completed_at: DateTime<Utc>,
}

impl ExperimentOutcome {
    /// Look up a branch by its display key
    pub fn branch(&self, key: &str) -> Option<&BranchRecord> {
        self.results.iter().find(|r| r.key.to_string() == key)
    }

    /// Display keys in result order
    pub fn keys(&self) -> Vec<String> {
        self.results.iter().map(|r| r.key.to_string()).collect()
    }

    /// Best variant of `config_id` for `metric`
    pub fn best_for(&self, config_id: &str, metric: &str) -> Option<&HybridSelection> {
        self.hybrid
            .as_deref()?
            .iter()
            .find(|s| s.config_id == config_id && s.metric == metric)
    }
}
