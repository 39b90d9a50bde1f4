//! Experiment request and orchestrator configuration types

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::judgment::MergePolicy;

/// Placeholder substituted with the experiment's query text in query templates
pub const SEARCH_TEXT_PLACEHOLDER: &str = "%SearchText%";

/// Default result cutoff when a request does not specify one
pub const DEFAULT_SIZE: usize = 10;

// ============================================================================
// Search configurations
// ============================================================================

/// One search configuration under test
///
/// Immutable once part of a request. In hybrid-optimizer experiments a single
/// configuration may expand into many sweep variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfigurationDetails {
    /// Target index
    pub index: String,

    /// Query DSL template containing `%SearchText%`
    pub query: String,

    /// Named search pipeline, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl SearchConfigurationDetails {
    /// Create a configuration without a search pipeline
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            pipeline: None,
        }
    }

    /// Set the search pipeline
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Check whether the query template is a two-clause `hybrid` query
    ///
    /// Only such templates have a normalization/combination parameter space
    /// the hybrid optimizer can sweep.
    pub fn is_hybrid_query(&self) -> bool {
        let probe = self.query.replace(SEARCH_TEXT_PLACEHOLDER, "");
        serde_json::from_str::<serde_json::Value>(&probe)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/query/hybrid/queries")
                    .and_then(|q| q.as_array())
                    .map(|queries| queries.len() == 2)
            })
            .unwrap_or(false)
    }

    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        if self.index.trim().is_empty() {
            return Err(ConfigError::InvalidSearchConfiguration {
                id: id.to_string(),
                reason: "index must not be empty".into(),
            });
        }
        if self.query.trim().is_empty() {
            return Err(ConfigError::InvalidSearchConfiguration {
                id: id.to_string(),
                reason: "query template must not be empty".into(),
            });
        }
        if matches!(&self.pipeline, Some(p) if p.trim().is_empty()) {
            return Err(ConfigError::InvalidSearchConfiguration {
                id: id.to_string(),
                reason: "pipeline must be omitted rather than empty".into(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Experiment request
// ============================================================================

/// Experiment flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentType {
    /// Score every search configuration once
    #[default]
    PointwiseEvaluation,
    /// Sweep hybrid normalization/combination parameters per configuration
    HybridOptimizer,
}

impl std::fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentType::PointwiseEvaluation => write!(f, "POINTWISE_EVALUATION"),
            ExperimentType::HybridOptimizer => write!(f, "HYBRID_OPTIMIZER"),
        }
    }
}

/// Input of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRequest {
    /// Experiment identifier
    pub experiment_id: String,

    /// Run identifier, unique per invocation
    pub run_id: String,

    /// Query text substituted into every template
    pub query_text: String,

    /// Result cutoff for every search
    #[serde(default = "default_size")]
    pub size: usize,

    /// Experiment flavour
    #[serde(default)]
    pub experiment_type: ExperimentType,

    /// Search configurations keyed by configuration id
    pub search_configurations: BTreeMap<String, SearchConfigurationDetails>,

    /// Judgment sets merged into the rating surface
    #[serde(alias = "judgmentList")]
    pub judgment_ids: Vec<String>,
}

fn default_size() -> usize {
    DEFAULT_SIZE
}

impl ExperimentRequest {
    /// Create an empty pointwise request
    pub fn new(
        experiment_id: impl Into<String>,
        run_id: impl Into<String>,
        query_text: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            run_id: run_id.into(),
            query_text: query_text.into(),
            size: DEFAULT_SIZE,
            experiment_type: ExperimentType::default(),
            search_configurations: BTreeMap::new(),
            judgment_ids: Vec::new(),
        }
    }

    /// Add a search configuration
    pub fn with_configuration(
        mut self,
        id: impl Into<String>,
        details: SearchConfigurationDetails,
    ) -> Self {
        self.search_configurations.insert(id.into(), details);
        self
    }

    /// Add a judgment set
    pub fn with_judgment(mut self, judgment_id: impl Into<String>) -> Self {
        self.judgment_ids.push(judgment_id.into());
        self
    }

    /// Set the result cutoff
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Set the experiment flavour
    pub fn with_type(mut self, experiment_type: ExperimentType) -> Self {
        self.experiment_type = experiment_type;
        self
    }

    /// Validate the request contract
    ///
    /// Violations are rejected before any asynchronous work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.experiment_id.trim().is_empty() {
            return Err(ConfigError::InvalidIdentifier("experiment id".into()));
        }
        if self.run_id.trim().is_empty() {
            return Err(ConfigError::InvalidIdentifier("run id".into()));
        }
        if self.query_text.trim().is_empty() {
            return Err(ConfigError::InvalidQueryText);
        }
        if self.size == 0 {
            return Err(ConfigError::InvalidSize);
        }
        if self.search_configurations.is_empty() {
            return Err(ConfigError::EmptySearchConfigurations);
        }
        if self.judgment_ids.is_empty() {
            return Err(ConfigError::EmptyJudgments);
        }
        if self.judgment_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ConfigError::InvalidIdentifier("judgment id".into()));
        }
        for (id, details) in &self.search_configurations {
            if id.trim().is_empty() || id.contains('#') {
                return Err(ConfigError::InvalidIdentifier(format!(
                    "search configuration id {id:?}"
                )));
            }
            details.validate(id)?;
        }
        Ok(())
    }
}

// ============================================================================
// Hybrid optimizer parameter space
// ============================================================================

/// One point of the hybrid parameter sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridVariant {
    /// Score normalization technique (e.g. `min_max`)
    pub normalization: String,

    /// Score combination technique (e.g. `arithmetic_mean`)
    pub combination: String,

    /// Sub-query weights, summing to 1.0
    pub weights: Vec<f64>,
}

impl HybridVariant {
    /// Temporary search pipeline carrying this variant's parameters
    pub fn pipeline_definition(&self) -> serde_json::Value {
        json!({
            "phase_results_processors": [{
                "normalization-processor": {
                    "normalization": { "technique": self.normalization },
                    "combination": {
                        "technique": self.combination,
                        "parameters": { "weights": self.weights }
                    }
                }
            }]
        })
    }
}

/// Finest weight step; weights are kept at two decimals
pub const MIN_WEIGHT_STEP: f64 = 0.01;

/// Parameter space swept by the hybrid optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HybridOptimizerOptions {
    /// Normalization techniques to try
    pub normalization_techniques: Vec<String>,

    /// Combination techniques to try
    pub combination_techniques: Vec<String>,

    /// Step between consecutive first-clause weights in `[0, 1]`
    pub weight_step: f64,
}

impl Default for HybridOptimizerOptions {
    fn default() -> Self {
        Self {
            normalization_techniques: vec!["min_max".into(), "l2".into()],
            combination_techniques: vec![
                "arithmetic_mean".into(),
                "harmonic_mean".into(),
                "geometric_mean".into(),
            ],
            weight_step: 0.1,
        }
    }
}

impl HybridOptimizerOptions {
    /// Weight pairs `[w, 1 - w]` for `w = 0, step, 2*step, ... <= 1`
    ///
    /// Steps finer than [`MIN_WEIGHT_STEP`] are clamped to it, so no two
    /// pairs are equal after rounding.
    pub fn weight_pairs(&self) -> Vec<[f64; 2]> {
        let step = self.weight_step.max(MIN_WEIGHT_STEP);
        let steps = (1.0 / step + 1e-9).floor() as usize;
        let mut pairs: Vec<[f64; 2]> = (0..=steps)
            .map(|i| {
                let first = round2(i as f64 * step);
                [first, round2(1.0 - first)]
            })
            .collect();
        pairs.dedup();
        pairs
    }

    /// Ordered sweep: normalization × combination × weights
    pub fn variants(&self) -> Vec<HybridVariant> {
        let weights = self.weight_pairs();
        let mut variants = Vec::with_capacity(
            self.normalization_techniques.len() * self.combination_techniques.len() * weights.len(),
        );
        for normalization in &self.normalization_techniques {
            for combination in &self.combination_techniques {
                for pair in &weights {
                    variants.push(HybridVariant {
                        normalization: normalization.clone(),
                        combination: combination.clone(),
                        weights: pair.to_vec(),
                    });
                }
            }
        }
        variants
    }

    /// Validate the parameter space
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.normalization_techniques.is_empty() {
            return Err(ConfigError::InvalidHybridOptions(
                "at least one normalization technique is required".into(),
            ));
        }
        if self.combination_techniques.is_empty() {
            return Err(ConfigError::InvalidHybridOptions(
                "at least one combination technique is required".into(),
            ));
        }
        if !(self.weight_step >= MIN_WEIGHT_STEP && self.weight_step <= 1.0) {
            return Err(ConfigError::InvalidHybridOptions(format!(
                "weight step must be in [{MIN_WEIGHT_STEP}, 1], got {}",
                self.weight_step
            )));
        }
        Ok(())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Orchestrator configuration
// ============================================================================

/// Runtime configuration of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// How colliding `(query, docId)` ratings are resolved
    pub merge_policy: MergePolicy,

    /// Upper bound on concurrently executing branches (unbounded if `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_branches: Option<usize>,

    /// Search requests per second across all branches (unlimited if `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_rate_limit: Option<f64>,

    /// Deadline after which the scheduler cancels a run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Hybrid optimizer parameter space
    pub hybrid: HybridOptimizerOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            max_concurrent_branches: None,
            search_rate_limit: None,
            deadline_secs: None,
            hybrid: HybridOptimizerOptions::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Set the branch concurrency bound
    pub fn with_max_concurrent_branches(mut self, limit: usize) -> Self {
        self.max_concurrent_branches = Some(limit);
        self
    }

    /// Set the search rate limit
    pub fn with_search_rate_limit(mut self, rps: f64) -> Self {
        self.search_rate_limit = Some(rps);
        self
    }

    /// Set the run deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_secs = Some(deadline.as_secs());
        self
    }

    /// Set the rating merge policy
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Run deadline as a duration
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_branches == Some(0) {
            return Err(ConfigError::InvalidConcurrency(
                "max concurrent branches must be at least 1".into(),
            ));
        }

        if let Some(rps) = self.search_rate_limit {
            if rps <= 0.0 {
                return Err(ConfigError::InvalidRateLimit(
                    "search rate limit must be positive".into(),
                ));
            }
        }

        if self.deadline_secs == Some(0) {
            return Err(ConfigError::InvalidDeadline);
        }

        self.hybrid.validate()
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// No search configuration supplied
    #[error("at least one search configuration is required")]
    EmptySearchConfigurations,

    /// No judgment set supplied
    #[error("at least one judgment set is required")]
    EmptyJudgments,

    /// Result cutoff of zero
    #[error("size must be at least 1")]
    InvalidSize,

    /// Blank query text
    #[error("query text must not be empty")]
    InvalidQueryText,

    /// Blank or malformed identifier
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A search configuration is unusable
    #[error("invalid search configuration {id}: {reason}")]
    InvalidSearchConfiguration {
        /// Configuration id
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid concurrency value
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid rate limit
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Zero deadline
    #[error("deadline must be at least one second")]
    InvalidDeadline,

    /// Unusable hybrid parameter space
    #[error("invalid hybrid optimizer options: {0}")]
    InvalidHybridOptions(String),
}
