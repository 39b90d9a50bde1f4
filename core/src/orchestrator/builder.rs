//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::error::{ExperimentError, ExperimentResult};
use crate::judgment::MergePolicy;
use crate::metrics::EvaluationScorer;
use crate::traits::{JudgmentStore, MetricScorer, SearchEngine};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .max_concurrent_branches(8)
///     .search_rate_limit(Some(50.0))
///     .judgment_store(store)
///     .search_engine(engine)
///     .build()?;
///
/// let outcome = orchestrator.run(request).await?;
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    judgment_store: Option<Arc<dyn JudgmentStore>>,
    search_engine: Option<Arc<dyn SearchEngine>>,
    scorer: Option<Arc<dyn MetricScorer>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            judgment_store: None,
            search_engine: None,
            scorer: None,
        }
    }

    /// Set the full orchestrator configuration
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound concurrently executing branches
    pub fn max_concurrent_branches(mut self, limit: usize) -> Self {
        self.config.max_concurrent_branches = Some(limit);
        self
    }

    /// Set the search rate limit (searches per second)
    pub fn search_rate_limit(mut self, rps: Option<f64>) -> Self {
        self.config.search_rate_limit = rps;
        self
    }

    /// Set the rating merge policy
    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.config.merge_policy = policy;
        self
    }

    /// Set the judgment store
    pub fn judgment_store(mut self, store: Arc<dyn JudgmentStore>) -> Self {
        self.judgment_store = Some(store);
        self
    }

    /// Set the search engine
    pub fn search_engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.search_engine = Some(engine);
        self
    }

    /// Set the metric scorer (defaults to [`EvaluationScorer`])
    pub fn scorer(mut self, scorer: Arc<dyn MetricScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the judgment store or search engine are not set,
    /// or if configuration validation fails.
    pub fn build(self) -> ExperimentResult<Orchestrator> {
        let store = self
            .judgment_store
            .ok_or_else(|| ExperimentError::missing_config("judgment_store"))?;

        let engine = self
            .search_engine
            .ok_or_else(|| ExperimentError::missing_config("search_engine"))?;

        let scorer = self
            .scorer
            .unwrap_or_else(|| Arc::new(EvaluationScorer));

        Orchestrator::new(self.config, store, engine, scorer)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
