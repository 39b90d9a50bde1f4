//! Branch identity and single-branch execution

use std::sync::Arc;
use std::time::Instant;

use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;

use crate::cancellation::CancellationToken;
use crate::config::{HybridVariant, SearchConfigurationDetails};
use crate::error::{ExperimentError, ExperimentResult};
use crate::judgment::JudgmentRatingSet;
use crate::metrics::Metrics;
use crate::traits::{MetricScorer, SearchEngine, SearchRequest};

use super::rate_limiter::SearchRateLimiter;

/// Identity of one branch: a configuration, optionally one of its hybrid variants
///
/// Ordered by `(config_id, variant)`, with the plain configuration sorting
/// before any of its variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchKey {
    /// Search configuration id
    pub config_id: String,
    /// Hybrid variant index
    pub variant: Option<usize>,
}

impl BranchKey {
    /// Key of a plain configuration
    pub fn config(config_id: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            variant: None,
        }
    }

    /// Key of variant `index` of a configuration
    pub fn variant(config_id: impl Into<String>, index: usize) -> Self {
        Self {
            config_id: config_id.into(),
            variant: Some(index),
        }
    }
}

impl std::fmt::Display for BranchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.variant {
            Some(index) => write!(f, "{}#{}", self.config_id, index),
            None => write!(f, "{}", self.config_id),
        }
    }
}

impl Serialize for BranchKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Unit of fan-out: one search configuration with optional hybrid parameters
#[derive(Debug, Clone)]
pub struct Branch {
    /// Branch identity
    pub key: BranchKey,
    /// Configuration searched by this branch
    pub config: SearchConfigurationDetails,
    /// Hybrid parameters, when this branch is a sweep variant
    pub variant: Option<HybridVariant>,
}

impl Branch {
    /// Branch for a plain configuration
    pub fn new(config_id: impl Into<String>, config: SearchConfigurationDetails) -> Self {
        Self {
            key: BranchKey::config(config_id),
            config,
            variant: None,
        }
    }

    /// Branch for variant `index` of a configuration
    pub fn with_variant(
        config_id: impl Into<String>,
        config: SearchConfigurationDetails,
        index: usize,
        variant: HybridVariant,
    ) -> Self {
        Self {
            key: BranchKey::variant(config_id, index),
            config,
            variant: Some(variant),
        }
    }

    /// Search request for this branch within a run
    pub fn search_request(&self, ctx: &RunContext) -> SearchRequest {
        SearchRequest {
            index: self.config.index.clone(),
            query_template: self.config.query.clone(),
            query_text: ctx.query_text.clone(),
            // A variant carries its own temporary pipeline.
            pipeline: match self.variant {
                Some(_) => None,
                None => self.config.pipeline.clone(),
            },
            variant: self.variant.clone(),
            size: ctx.size,
        }
    }
}

/// Scored output of a successful branch
#[derive(Debug, Clone, PartialEq)]
pub struct BranchEvaluation {
    /// Metric name to value
    pub metrics: Metrics,
    /// Returned document ids in rank order
    pub doc_ids: Vec<String>,
}

/// Terminal result of one branch
#[derive(Debug, Clone)]
pub struct BranchResult {
    /// Branch identity
    pub key: BranchKey,
    /// Hybrid parameters of the branch
    pub variant: Option<HybridVariant>,
    /// Scores or the branch's error
    pub outcome: ExperimentResult<BranchEvaluation>,
}

impl BranchResult {
    /// Check if the branch produced scores
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-run state shared read-only by every branch
#[derive(Debug)]
pub struct RunContext {
    /// Experiment identifier
    pub experiment_id: String,
    /// Run identifier
    pub run_id: String,
    /// Query text substituted into every template
    pub query_text: String,
    /// Result cutoff
    pub size: usize,
    /// Run cancellation
    pub token: Arc<CancellationToken>,
    /// Merged judgment ratings
    pub ratings: Arc<JudgmentRatingSet>,
}

/// Runs one branch: checkpoint, search, score
pub struct SearchConfigExecutor {
    engine: Arc<dyn SearchEngine>,
    scorer: Arc<dyn MetricScorer>,
    semaphore: Option<Arc<Semaphore>>,
    rate_limiter: Arc<SearchRateLimiter>,
}

impl SearchConfigExecutor {
    /// Create an unthrottled executor
    pub fn new(engine: Arc<dyn SearchEngine>, scorer: Arc<dyn MetricScorer>) -> Self {
        Self {
            engine,
            scorer,
            semaphore: None,
            rate_limiter: Arc::new(SearchRateLimiter::unlimited()),
        }
    }

    /// Bound the number of branches searching at once
    pub fn with_concurrency_limit(mut self, semaphore: Arc<Semaphore>) -> Self {
        self.semaphore = Some(semaphore);
        self
    }

    /// Share a search rate limiter
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<SearchRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Execute one branch
    ///
    /// Never notifies the listener; the caller decides what a failure means.
    pub async fn execute(&self, branch: &Branch, ctx: &RunContext) -> BranchResult {
        let outcome = self.evaluate(branch, ctx).await;
        BranchResult {
            key: branch.key.clone(),
            variant: branch.variant.clone(),
            outcome,
        }
    }

    async fn evaluate(&self, branch: &Branch, ctx: &RunContext) -> ExperimentResult<BranchEvaluation> {
        checkpoint(branch, ctx)?;

        let _permit = match &self.semaphore {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| ExperimentError::internal("branch semaphore closed"))?,
            ),
            None => None,
        };
        self.rate_limiter.wait().await;
        checkpoint(branch, ctx)?;

        let request = branch.search_request(ctx);
        let start = Instant::now();
        let hits = self.engine.search(&request).await.map_err(|e| {
            ExperimentError::new(
                e.to_error_kind(),
                format!("search for {} on {} failed: {e}", branch.key, request.index),
            )
        })?;

        let metrics = self
            .scorer
            .score(&hits, ctx.ratings.for_query(&ctx.query_text), ctx.size);

        tracing::debug!(
            run_id = %ctx.run_id,
            branch = %branch.key,
            engine = self.engine.engine_name(),
            hits = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Branch scored"
        );

        Ok(BranchEvaluation {
            metrics,
            doc_ids: hits.into_iter().map(|h| h.doc_id).collect(),
        })
    }
}

fn checkpoint(branch: &Branch, ctx: &RunContext) -> ExperimentResult<()> {
    if ctx.token.is_cancelled() {
        tracing::debug!(run_id = %ctx.run_id, branch = %branch.key, "Branch skipped, run cancelled");
        return Err(ExperimentError::cancelled(format!(
            "run {} cancelled before {} searched",
            ctx.run_id, branch.key
        )));
    }
    Ok(())
}

impl std::fmt::Debug for SearchConfigExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfigExecutor")
            .field("engine", &self.engine.engine_name())
            .field("scorer", &self.scorer.name())
            .field(
                "concurrency_limit",
                &self.semaphore.as_ref().map(|s| s.available_permits()),
            )
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}
