//! Collaborator traits: judgment store, search engine, scorer, listener
//!
//! The orchestration core only talks to the outside world through these
//! traits. Default implementations live in [`crate::opensearch`],
//! [`crate::judgment::FileJudgmentStore`] and [`crate::metrics`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{HybridVariant, SEARCH_TEXT_PLACEHOLDER};
use crate::error::{ErrorKind, ExperimentError};
use crate::judgment::{Judgment, QueryRatings};
use crate::metrics::Metrics;
use crate::outcome::ExperimentOutcome;

// ============================================================================
// Judgment store
// ============================================================================

/// Source of judgment sets
#[async_trait]
pub trait JudgmentStore: Send + Sync {
    /// Store identifier for logging
    fn store_name(&self) -> &str;

    /// Fetch one judgment set by id
    ///
    /// Must report a missing judgment as [`StoreError::NotFound`] so it can
    /// be told apart from transient failures.
    async fn get_judgment(&self, judgment_id: &str) -> Result<Judgment, StoreError>;
}

/// Judgment store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The judgment does not exist
    #[error("judgment not found: {0}")]
    NotFound(String),

    /// The store could not serve the request
    #[error("judgment store unavailable: {0}")]
    Unavailable(String),

    /// The stored document could not be decoded
    #[error("malformed judgment document: {0}")]
    Malformed(String),

    /// HTTP/network error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Check if the judgment is missing rather than unreachable
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Convert to ErrorKind for failure classification
    pub fn to_error_kind(&self) -> ErrorKind {
        if self.is_not_found() {
            ErrorKind::JudgmentNotFound
        } else {
            ErrorKind::JudgmentStore
        }
    }
}

// ============================================================================
// Search engine
// ============================================================================

/// One search to execute for a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Target index
    pub index: String,

    /// Query DSL template containing `%SearchText%`
    pub query_template: String,

    /// Query text substituted into the template
    pub query_text: String,

    /// Named search pipeline
    pub pipeline: Option<String>,

    /// Hybrid sweep parameters, overriding `pipeline` when present
    pub variant: Option<HybridVariant>,

    /// Result cutoff
    pub size: usize,
}

impl SearchRequest {
    /// Render the template into a query body with `size` applied
    pub fn render_body(&self) -> Result<serde_json::Value, SearchError> {
        // The placeholder sits inside a JSON string, so the text must be escaped.
        let escaped = serde_json::to_string(&self.query_text)
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))?;
        let escaped = &escaped[1..escaped.len() - 1];
        let rendered = self.query_template.replace(SEARCH_TEXT_PLACEHOLDER, escaped);

        let mut body: serde_json::Value = serde_json::from_str(&rendered)
            .map_err(|e| SearchError::InvalidQuery(format!("{e} in template for {}", self.index)))?;
        let object = body
            .as_object_mut()
            .ok_or_else(|| SearchError::InvalidQuery("query template must be a JSON object".into()))?;

        object.insert("size".into(), self.size.into());
        if let Some(variant) = &self.variant {
            object.insert("search_pipeline".into(), variant.pipeline_definition());
        }
        Ok(body)
    }
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id
    pub doc_id: String,

    /// Engine score, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchHit {
    /// Hit without a score
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            score: None,
        }
    }
}

/// Search backend executing one query per call
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Engine identifier for logging
    fn engine_name(&self) -> &str;

    /// Execute a search and return hits in rank order
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError>;
}

/// Search backend errors
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// HTTP/network error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The index does not exist
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// The template could not be rendered into a query
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The backend rejected or failed the search
    #[error("search backend error: {status} - {message}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// The backend did not answer in time
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
}

impl SearchError {
    /// Check if retrying the same search could succeed
    ///
    /// The core never retries; this is informational for collaborators.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Http(_) | SearchError::Timeout(_) => true,
            SearchError::Backend { status, .. } => *status >= 500 || *status == 429,
            SearchError::IndexNotFound(_) | SearchError::InvalidQuery(_) => false,
        }
    }

    /// Convert to ErrorKind for failure classification
    pub fn to_error_kind(&self) -> ErrorKind {
        ErrorKind::SearchExecution
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Relevance metric computation over one branch's hits
pub trait MetricScorer: Send + Sync {
    /// Scorer identifier for logging
    fn name(&self) -> &str;

    /// Score `hits` against the ratings of the experiment's query
    ///
    /// `ratings` is `None` when no judgment covers the query.
    fn score(&self, hits: &[SearchHit], ratings: Option<&QueryRatings>, size: usize) -> Metrics;
}

// ============================================================================
// Listener
// ============================================================================

/// Receiver of a run's terminal notification
///
/// Exactly one of the two methods is called, exactly once, per run.
pub trait ExperimentListener: Send + Sync {
    /// The run succeeded
    fn on_response(&self, outcome: ExperimentOutcome);

    /// The run failed
    fn on_failure(&self, error: ExperimentError);
}
