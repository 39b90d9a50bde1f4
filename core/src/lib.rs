//! relevance-bench-core: orchestration engine for search relevance experiments
//!
//! A run evaluates one query text against several search configurations:
//!
//! - Judgment sets are fetched concurrently and merged into one rating surface
//! - Every configuration (or hybrid sweep variant) fans out as its own branch
//! - Branch hits are scored against the ratings
//! - Exactly one outcome or failure is delivered per run
//!
//! Collaborators (judgment store, search engine, scorer, listener) are traits
//! in [`traits`]; [`opensearch`] and [`judgment::FileJudgmentStore`] provide
//! default implementations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancellation;
pub mod config;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod judgment;
pub mod metrics;
pub mod opensearch;
pub mod orchestrator;
pub mod outcome;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use cancellation::CancellationToken;
pub use config::*;
pub use error::*;
pub use gate::{FailureGate, GateState};
pub use judgment::{FileJudgmentStore, Judgment, JudgmentRatingSet, MergePolicy};
pub use metrics::{EvaluationScorer, Metrics};
pub use opensearch::{OpenSearchClient, OpenSearchConfig};
pub use orchestrator::{ChannelListener, Orchestrator, OrchestratorBuilder, RunHandle};
pub use outcome::*;
pub use traits::*;
