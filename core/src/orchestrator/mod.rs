//! Orchestrator for experiment run lifecycle management
//!
//! The Orchestrator coordinates a complete experiment run:
//! - Validating the request before any async work
//! - Loading and merging judgment sets
//! - Fanning out one branch per configuration or hybrid variant
//! - Delivering exactly one outcome or failure per run
//!
//! # Example
//!
//! ```ignore
//! use relevance_bench_core::{ExperimentRequest, OrchestratorBuilder};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .judgment_store(store)
//!     .search_engine(engine)
//!     .build()?;
//!
//! let outcome = orchestrator
//!     .run_with_deadline(request, Duration::from_secs(30))
//!     .await?;
//! ```

mod aggregator;
mod builder;
mod executor;
mod hybrid;
mod listener;
mod scheduler;

pub use aggregator::{PointwiseAggregator, ResultAggregator};
pub use builder::OrchestratorBuilder;
pub use executor::{Orchestrator, RunHandle};
pub use hybrid::HybridOptimizer;
pub use listener::ChannelListener;
pub use scheduler::DeadlineScheduler;
