//! Branch fan-out and fan-in
//!
//! Every search configuration (or hybrid variant) of a run becomes a
//! [`Branch`]. The [`FanOutCoordinator`] spawns one task per branch, each
//! driven by a [`SearchConfigExecutor`], collects results in a
//! [`ResultAccumulator`] and joins on a [`FanInBarrier`].

mod accumulator;
mod barrier;
mod branch;
mod coordinator;
mod rate_limiter;

pub use accumulator::ResultAccumulator;
pub use barrier::{ArrivalGuard, FanInBarrier};
pub use branch::{
    Branch, BranchEvaluation, BranchKey, BranchResult, RunContext, SearchConfigExecutor,
};
pub use coordinator::{FanInReport, FanOutCoordinator};
pub use rate_limiter::SearchRateLimiter;
