//! Judgment sets: document model, merged ratings, loading
//!
//! A run names one or more judgment sets. [`JudgmentLoader`] fetches them
//! concurrently from a [`JudgmentStore`](crate::traits::JudgmentStore) and
//! merges them into a [`JudgmentRatingSet`] that every branch scores against.

mod loader;
mod model;
mod ratings;
mod store;

pub use loader::JudgmentLoader;
pub use model::{DocRating, Judgment, JudgmentStatus, QueryJudgment};
pub use ratings::{JudgmentRatingSet, MergePolicy, QueryRatings};
pub use store::FileJudgmentStore;

#[cfg(test)]
mod tests;
