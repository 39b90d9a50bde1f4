//! Concurrent retrieval and merge of a run's judgment sets

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::{ExperimentError, ExperimentResult};
use crate::traits::{JudgmentStore, StoreError};

use super::model::Judgment;
use super::ratings::{JudgmentRatingSet, MergePolicy};

/// Loads every judgment set of a run and merges them into one rating surface
pub struct JudgmentLoader {
    store: Arc<dyn JudgmentStore>,
    policy: MergePolicy,
}

impl JudgmentLoader {
    /// Create a loader over a store
    pub fn new(store: Arc<dyn JudgmentStore>, policy: MergePolicy) -> Self {
        Self { store, policy }
    }

    /// Collision policy in use
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Retrieve all judgment sets concurrently and merge them
    ///
    /// Returns on the first failed retrieval. Retrievals still in flight keep
    /// running on the runtime and their results are dropped.
    pub async fn load(&self, judgment_ids: &[String]) -> ExperimentResult<JudgmentRatingSet> {
        let start = Instant::now();
        let mut pending = FuturesUnordered::new();

        for (position, judgment_id) in judgment_ids.iter().enumerate() {
            let store = Arc::clone(&self.store);
            let id = judgment_id.clone();
            let handle = tokio::spawn(async move { store.get_judgment(&id).await });
            let id = judgment_id.clone();
            pending.push(async move { (position, id, handle.await) });
        }

        let mut loaded: Vec<Option<Judgment>> = vec![None; judgment_ids.len()];
        while let Some((position, judgment_id, joined)) = pending.next().await {
            let judgment = match joined {
                Ok(Ok(judgment)) => judgment,
                Ok(Err(e)) => {
                    tracing::warn!(
                        judgment_id = %judgment_id,
                        store = self.store.store_name(),
                        error = %e,
                        "Judgment retrieval failed"
                    );
                    return Err(store_error(&judgment_id, e));
                }
                Err(e) => {
                    tracing::error!(judgment_id = %judgment_id, error = %e, "Judgment task panicked");
                    return Err(ExperimentError::internal(format!(
                        "judgment retrieval for {judgment_id} aborted: {e}"
                    )));
                }
            };

            if !judgment.status.is_usable() {
                return Err(ExperimentError::judgment_store(format!(
                    "judgment {judgment_id} is not usable (status {})",
                    judgment.status
                )));
            }

            tracing::debug!(
                judgment_id = %judgment_id,
                ratings = judgment.rating_count(),
                "Judgment loaded"
            );
            loaded[position] = Some(judgment);
        }

        // Merge in list order, independent of completion order.
        let mut set = JudgmentRatingSet::new();
        for (judgment_id, judgment) in judgment_ids.iter().zip(&loaded) {
            let judgment = judgment.as_ref().ok_or_else(|| {
                ExperimentError::internal(format!("judgment {judgment_id} missing after load"))
            })?;
            set.merge(judgment_id, judgment, self.policy);
        }

        tracing::debug!(
            judgments = judgment_ids.len(),
            queries = set.query_count(),
            ratings = set.len(),
            collisions = set.collisions(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Judgments merged"
        );

        Ok(set)
    }
}

fn store_error(judgment_id: &str, error: StoreError) -> ExperimentError {
    if error.is_not_found() {
        ExperimentError::judgment_not_found(judgment_id)
    } else {
        ExperimentError::new(error.to_error_kind(), format!("judgment {judgment_id}: {error}"))
    }
}

impl std::fmt::Debug for JudgmentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgmentLoader")
            .field("store", &self.store.store_name())
            .field("policy", &self.policy)
            .finish()
    }
}
