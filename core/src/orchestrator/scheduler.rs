//! Deadline enforcement outside the pipeline

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cancellation::CancellationToken;

/// Cancels a run's token once its deadline elapses
///
/// The timer is aborted when the scheduler is dropped, so a run that
/// settles early leaves nothing behind.
#[derive(Debug)]
pub struct DeadlineScheduler {
    deadline: Duration,
    handle: JoinHandle<()>,
}

impl DeadlineScheduler {
    /// Start the timer for `token`
    pub fn arm(token: Arc<CancellationToken>, deadline: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if token.cancel() {
                tracing::info!(
                    experiment_id = %token.experiment_id(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Deadline reached, cancelling run"
                );
            }
        });
        Self { deadline, handle }
    }

    /// Configured deadline
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Check whether the timer has fired (or was aborted)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DeadlineScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
