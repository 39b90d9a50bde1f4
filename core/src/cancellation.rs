//! Cooperative cancellation for a single experiment run

use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation flag shared by every branch of one run
///
/// Starts uncancelled and flips to cancelled at most once. Cancelling does
/// not interrupt collaborator calls already in flight; branches observe it at
/// their next checkpoint.
#[derive(Debug)]
pub struct CancellationToken {
    experiment_id: String,
    cancelled: AtomicBool,
}

impl CancellationToken {
    /// Create a token for the given experiment
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        let transitioned = self
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if transitioned {
            tracing::debug!(experiment_id = %self.experiment_id, "Experiment cancellation requested");
        }
        transitioned
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Experiment this token belongs to
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_token_starts_uncancelled() {
        let token = CancellationToken::new("exp1");
        assert!(!token.is_cancelled());
        assert_eq!(token.experiment_id(), "exp1");
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new("exp1");
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_concurrent_cancel_transitions_once() {
        let token = Arc::new(CancellationToken::new("exp1"));
        let transitions = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    if token.cancel() {
                        transitions.fetch_add(1, Ordering::SeqCst);
                    }
                    assert!(token.is_cancelled());
                });
            }
        });

        assert_eq!(transitions.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
    }
}
