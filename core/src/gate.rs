//! First-failure-wins delivery guard
//!
//! The gate owns a run's listener. Every terminal notification goes through
//! it, and a single compare-and-swap on the gate state decides which one
//! reaches the listener.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::ExperimentError;
use crate::outcome::ExperimentOutcome;
use crate::traits::ExperimentListener;

const OPEN: u8 = 0;
const FAILED: u8 = 1;
const SUCCEEDED: u8 = 2;

/// Observable gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing delivered yet
    Open,
    /// A failure was delivered
    Failed,
    /// A success was delivered
    Succeeded,
}

/// Exactly-once notification guard for one run
pub struct FailureGate {
    state: AtomicU8,
    listener: Arc<dyn ExperimentListener>,
}

impl FailureGate {
    /// Wrap a listener
    pub fn new(listener: Arc<dyn ExperimentListener>) -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            listener,
        }
    }

    /// Attempt to deliver a failure
    ///
    /// Returns `true` if this call won the race and notified the listener.
    pub fn try_fail(&self, error: ExperimentError) -> bool {
        match self
            .state
            .compare_exchange(OPEN, FAILED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.listener.on_failure(error);
                true
            }
            Err(_) => {
                tracing::debug!(error = %error, "Gate already closed, discarding failure");
                false
            }
        }
    }

    /// Attempt to deliver a success
    ///
    /// Succeeds only if no failure (and no earlier success) was delivered.
    pub fn try_succeed(&self, outcome: ExperimentOutcome) -> bool {
        match self
            .state
            .compare_exchange(OPEN, SUCCEEDED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.listener.on_response(outcome);
                true
            }
            Err(_) => {
                tracing::debug!(run_id = %outcome.run_id, "Gate already closed, discarding result");
                false
            }
        }
    }

    /// Current state
    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            OPEN => GateState::Open,
            FAILED => GateState::Failed,
            _ => GateState::Succeeded,
        }
    }

    /// Check whether a notification was already delivered
    pub fn is_closed(&self) -> bool {
        self.state() != GateState::Open
    }
}

impl std::fmt::Debug for FailureGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureGate")
            .field("state", &self.state())
            .finish()
    }
}
