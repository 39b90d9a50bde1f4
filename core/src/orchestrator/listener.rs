//! Listener bridging the callback contract to a future

use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::{ExperimentError, ExperimentResult};
use crate::outcome::ExperimentOutcome;
use crate::traits::ExperimentListener;

/// Forwards the terminal notification into a oneshot channel
#[derive(Debug)]
pub struct ChannelListener {
    tx: Mutex<Option<oneshot::Sender<ExperimentResult<ExperimentOutcome>>>>,
}

impl ChannelListener {
    /// Listener and the receiver of its single notification
    pub fn new() -> (Self, oneshot::Receiver<ExperimentResult<ExperimentOutcome>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn deliver(&self, result: ExperimentResult<ExperimentOutcome>) {
        let sender = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                if tx.send(result).is_err() {
                    tracing::debug!("Run result receiver dropped");
                }
            }
            None => tracing::warn!("Listener notified more than once"),
        }
    }
}

impl ExperimentListener for ChannelListener {
    fn on_response(&self, outcome: ExperimentOutcome) {
        self.deliver(Ok(outcome));
    }

    fn on_failure(&self, error: ExperimentError) {
        self.deliver(Err(error));
    }
}
