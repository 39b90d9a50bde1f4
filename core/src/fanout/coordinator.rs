//! Concurrent dispatch of a run's branches and fan-in

use std::sync::Arc;
use std::time::Instant;

use crate::error::ExperimentError;
use crate::gate::{FailureGate, GateState};
use crate::orchestrator::ResultAggregator;
use crate::outcome::BranchRecord;

use super::accumulator::ResultAccumulator;
use super::barrier::FanInBarrier;
use super::branch::{Branch, RunContext, SearchConfigExecutor};

/// What happened to a fan-out, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanInReport {
    /// Branches spawned
    pub dispatched: usize,
    /// Branches that produced scores
    pub succeeded: usize,
    /// Branches that failed or were skipped
    pub failed: usize,
    /// Gate state after fan-in
    pub state: GateState,
}

/// Dispatches every branch as its own task and joins them on a barrier
#[derive(Debug, Clone)]
pub struct FanOutCoordinator {
    executor: Arc<SearchConfigExecutor>,
}

impl FanOutCoordinator {
    /// Create a coordinator over a branch executor
    pub fn new(executor: Arc<SearchConfigExecutor>) -> Self {
        Self { executor }
    }

    /// Run all branches and deliver the run's terminal notification
    ///
    /// A failing branch reports through the gate as soon as it fails and
    /// cancels the run so queued branches skip their search. The
    /// coordinator still waits for every branch before returning; results
    /// arriving after the gate closed are discarded.
    pub async fn run(
        &self,
        branches: Vec<Branch>,
        ctx: Arc<RunContext>,
        gate: Arc<FailureGate>,
        aggregator: Arc<dyn ResultAggregator>,
    ) -> FanInReport {
        if ctx.token.is_cancelled() {
            tracing::info!(
                experiment_id = %ctx.experiment_id,
                run_id = %ctx.run_id,
                "Run cancelled before dispatch"
            );
            gate.try_fail(ExperimentError::timeout(format!(
                "run {} cancelled before any search was dispatched",
                ctx.run_id
            )));
            return report(0, 0, &gate);
        }

        let keys = branches.iter().map(|b| b.key.clone()).collect();
        let accumulator = match ResultAccumulator::new(keys) {
            Ok(accumulator) => Arc::new(accumulator),
            Err(e) => {
                gate.try_fail(e);
                return report(0, 0, &gate);
            }
        };

        let start = Instant::now();
        let dispatched = branches.len();
        let barrier = Arc::new(FanInBarrier::new(dispatched));

        tracing::debug!(run_id = %ctx.run_id, branches = dispatched, "Dispatching branches");

        for (slot, branch) in branches.into_iter().enumerate() {
            let arrival = barrier.arrival();
            let executor = Arc::clone(&self.executor);
            let ctx = Arc::clone(&ctx);
            let gate = Arc::clone(&gate);
            let accumulator = Arc::clone(&accumulator);

            tokio::spawn(async move {
                let result = executor.execute(&branch, &ctx).await;

                if let Err(e) = &result.outcome {
                    if gate.try_fail(e.clone()) {
                        tracing::warn!(
                            run_id = %ctx.run_id,
                            branch = %branch.key,
                            error = %e,
                            "Branch failed, run aborted"
                        );
                        ctx.token.cancel();
                    } else {
                        tracing::debug!(run_id = %ctx.run_id, branch = %branch.key, error = %e, "Late branch failure discarded");
                    }
                }

                if let Err(e) = accumulator.record(slot, result) {
                    gate.try_fail(e);
                }
                drop(arrival);
            });
        }

        barrier.wait().await;

        if gate.is_closed() {
            tracing::debug!(
                run_id = %ctx.run_id,
                collected = accumulator.filled(),
                "Run already settled, discarding branch results"
            );
            return report(dispatched, accumulator.succeeded(), &gate);
        }

        let results = match accumulator.results() {
            Ok(results) => results,
            Err(e) => {
                gate.try_fail(e);
                return report(dispatched, 0, &gate);
            }
        };

        let mut records = Vec::with_capacity(results.len());
        for result in &results {
            match &result.outcome {
                Ok(evaluation) => records.push(BranchRecord {
                    key: result.key.clone(),
                    variant: result.variant.clone(),
                    metrics: evaluation.metrics.clone(),
                    doc_ids: evaluation.doc_ids.clone(),
                }),
                Err(e) => {
                    gate.try_fail(e.clone());
                    return report(dispatched, accumulator.succeeded(), &gate);
                }
            }
        }

        match aggregator.aggregate(&ctx, records) {
            Ok(outcome) => {
                gate.try_succeed(outcome);
            }
            Err(e) => {
                tracing::error!(run_id = %ctx.run_id, error = %e, "Aggregation failed");
                gate.try_fail(e);
            }
        }

        tracing::debug!(
            run_id = %ctx.run_id,
            branches = dispatched,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fan-in complete"
        );

        report(dispatched, accumulator.succeeded(), &gate)
    }
}

fn report(dispatched: usize, succeeded: usize, gate: &FailureGate) -> FanInReport {
    FanInReport {
        dispatched,
        succeeded,
        failed: dispatched - succeeded,
        state: gate.state(),
    }
}
