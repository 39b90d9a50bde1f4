//! Combining branch records into a run outcome

use chrono::Utc;

use crate::config::ExperimentType;
use crate::error::ExperimentResult;
use crate::fanout::RunContext;
use crate::outcome::{BranchRecord, ExperimentOutcome, OutcomeSummary};

/// Turns the key-ordered records of a fully successful fan-out into an outcome
pub trait ResultAggregator: Send + Sync {
    /// Experiment flavour this aggregator produces
    fn experiment_type(&self) -> ExperimentType;

    /// Build the outcome; `records` are sorted by branch key
    fn aggregate(
        &self,
        ctx: &RunContext,
        records: Vec<BranchRecord>,
    ) -> ExperimentResult<ExperimentOutcome>;
}

/// Per-configuration metrics, no selection
#[derive(Debug, Clone, Copy, Default)]
pub struct PointwiseAggregator;

impl ResultAggregator for PointwiseAggregator {
    fn experiment_type(&self) -> ExperimentType {
        ExperimentType::PointwiseEvaluation
    }

    fn aggregate(
        &self,
        ctx: &RunContext,
        records: Vec<BranchRecord>,
    ) -> ExperimentResult<ExperimentOutcome> {
        Ok(base_outcome(ctx, self.experiment_type(), records))
    }
}

/// Outcome with records and summary filled in and no hybrid selection
pub(crate) fn base_outcome(
    ctx: &RunContext,
    experiment_type: ExperimentType,
    records: Vec<BranchRecord>,
) -> ExperimentOutcome {
    let summary = OutcomeSummary::from_records(&records);
    ExperimentOutcome {
        experiment_id: ctx.experiment_id.clone(),
        run_id: ctx.run_id.clone(),
        query_text: ctx.query_text.clone(),
        experiment_type,
        results: records,
        hybrid: None,
        summary,
        completed_at: Utc::now(),
    }
}
