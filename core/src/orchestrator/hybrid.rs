//! Hybrid search parameter sweep
//!
//! A configuration whose query combines exactly two sub-queries under a
//! `hybrid` clause is expanded into one branch per [`HybridVariant`]
//! (normalization × combination × weights). After fan-in the optimizer
//! picks, per configuration and metric, the best scoring variant.

use std::collections::BTreeMap;

use crate::config::{ExperimentType, HybridOptimizerOptions, SearchConfigurationDetails};
use crate::error::ExperimentResult;
use crate::fanout::{Branch, RunContext};
use crate::outcome::{BranchRecord, ExperimentOutcome, HybridSelection};

use super::aggregator::{base_outcome, ResultAggregator};

/// Expands hybrid configurations and selects the best variants
#[derive(Debug, Clone, Default)]
pub struct HybridOptimizer {
    options: HybridOptimizerOptions,
}

impl HybridOptimizer {
    /// Optimizer sweeping `options`
    pub fn new(options: HybridOptimizerOptions) -> Self {
        Self { options }
    }

    /// Parameter space
    pub fn options(&self) -> &HybridOptimizerOptions {
        &self.options
    }

    /// One branch per variant of every hybrid configuration
    ///
    /// Configurations without a hybrid query run as a single plain branch.
    pub fn expand(&self, configs: &BTreeMap<String, SearchConfigurationDetails>) -> Vec<Branch> {
        let variants = self.options.variants();
        let mut branches = Vec::new();
        for (config_id, config) in configs {
            if !config.is_hybrid_query() {
                tracing::debug!(config_id = %config_id, "No hybrid clause, running configuration as is");
                branches.push(Branch::new(config_id.clone(), config.clone()));
                continue;
            }
            for (index, variant) in variants.iter().enumerate() {
                branches.push(Branch::with_variant(
                    config_id.clone(),
                    config.clone(),
                    index,
                    variant.clone(),
                ));
            }
        }
        branches
    }

    /// Best variant per configuration and metric
    ///
    /// Ties go to the lowest variant index. NaN values never win.
    pub fn select(&self, records: &[BranchRecord]) -> Vec<HybridSelection> {
        let mut best: BTreeMap<(&str, &str), (&BranchRecord, f64)> = BTreeMap::new();
        for record in records {
            if record.variant.is_none() {
                continue;
            }
            for (metric, value) in &record.metrics {
                if value.is_nan() {
                    continue;
                }
                let slot = (record.key.config_id.as_str(), metric.as_str());
                match best.get(&slot) {
                    Some((current, current_value))
                        if *current_value > *value
                            || (*current_value == *value && current.key <= record.key) => {}
                    _ => {
                        best.insert(slot, (record, *value));
                    }
                }
            }
        }

        best.into_iter()
            .filter_map(|((config_id, metric), (record, value))| {
                Some(HybridSelection {
                    config_id: config_id.to_string(),
                    metric: metric.to_string(),
                    best_key: record.key.clone(),
                    variant: record.variant.clone()?,
                    value,
                })
            })
            .collect()
    }
}

impl ResultAggregator for HybridOptimizer {
    fn experiment_type(&self) -> ExperimentType {
        ExperimentType::HybridOptimizer
    }

    fn aggregate(
        &self,
        ctx: &RunContext,
        records: Vec<BranchRecord>,
    ) -> ExperimentResult<ExperimentOutcome> {
        let selections = self.select(&records);
        tracing::debug!(
            run_id = %ctx.run_id,
            variants = records.len(),
            selections = selections.len(),
            "Hybrid variants ranked"
        );
        let mut outcome = base_outcome(ctx, self.experiment_type(), records);
        outcome.hybrid = Some(selections);
        Ok(outcome)
    }
}
