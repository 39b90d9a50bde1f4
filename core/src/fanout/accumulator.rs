//! Write-once per-branch result slots

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{ExperimentError, ExperimentResult};

use super::branch::{BranchKey, BranchResult};

/// Collects one result per branch without a fan-out wide lock
///
/// Slot `i` belongs to the `i`-th dispatched branch and is written at most
/// once. Results are read back only after every branch arrived at the
/// fan-in barrier.
#[derive(Debug)]
pub struct ResultAccumulator {
    keys: Vec<BranchKey>,
    slots: Vec<OnceLock<BranchResult>>,
}

impl ResultAccumulator {
    /// Create one empty slot per key
    pub fn new(keys: Vec<BranchKey>) -> ExperimentResult<Self> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key) {
                return Err(ExperimentError::invalid_request(format!(
                    "duplicate branch key {key}"
                )));
            }
        }
        let slots = keys.iter().map(|_| OnceLock::new()).collect();
        Ok(Self { keys, slots })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots written so far
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }

    /// Number of slots holding scores
    pub fn succeeded(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.get().is_some_and(|r| r.is_ok()))
            .count()
    }

    /// Store the result of the branch owning `slot`
    pub fn record(&self, slot: usize, result: BranchResult) -> ExperimentResult<()> {
        let expected = self
            .keys
            .get(slot)
            .ok_or_else(|| ExperimentError::internal(format!("no result slot {slot}")))?;
        if *expected != result.key {
            return Err(ExperimentError::internal(format!(
                "slot {slot} belongs to {expected}, not {}",
                result.key
            )));
        }
        self.slots[slot]
            .set(result)
            .map_err(|r| ExperimentError::internal(format!("result for {} recorded twice", r.key)))
    }

    /// All results ordered by branch key
    ///
    /// Fails if a branch never recorded a result.
    pub fn results(&self) -> ExperimentResult<Vec<BranchResult>> {
        let mut results = Vec::with_capacity(self.slots.len());
        for (key, slot) in self.keys.iter().zip(&self.slots) {
            let result = slot
                .get()
                .ok_or_else(|| ExperimentError::internal(format!("branch {key} produced no result")))?;
            results.push(result.clone());
        }
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fanout::BranchEvaluation;
    use crate::metrics::Metrics;
    use std::sync::Arc;

    fn ok(key: BranchKey) -> BranchResult {
        BranchResult {
            key,
            variant: None,
            outcome: Ok(BranchEvaluation {
                metrics: Metrics::new(),
                doc_ids: vec![],
            }),
        }
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let err = ResultAccumulator::new(vec![BranchKey::config("a"), BranchKey::config("a")])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_results_sorted_by_key() {
        let keys = vec![
            BranchKey::config("c"),
            BranchKey::variant("a", 1),
            BranchKey::config("b"),
            BranchKey::variant("a", 0),
        ];
        let acc = ResultAccumulator::new(keys.clone()).unwrap();
        for (slot, key) in keys.into_iter().enumerate().rev() {
            acc.record(slot, ok(key)).unwrap();
        }

        let order: Vec<String> = acc.results().unwrap().iter().map(|r| r.key.to_string()).collect();
        assert_eq!(order, vec!["a#0", "a#1", "b", "c"]);
    }

    #[test]
    fn test_slot_written_once() {
        let acc = ResultAccumulator::new(vec![BranchKey::config("a")]).unwrap();
        acc.record(0, ok(BranchKey::config("a"))).unwrap();

        let err = acc.record(0, ok(BranchKey::config("a"))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(acc.filled(), 1);
    }

    #[test]
    fn test_wrong_slot_rejected() {
        let acc = ResultAccumulator::new(vec![BranchKey::config("a")]).unwrap();
        assert!(acc.record(1, ok(BranchKey::config("a"))).is_err());
        assert!(acc.record(0, ok(BranchKey::config("b"))).is_err());
    }

    #[test]
    fn test_missing_result_reported() {
        let acc = ResultAccumulator::new(vec![BranchKey::config("a"), BranchKey::config("b")]).unwrap();
        acc.record(0, ok(BranchKey::config("a"))).unwrap();

        let err = acc.results().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.contains('b'));
    }

    #[test]
    fn test_concurrent_records() {
        let keys: Vec<BranchKey> = (0..64).map(|i| BranchKey::variant("cfg", i)).collect();
        let acc = Arc::new(ResultAccumulator::new(keys.clone()).unwrap());

        std::thread::scope(|scope| {
            for (slot, key) in keys.into_iter().enumerate() {
                let acc = &acc;
                scope.spawn(move || acc.record(slot, ok(key)).unwrap());
            }
        });

        let results = acc.results().unwrap();
        assert_eq!(results.len(), 64);
        assert_eq!(results[10].key, BranchKey::variant("cfg", 10));
    }
}
