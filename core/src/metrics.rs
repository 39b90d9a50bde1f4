//! Relevance metrics over ranked hits
//!
//! [`EvaluationScorer`] is the default [`MetricScorer`]. It reports, at a
//! cutoff `k` equal to the request size:
//!
//! - `Coverage@k`: share of returned hits that carry any rating
//! - `Precision@k`: share of returned hits rated above zero
//! - `MAP@k`: average precision over relevant hits returned
//! - `NDCG@k`: DCG with `2^rel - 1` gains over the ideal DCG of all known ratings
//!
//! A document returned more than once counts only at its first rank.

use std::collections::{BTreeMap, HashSet};

use crate::judgment::QueryRatings;
use crate::traits::{MetricScorer, SearchHit};

/// Metric name to value, ordered by name
pub type Metrics = BTreeMap<String, f64>;

/// Coverage metric prefix
pub const COVERAGE: &str = "Coverage";
/// Precision metric prefix
pub const PRECISION: &str = "Precision";
/// Mean average precision metric prefix
pub const MAP: &str = "MAP";
/// Normalized discounted cumulative gain metric prefix
pub const NDCG: &str = "NDCG";

/// Full metric name at cutoff `k`, e.g. `NDCG@10`
pub fn metric_name(metric: &str, k: usize) -> String {
    format!("{metric}@{k}")
}

/// Default relevance scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationScorer;

impl MetricScorer for EvaluationScorer {
    fn name(&self) -> &str {
        "evaluation"
    }

    fn score(&self, hits: &[SearchHit], ratings: Option<&QueryRatings>, size: usize) -> Metrics {
        let top = distinct_top(hits, size);
        let top = top.as_slice();
        let mut metrics = Metrics::new();
        metrics.insert(metric_name(COVERAGE, size), coverage(top, ratings));
        metrics.insert(metric_name(PRECISION, size), precision(top, ratings));
        metrics.insert(metric_name(MAP, size), average_precision(top, ratings));
        metrics.insert(metric_name(NDCG, size), ndcg(top, ratings, size));
        metrics
    }
}

/// First `size` hits with repeated doc ids dropped
fn distinct_top(hits: &[SearchHit], size: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|h| seen.insert(h.doc_id.as_str()))
        .take(size)
        .cloned()
        .collect()
}

fn rating_of(hit: &SearchHit, ratings: Option<&QueryRatings>) -> Option<f64> {
    ratings.and_then(|r| r.get(&hit.doc_id).copied())
}

fn is_relevant(hit: &SearchHit, ratings: Option<&QueryRatings>) -> bool {
    rating_of(hit, ratings).is_some_and(|r| r > 0.0)
}

/// Share of hits with a rating
pub fn coverage(hits: &[SearchHit], ratings: Option<&QueryRatings>) -> f64 {
    if hits.is_empty() {
        return 0.0;
    }
    let rated = hits
        .iter()
        .filter(|h| rating_of(h, ratings).is_some())
        .count();
    rated as f64 / hits.len() as f64
}

/// Share of hits rated above zero
pub fn precision(hits: &[SearchHit], ratings: Option<&QueryRatings>) -> f64 {
    if hits.is_empty() {
        return 0.0;
    }
    let relevant = hits.iter().filter(|h| is_relevant(h, ratings)).count();
    relevant as f64 / hits.len() as f64
}

/// Mean of precision values at each relevant rank
pub fn average_precision(hits: &[SearchHit], ratings: Option<&QueryRatings>) -> f64 {
    let mut relevant_so_far = 0usize;
    let mut sum = 0.0;
    for (rank, hit) in hits.iter().enumerate() {
        if is_relevant(hit, ratings) {
            relevant_so_far += 1;
            sum += relevant_so_far as f64 / (rank + 1) as f64;
        }
    }
    if relevant_so_far == 0 {
        0.0
    } else {
        sum / relevant_so_far as f64
    }
}

fn gain(rating: f64) -> f64 {
    2f64.powf(rating) - 1.0
}

fn discount(rank: usize) -> f64 {
    ((rank + 2) as f64).log2()
}

/// NDCG at cutoff `k` against the ideal ordering of all known ratings
pub fn ndcg(hits: &[SearchHit], ratings: Option<&QueryRatings>, k: usize) -> f64 {
    let Some(known) = ratings else {
        return 0.0;
    };

    let dcg: f64 = hits
        .iter()
        .take(k)
        .enumerate()
        .map(|(rank, hit)| gain(rating_of(hit, ratings).unwrap_or(0.0)) / discount(rank))
        .sum();

    let mut ideal: Vec<f64> = known.values().copied().filter(|r| *r > 0.0).collect();
    ideal.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let idcg: f64 = ideal
        .iter()
        .take(k)
        .enumerate()
        .map(|(rank, rating)| gain(*rating) / discount(rank))
        .sum();

    if idcg > 0.0 {
        dcg / idcg
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(ids: &[&str]) -> Vec<SearchHit> {
        ids.iter().map(|id| SearchHit::new(*id)).collect()
    }

    fn ratings(pairs: &[(&str, f64)]) -> QueryRatings {
        pairs.iter().map(|(d, r)| (d.to_string(), *r)).collect()
    }

    #[test]
    fn test_metric_name() {
        assert_eq!(metric_name(NDCG, 10), "NDCG@10");
    }

    #[test]
    fn test_scores_mixed_ranking() {
        let ratings = ratings(&[("a", 2.0), ("c", 1.0), ("d", 3.0)]);
        let metrics = EvaluationScorer.score(&hits(&["a", "b", "c"]), Some(&ratings), 3);

        assert!((metrics["Coverage@3"] - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics["Precision@3"] - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics["MAP@3"] - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-9);
        // DCG = 3 + 0.5; IDCG = 7 + 3/log2(3) + 0.5
        assert!((metrics["NDCG@3"] - 0.3726).abs() < 1e-3);
    }

    #[test]
    fn test_scores_perfect_ranking() {
        let ratings = ratings(&[("a", 3.0), ("b", 2.0), ("c", 1.0)]);
        let metrics = EvaluationScorer.score(&hits(&["a", "b", "c"]), Some(&ratings), 3);

        assert_eq!(metrics["Precision@3"], 1.0);
        assert_eq!(metrics["MAP@3"], 1.0);
        assert!((metrics["NDCG@3"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_rating_is_covered_but_not_relevant() {
        let ratings = ratings(&[("a", 0.0)]);
        let top = hits(&["a"]);
        assert_eq!(coverage(&top, Some(&ratings)), 1.0);
        assert_eq!(precision(&top, Some(&ratings)), 0.0);
        assert_eq!(ndcg(&top, Some(&ratings), 1), 0.0);
    }

    #[test]
    fn test_hits_truncated_to_size() {
        let ratings = ratings(&[("c", 1.0)]);
        let metrics = EvaluationScorer.score(&hits(&["a", "b", "c"]), Some(&ratings), 2);

        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics["Precision@2"], 0.0);
        assert_eq!(metrics["Coverage@2"], 0.0);
    }

    #[test]
    fn test_repeated_hits_count_once() {
        let ratings = ratings(&[("a", 3.0), ("b", 1.0)]);
        let metrics = EvaluationScorer.score(&hits(&["a", "a", "a", "b"]), Some(&ratings), 3);

        assert!(metrics["NDCG@3"] <= 1.0);
        assert!((metrics["NDCG@3"] - 1.0).abs() < 1e-9);
        assert_eq!(metrics["Precision@3"], 1.0);
        assert_eq!(metrics["Coverage@3"], 1.0);
    }

    #[test]
    fn test_no_ratings_and_no_hits() {
        let metrics = EvaluationScorer.score(&[], None, 10);
        assert!(metrics.values().all(|v| *v == 0.0));

        let metrics = EvaluationScorer.score(&hits(&["a"]), None, 10);
        assert!(metrics.values().all(|v| *v == 0.0));
    }
}
