//! Merged rating surface built from one or more judgment sets

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::model::Judgment;

/// Ratings of one query: docId to rating
pub type QueryRatings = HashMap<String, f64>;

/// Resolution of a `(query, docId)` rated by more than one judgment set
///
/// Judgment sets are merged in the order the request lists them, never in
/// retrieval completion order, so both policies are deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Keep the rating from the earliest listed judgment set
    #[default]
    FirstSeen,
    /// Keep the rating from the latest listed judgment set
    LastSeen,
}

/// Union of all ratings of a run's judgment sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgmentRatingSet {
    ratings: HashMap<String, QueryRatings>,
    sources: Vec<String>,
    collisions: usize,
}

impl JudgmentRatingSet {
    /// Empty rating set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge judgment sets in the given order
    pub fn from_judgments<'a, I>(judgments: I, policy: MergePolicy) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Judgment)>,
    {
        let mut set = Self::new();
        for (judgment_id, judgment) in judgments {
            set.merge(judgment_id, judgment, policy);
        }
        set
    }

    /// Merge one judgment set into this one
    pub fn merge(&mut self, judgment_id: &str, judgment: &Judgment, policy: MergePolicy) {
        for query_judgment in &judgment.judgment_ratings {
            let query = self
                .ratings
                .entry(query_judgment.query.trim().to_string())
                .or_default();
            for rating in &query_judgment.ratings {
                match query.get_mut(&rating.doc_id) {
                    Some(existing) => {
                        self.collisions += 1;
                        if policy == MergePolicy::LastSeen {
                            *existing = rating.rating;
                        }
                    }
                    None => {
                        query.insert(rating.doc_id.clone(), rating.rating);
                    }
                }
            }
        }
        self.sources.push(judgment_id.to_string());
    }

    /// Ratings for a query, if any judgment covers it
    pub fn for_query(&self, query: &str) -> Option<&QueryRatings> {
        self.ratings.get(query.trim())
    }

    /// Rating of one `(query, docId)` pair
    pub fn rating(&self, query: &str, doc_id: &str) -> Option<f64> {
        self.for_query(query)?.get(doc_id).copied()
    }

    /// Number of distinct `(query, docId)` pairs
    pub fn len(&self) -> usize {
        self.ratings.values().map(|q| q.len()).sum()
    }

    /// Check if no rating was merged
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct queries
    pub fn query_count(&self) -> usize {
        self.ratings.len()
    }

    /// Judgment ids merged, in merge order
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Number of ratings that collided with an earlier one
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
