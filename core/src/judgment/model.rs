//! Judgment documents as stored in the judgment index

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a judgment set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgmentStatus {
    /// Ratings are complete and usable
    #[default]
    Completed,
    /// Ratings are still being generated
    Processing,
    /// Generation failed
    Error,
    /// Generation timed out
    Timeout,
}

impl JudgmentStatus {
    /// Check if the judgment can be used for scoring
    pub fn is_usable(&self) -> bool {
        matches!(self, JudgmentStatus::Completed)
    }
}

impl std::fmt::Display for JudgmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JudgmentStatus::Completed => write!(f, "COMPLETED"),
            JudgmentStatus::Processing => write!(f, "PROCESSING"),
            JudgmentStatus::Error => write!(f, "ERROR"),
            JudgmentStatus::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// A named set of relevance ratings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judgment {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// How the ratings were produced (e.g. `IMPORT_JUDGMENT`, `LLM_JUDGMENT`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub judgment_type: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: JudgmentStatus,

    /// Ratings grouped by query
    #[serde(default)]
    pub judgment_ratings: Vec<QueryJudgment>,
}

impl Judgment {
    /// Completed judgment with the given ratings
    pub fn new(name: impl Into<String>, judgment_ratings: Vec<QueryJudgment>) -> Self {
        Self {
            name: name.into(),
            judgment_type: None,
            status: JudgmentStatus::Completed,
            judgment_ratings,
        }
    }

    /// Number of `(query, docId)` ratings
    pub fn rating_count(&self) -> usize {
        self.judgment_ratings.iter().map(|q| q.ratings.len()).sum()
    }
}

/// Ratings for one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryJudgment {
    /// Query text the ratings apply to
    pub query: String,

    /// Per-document ratings
    #[serde(default)]
    pub ratings: Vec<DocRating>,
}

impl QueryJudgment {
    /// Ratings for `query` from `(docId, rating)` pairs
    pub fn new(query: impl Into<String>, ratings: &[(&str, f64)]) -> Self {
        Self {
            query: query.into(),
            ratings: ratings
                .iter()
                .map(|(doc_id, rating)| DocRating {
                    doc_id: doc_id.to_string(),
                    rating: *rating,
                })
                .collect(),
        }
    }
}

/// Rating of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocRating {
    /// Document id
    pub doc_id: String,

    /// Rating value; stored either as a number or a numeric string
    #[serde(deserialize_with = "rating_from_number_or_string")]
    pub rating: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRating {
    Number(f64),
    Text(String),
}

fn rating_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawRating::deserialize(deserializer)? {
        RawRating::Number(value) => Ok(value),
        RawRating::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid rating {text:?}"))),
    }
}
