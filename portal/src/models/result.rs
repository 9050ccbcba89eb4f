//! Scoring backend response.
//!
//! The nested score structure is kept as received (schema-on-read): key
//! order is preserved and leaves are only decoded when looked up, since
//! time frames are not guaranteed to share the same groups.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Record;

/// One contribution entry of a score leaf: attribute to value.
pub type Contribution = Map<String, Value>;

/// Nested scores: time frame -> group -> item -> leaf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreResult(pub Map<String, Value>);

/// A single score with its contribution breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreLeaf {
    pub score: f64,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
}

/// Full body returned by the scoring endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResponse {
    #[serde(default)]
    pub aggregated_scores: ScoreResult,
    #[serde(default)]
    pub companies: Vec<Record>,
    /// Percentage (0 to 100) of the portfolio with a known target.
    #[serde(default)]
    pub coverage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_distribution: Option<Map<String, Value>>,
}

impl ScoringResponse {
    /// Fallback used when the backend call fails, so callers keep working.
    pub fn empty() -> Self {
        Self {
            aggregated_scores: ScoreResult::default(),
            companies: Vec::new(),
            coverage: 0.0,
            scores: None,
            feature_distribution: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.aggregated_scores.0.is_empty() && self.companies.is_empty()
    }
}
