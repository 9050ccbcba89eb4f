//! Domain models shared by the mapper, the transformer and the HTTP layer.
//!
//! - [`Record`] - One spreadsheet row, column name to cell value
//! - [`TargetSchema`] - Canonical field names the scoring backend expects
//! - [`ScoringSettings`] / [`ScoringRequest`] - Outbound scoring payload
//! - [`ScoringResponse`] / [`ScoreResult`] - Backend answer

pub mod result;
pub mod settings;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use result::{Contribution, ScoreLeaf, ScoreResult, ScoringResponse};
pub use settings::{
    AggregationMethod, DataProvider, EngagementType, Scenario, ScenarioNumber, ScopeCategory,
    ScoringRequest, ScoringSettings, TimeFrame,
};

// =============================================================================
// Records
// =============================================================================

/// One row of a dataset: column name to cell value, in column order.
///
/// Cells are JSON values: text, number, boolean or null.
pub type Record = Map<String, Value>;

/// Column names of a dataset, taken from the first record's keys.
pub fn columns_of(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default()
}

// =============================================================================
// Target Schema
// =============================================================================

/// Ordered, duplicate-free list of canonical field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TargetSchema {
    fields: Vec<String>,
}

impl TargetSchema {
    /// Build a schema; repeated names keep their first position.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for TargetSchema {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TARGET_FIELDS.iter().copied())
    }
}

impl From<Vec<String>> for TargetSchema {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl From<TargetSchema> for Vec<String> {
    fn from(schema: TargetSchema) -> Self {
        schema.fields
    }
}
