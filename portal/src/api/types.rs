//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::mapping::{Candidate, Mapping, PortfolioSession};
use crate::models::{AggregationMethod, Record, ScopeCategory, ScoringSettings, TimeFrame};
use crate::transform::pipeline::CsvInfo;

/// Everything a client needs to render the settings form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResponse {
    pub target_fields: Vec<String>,
    pub similarity_threshold: f64,
    pub available_columns: Vec<String>,
    pub aggregation_methods: Vec<AggregationMethod>,
    pub time_frames: Vec<TimeFrame>,
    pub scope_categories: Vec<ScopeCategory>,
    pub default_score: f64,
}

impl From<&Config> for OptionsResponse {
    fn from(config: &Config) -> Self {
        Self {
            target_fields: config.target_schema.fields().to_vec(),
            similarity_threshold: config.similarity_threshold,
            available_columns: config.available_columns(),
            aggregation_methods: AggregationMethod::ALL.to_vec(),
            time_frames: TimeFrame::ALL.to_vec(),
            scope_categories: ScopeCategory::ALL.to_vec(),
            default_score: config.default_score,
        }
    }
}

/// Response to an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub session_id: Uuid,
    pub csv_info: CsvInfo,
    pub columns: Vec<String>,
    pub mapping: Mapping,
    pub grouping_options: Vec<String>,
    pub portfolio: Vec<Record>,
}

impl ParseResponse {
    pub fn new(session: &PortfolioSession, csv_info: CsvInfo, available_columns: &[String]) -> Self {
        Self {
            session_id: session.id(),
            csv_info,
            columns: session.columns().to_vec(),
            mapping: session.mapping().clone(),
            grouping_options: session.grouping_options(available_columns),
            portfolio: session.portfolio().to_vec(),
        }
    }
}

/// Ask for a proposal over bare column names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRequest {
    pub columns: Vec<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Ranked targets for one column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnCandidates {
    pub column: String,
    pub candidates: Vec<Candidate>,
}

/// Proposal keyed by `columns`, the request's names made unique the way
/// the parser makes headers unique.
#[derive(Debug, Clone, Serialize)]
pub struct MappingResponse {
    pub columns: Vec<String>,
    pub mapping: Mapping,
    pub candidates: Vec<ColumnCandidates>,
}

/// Mapped portfolio plus settings to score.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequestBody {
    pub portfolio: Vec<Record>,
    pub mapping: Mapping,
    #[serde(default)]
    pub settings: ScoringSettings,
}

/// Rows to turn into a CSV download.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub rows: Vec<Record>,
}

/// Error body shared by all endpoints.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
