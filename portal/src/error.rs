//! Error types for the portfolio scoring front end.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - Spreadsheet parsing errors (defined in [`crate::parser`])
//! - [`MappingError`] - Rejected user overrides of a column mapping
//! - [`ClientError`] - Scoring backend communication errors
//! - [`ExportError`] - CSV export output errors
//! - [`ConfigError`] - Invalid configuration values
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::parser::CsvError;

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors raised when a user overrides a proposed mapping.
///
/// Proposing a mapping never fails; only manual edits are checked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The column is not part of the uploaded dataset.
    #[error("Unknown source column: {0}")]
    UnknownColumn(String),

    /// The target field is not part of the target schema.
    #[error("Unknown target field: {0}")]
    UnknownTarget(String),

    /// Another column already claims this target field.
    #[error("Target field '{target}' is already mapped from column '{column}'")]
    TargetAlreadyClaimed { target: String, column: String },
}

// =============================================================================
// Backend Client Errors
// =============================================================================

/// Errors from the scoring backend client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Severity of a user-facing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Technical error on the backend (HTTP 500): the inputs are likely wrong.
    Warning,
    /// Anything else.
    Danger,
}

/// A message for the alert channel of the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
}

impl ClientError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Categorize the error for display: technical error vs. unknown error.
    pub fn alert(&self) -> Alert {
        if self.status() == Some(500) {
            Alert {
                kind: AlertKind::Warning,
                message: "There was a technical error. Please check your inputs.".to_string(),
            }
        } else {
            Alert {
                kind: AlertKind::Danger,
                message: "An unknown error occurred.".to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::RequestFailed(e.to_string())
        }
    }
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing exported CSV files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// IO error.
    #[error("Export IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unknown export name.
    #[error("Unknown export kind: {0}")]
    UnknownKind(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    /// The target schema ended up empty.
    #[error("Target schema must contain at least one field")]
    EmptySchema,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Wraps all lower-level errors and adds pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Mapping override error.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Backend client error.
    #[error("Backend error: {0}")]
    Client(#[from] ClientError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No records to score.
    #[error("No portfolio records to score")]
    EmptyInput,

    /// The backend answered for an outdated request.
    #[error("Discarded stale response for request #{0}")]
    StaleResponse(u64),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for mapping overrides.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for backend client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
