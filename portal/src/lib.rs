//! # Tempscore - portfolio front end for a temperature-scoring service
//!
//! Reads a portfolio spreadsheet, proposes how its columns map onto the
//! fields the scoring backend expects, sends the mapped portfolio with the
//! chosen settings, and turns the result into CSV downloads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Mapper    │────▶│   Payload   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (Levenshtein│     │  (renamed   │
//! └─────────────┘     └─────────────┘     │   greedy)   │     │   columns)  │
//!                                         └─────────────┘     └──────┬──────┘
//!                                                                    │
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐            │
//! │  CSV export │◀────│  Flattener  │◀────│   Scoring   │◀───────────┘
//! │             │     │             │     │   backend   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tempscore::{propose_mapping, Config};
//!
//! let config = Config::default();
//! let columns = ["ISIN", "company_nme", "weight"];
//! let mapping = propose_mapping(&columns, config.target_schema.fields(), config.similarity_threshold);
//! assert_eq!(mapping.target_for("company_nme"), Some("company_name"));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Defaults and environment overrides
//! - [`models`] - Records, target schema, settings, backend response
//! - [`parser`] - CSV parsing with auto-detection
//! - [`mapping`] - Mapping proposal, overrides and session state
//! - [`transform`] - Payload building, result navigation, export, pipeline
//! - [`client`] - Scoring backend client
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Mapping
pub mod mapping;

// Transformation
pub mod transform;

// Backend
pub mod client;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    Alert, AlertKind, ClientError, ConfigError, CsvError, ExportError, MappingError, PipelineError, ServerError,
};

// =============================================================================
// Re-exports - Configuration and models
// =============================================================================

pub use config::Config;
pub use models::{
    columns_of, AggregationMethod, DataProvider, EngagementType, Record, Scenario, ScenarioNumber, ScopeCategory,
    ScoreLeaf, ScoreResult, ScoringRequest, ScoringResponse, ScoringSettings, TargetSchema, TimeFrame,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, is_spreadsheet, parse_bytes, parse_file, ParseOptions,
    ParseResult,
};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{propose_mapping, rank_candidates, Candidate, Mapping, PortfolioSession, RequestTicket};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    build_request, export_csv, flatten_for_export, serialize_delimited, write_export, ExportKind, ScoreOutcome,
    ScoreSelection,
};

// =============================================================================
// Re-exports - Client
// =============================================================================

pub use client::ScoringClient;

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
