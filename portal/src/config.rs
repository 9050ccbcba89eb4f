//! Application configuration.
//!
//! Compiled defaults, overridable from the environment (a `.env` file is
//! loaded first when present).

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::models::TargetSchema;

/// Scoring backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Canonical fields the scoring backend expects.
pub const DEFAULT_TARGET_FIELDS: [&str; 4] = [
    "company_id",
    "company_name",
    "portfolio_weight",
    "investment_value",
];

/// A proposal is accepted when the edit distance is strictly below this.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 5.0;

/// Score applied to companies without a disclosed target.
pub const DEFAULT_SCORE: f64 = 3.2;

/// Maximum file size for upload (in bytes).
///
/// 50 MB limit.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Columns the backend can group by or include, before the unmapped
/// columns of an upload are appended.
pub const AVAILABLE_COLUMNS: [&str; 18] = [
    "company_id",
    "industry",
    "s1s2_emissions",
    "s3_emissions",
    "portfolio_weight",
    "market_cap",
    "investment_value",
    "company_enterprise_value",
    "company_ev_plus_cash",
    "company_total_assets",
    "target_reference_number",
    "scope",
    "base_year",
    "start_year",
    "target_year",
    "reduction_from_base_year",
    "emissions_in_scope",
    "achieved_reduction",
];

const ENV_BACKEND_URL: &str = "TEMPSCORE_BACKEND_URL";
const ENV_TARGET_FIELDS: &str = "TEMPSCORE_TARGET_FIELDS";
const ENV_THRESHOLD: &str = "TEMPSCORE_SIMILARITY_THRESHOLD";
const ENV_SKIP_ROWS: &str = "TEMPSCORE_SKIP_ROWS";
const ENV_DEFAULT_SCORE: &str = "TEMPSCORE_DEFAULT_SCORE";
const ENV_STATIC_DIR: &str = "TEMPSCORE_STATIC_DIR";

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub target_schema: TargetSchema,
    pub similarity_threshold: f64,
    /// Lines dropped before the header row of an upload.
    pub skip_rows: usize,
    pub default_score: f64,
    /// Directory with a browser UI to serve at `/`.
    pub static_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            target_schema: TargetSchema::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            skip_rows: 0,
            default_score: DEFAULT_SCORE,
            static_dir: None,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BACKEND_URL) {
            config.backend_url = url.trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup(ENV_TARGET_FIELDS) {
            let schema = TargetSchema::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty()),
            );
            if schema.is_empty() {
                return Err(ConfigError::EmptySchema);
            }
            config.target_schema = schema;
        }

        if let Some(raw) = lookup(ENV_THRESHOLD) {
            config.similarity_threshold = parse_value(ENV_THRESHOLD, &raw)?;
        }

        if let Some(raw) = lookup(ENV_SKIP_ROWS) {
            config.skip_rows = parse_value(ENV_SKIP_ROWS, &raw)?;
        }

        if let Some(raw) = lookup(ENV_DEFAULT_SCORE) {
            config.default_score = parse_value(ENV_DEFAULT_SCORE, &raw)?;
        }

        if let Some(dir) = lookup(ENV_STATIC_DIR) {
            if !dir.trim().is_empty() {
                config.static_dir = Some(PathBuf::from(dir));
            }
        }

        Ok(config)
    }

    /// Grouping/include column choices before any upload.
    pub fn available_columns(&self) -> Vec<String> {
        AVAILABLE_COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
