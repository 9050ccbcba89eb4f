//! High-level pipeline: upload, mapping proposal, scoring, export.
//!
//! Combines the parser, the session and the backend client, and reports
//! every step through the progress log.
//!
//! # Example
//!
//! ```rust,ignore
//! use tempscore::{Config, ScoringClient, ScoringSettings};
//! use tempscore::transform::pipeline::{prepare_file, score_session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let (mut session, _info) = prepare_file("portfolio.csv".as_ref(), &config)?;
//!     let client = ScoringClient::from_config(&config);
//!     let outcome = score_session(&mut session, &ScoringSettings::default(), &client).await?;
//!     println!("coverage {}", outcome.response.coverage);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::client::ScoringClient;
use crate::config::Config;
use crate::error::{Alert, PipelineError, PipelineResult};
use crate::mapping::{PortfolioSession, RequestTicket};
use crate::models::{columns_of, Record, ScoringRequest, ScoringResponse, ScoringSettings};
use crate::parser::{is_spreadsheet, parse_bytes, parse_file, ParseOptions, ParseResult};

/// Who turned the upload into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadSource {
    /// Local CSV parser.
    Csv,
    /// Backend `/parse_portfolio/` (workbooks).
    Backend,
}

/// What was detected while reading an upload.
///
/// Backend-parsed workbooks have no encoding or delimiter; both are empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub source: UploadSource,
    pub encoding: String,
    pub delimiter: String,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            source: UploadSource::Csv,
            encoding: parsed.encoding.clone(),
            delimiter: format_delimiter(parsed.delimiter).to_string(),
            headers: parsed.headers.clone(),
            row_count: parsed.records.len(),
        }
    }
}

impl CsvInfo {
    fn from_backend(records: &[Record]) -> Self {
        Self {
            source: UploadSource::Backend,
            encoding: String::new(),
            delimiter: String::new(),
            headers: columns_of(records),
            row_count: records.len(),
        }
    }
}

/// Result of one scoring round trip.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub response: ScoringResponse,
    /// Set when the backend call failed and `response` is the empty fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

fn parse_options(config: &Config) -> ParseOptions {
    ParseOptions {
        skip_rows: config.skip_rows,
        delimiter: None,
    }
}

/// Parse a CSV file and open a session with a proposed mapping.
pub fn prepare_file(path: &Path, config: &Config) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    log_info(format!("Reading {}", path.display()));
    let parsed = parse_file(path, &parse_options(config))?;
    prepare_parsed(parsed, config)
}

/// Same as [`prepare_file`] for uploaded bytes.
pub fn prepare_bytes(bytes: &[u8], config: &Config) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    log_info(format!("Reading upload ({} bytes)", bytes.len()));
    let parsed = parse_bytes(bytes, &parse_options(config))?;
    prepare_parsed(parsed, config)
}

/// Open a session over already-parsed rows.
pub fn prepare_parsed(parsed: ParseResult, config: &Config) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    let info = CsvInfo::from(&parsed);
    log_success(format!("Detected encoding: {}", info.encoding));
    log_success(format!("Detected separator: '{}'", info.delimiter));
    open_session(parsed.records, info, config)
}

/// Have the backend parse a workbook, then open a session over its rows.
pub async fn prepare_remote(
    client: &ScoringClient,
    file_name: &str,
    bytes: Vec<u8>,
    config: &Config,
) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    log_info(format!(
        "Sending {} ({} bytes) to the backend parser, skipping {} rows",
        file_name,
        bytes.len(),
        config.skip_rows
    ));
    let records = client.parse_portfolio(file_name, bytes, config.skip_rows).await?;
    let info = CsvInfo::from_backend(&records);
    open_session(records, info, config)
}

/// Route an upload: workbooks go to the backend, everything else is read
/// as CSV here.
pub async fn prepare_upload(
    client: &ScoringClient,
    file_name: Option<&str>,
    bytes: Vec<u8>,
    config: &Config,
) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    if is_spreadsheet(file_name, &bytes) {
        prepare_remote(client, file_name.unwrap_or("portfolio.xlsx"), bytes, config).await
    } else {
        prepare_bytes(&bytes, config)
    }
}

/// [`prepare_upload`] for a file on disk.
pub async fn prepare_path(
    client: &ScoringClient,
    path: &Path,
    config: &Config,
) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    let file_name = path.file_name().and_then(|name| name.to_str());
    if !is_spreadsheet(file_name, &[]) {
        return prepare_file(path, config);
    }
    log_info(format!("Reading {}", path.display()));
    let bytes = tokio::fs::read(path).await?;
    prepare_remote(client, file_name.unwrap_or("portfolio.xlsx"), bytes, config).await
}

fn open_session(records: Vec<Record>, info: CsvInfo, config: &Config) -> PipelineResult<(PortfolioSession, CsvInfo)> {
    log_success(format!("Read {} rows", info.row_count));
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut session = PortfolioSession::new(config.target_schema.clone(), config.similarity_threshold);
    session.load(records);
    log_mapping(&session);

    Ok((session, info))
}

fn log_mapping(session: &PortfolioSession) {
    for (column, target) in session.mapping().iter() {
        match target {
            Some(target) => log_info_indent(format!("{} → {}", column, target), 1),
            None => log_info_indent(format!("{} (unmapped)", column), 1),
        }
    }
    let unclaimed: Vec<&str> = session
        .schema()
        .fields()
        .iter()
        .map(String::as_str)
        .filter(|field| session.mapping().claimed_by(field).is_none())
        .collect();
    if !unclaimed.is_empty() {
        log_warning(format!("No column proposed for: {}", unclaimed.join(", ")));
    }
}

/// Send one request; a failed call yields the empty fallback and an alert.
pub async fn dispatch(client: &ScoringClient, request: &ScoringRequest) -> ScoreOutcome {
    log_info(format!("Scoring {} companies via {}", request.companies.len(), client.base_url()));
    match client.temperature_score(request).await {
        Ok(response) => {
            log_success(format!(
                "Coverage {:.1}%, {} companies scored",
                response.coverage,
                response.companies.len()
            ));
            ScoreOutcome { response, alert: None }
        }
        Err(e) => {
            log_error(format!("Scoring failed: {}", e));
            ScoreOutcome {
                response: ScoringResponse::empty(),
                alert: Some(e.alert()),
            }
        }
    }
}

/// Apply an outcome to the session it was prepared from.
pub fn finish(session: &mut PortfolioSession, ticket: RequestTicket, outcome: &ScoreOutcome) -> PipelineResult<()> {
    if session.apply_response(ticket, outcome.response.clone()) {
        Ok(())
    } else {
        Err(PipelineError::StaleResponse(ticket.generation))
    }
}

/// Build, send and apply one scoring request.
pub async fn score_session(
    session: &mut PortfolioSession,
    settings: &ScoringSettings,
    client: &ScoringClient,
) -> PipelineResult<ScoreOutcome> {
    if session.portfolio().is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let (ticket, request) = session.prepare_request(settings);
    let outcome = dispatch(client, &request).await;
    finish(session, ticket, &outcome)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlertKind;
    use crate::models::TargetSchema;
    use axum::{extract::Multipart, routing::post, Json, Router};
    use serde_json::json;
    use std::io::Write;

    const PORTFOLIO: &str = "Company ID;company_nam;weight;sector\nUS01;Acme;0.4;Energy\nUS02;Globex;0.6;Retail\n";

    /// Backend parser stub: one company per upload, `skiprows` echoed back.
    async fn workbook_backend() -> ScoringClient {
        let router = Router::new().route(
            "/parse_portfolio/",
            post(|mut multipart: Multipart| async move {
                let mut skiprows = String::new();
                let mut file_name = String::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    let name = field.name().unwrap_or("").to_string();
                    match name.as_str() {
                        "file" => {
                            file_name = field.file_name().unwrap_or("").to_string();
                            field.bytes().await.unwrap();
                        }
                        "skiprows" => skiprows = field.text().await.unwrap(),
                        _ => {}
                    }
                }
                Json(json!({
                    "portfolio": [{
                        "Company ID": "US01",
                        "company_nam": file_name,
                        "weight": 0.4,
                        "skipped": skiprows,
                    }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ScoringClient::new(format!("http://{}", addr))
    }

    #[test]
    fn test_prepare_bytes_proposes_mapping() {
        let config = Config::default();
        let (session, info) = prepare_bytes(PORTFOLIO.as_bytes(), &config).unwrap();

        assert_eq!(info.delimiter, ";");
        assert_eq!(info.row_count, 2);
        assert_eq!(session.mapping().target_for("company_nam"), Some("company_name"));
        assert_eq!(session.mapping().target_for("Company ID"), Some("company_id"));
        assert_eq!(session.mapping().target_for("sector"), None);
    }

    #[test]
    fn test_prepare_file_honours_skip_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Exported by fund admin\n{}", PORTFOLIO).unwrap();
        let config = Config {
            skip_rows: 1,
            ..Config::default()
        };

        let (session, info) = prepare_file(file.path(), &config).unwrap();
        assert_eq!(info.headers[0], "Company ID");
        assert_eq!(session.portfolio().len(), 2);
    }

    #[tokio::test]
    async fn test_workbook_upload_goes_to_backend_parser() {
        let client = workbook_backend().await;
        let config = Config {
            skip_rows: 3,
            ..Config::default()
        };

        let (session, info) = prepare_upload(&client, Some("holdings.xlsx"), b"PK\x03\x04".to_vec(), &config)
            .await
            .unwrap();
        assert_eq!(info.source, UploadSource::Backend);
        assert_eq!(info.headers, vec!["Company ID", "company_nam", "weight", "skipped"]);
        assert_eq!(info.row_count, 1);
        assert_eq!(session.portfolio()[0]["company_nam"], "holdings.xlsx");
        assert_eq!(session.portfolio()[0]["skipped"], "3");
        assert_eq!(session.mapping().target_for("company_nam"), Some("company_name"));
    }

    #[tokio::test]
    async fn test_csv_upload_stays_local() {
        let client = ScoringClient::new("http://127.0.0.1:1");
        let (session, info) = prepare_upload(&client, Some("p.csv"), PORTFOLIO.as_bytes().to_vec(), &Config::default())
            .await
            .unwrap();
        assert_eq!(info.source, UploadSource::Csv);
        assert_eq!(session.portfolio().len(), 2);
    }

    #[tokio::test]
    async fn test_workbook_path_goes_to_backend_parser() {
        let client = workbook_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xls");
        std::fs::write(&path, [0xD0, 0xCF, 0x11, 0xE0]).unwrap();

        let (session, info) = prepare_path(&client, &path, &Config::default()).await.unwrap();
        assert_eq!(info.source, UploadSource::Backend);
        assert_eq!(session.portfolio()[0]["company_nam"], "book.xls");
        assert_eq!(session.portfolio()[0]["skipped"], "0");
    }

    #[tokio::test]
    async fn test_unreachable_backend_parser_is_client_error() {
        let client = ScoringClient::new("http://127.0.0.1:1");
        let err = prepare_upload(&client, Some("book.xlsx"), Vec::new(), &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Client(_)));
    }

    #[test]
    fn test_header_only_upload_is_empty_input() {
        let err = prepare_bytes(b"company_id,company_name\n", &Config::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn test_stale_outcome_rejected() {
        let config = Config::default();
        let (mut session, _) = prepare_bytes(PORTFOLIO.as_bytes(), &config).unwrap();
        let (old, _) = session.prepare_request(&ScoringSettings::default());
        let (_new, _) = session.prepare_request(&ScoringSettings::default());

        let outcome = ScoreOutcome {
            response: ScoringResponse::empty(),
            alert: None,
        };
        let err = finish(&mut session, old, &outcome).unwrap_err();
        assert!(matches!(err, PipelineError::StaleResponse(1)));
        assert!(session.response().is_none());
    }

    #[tokio::test]
    async fn test_failed_backend_falls_back_to_empty() {
        let mut session = PortfolioSession::new(TargetSchema::default(), 5.0);
        session.load(vec![serde_json::json!({"company_id": "A"}).as_object().unwrap().clone()]);
        let client = ScoringClient::new("http://127.0.0.1:1");

        let outcome = score_session(&mut session, &ScoringSettings::default(), &client)
            .await
            .unwrap();
        assert!(outcome.response.is_empty());
        assert_eq!(outcome.alert.map(|a| a.kind), Some(AlertKind::Danger));
        assert_eq!(session.response(), Some(&ScoringResponse::empty()));
    }

    #[tokio::test]
    async fn test_coverage_is_logged_as_percentage() {
        use crate::api::logs::LOG_BROADCASTER;
        use tokio::sync::broadcast::error::TryRecvError;

        let router = Router::new().route(
            "/temperature_score/",
            post(|| async { Json(json!({"aggregated_scores": {}, "companies": [], "coverage": 87.5})) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let client = ScoringClient::new(format!("http://{}", addr));

        let mut rx = LOG_BROADCASTER.subscribe();
        let request = ScoringRequest {
            settings: ScoringSettings::default(),
            companies: Vec::new(),
        };
        let outcome = dispatch(&client, &request).await;
        assert_eq!(outcome.response.coverage, 87.5);

        let mut messages = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(entry) => messages.push(entry.message),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(messages.iter().any(|m| m == "Coverage 87.5%, 0 companies scored"));
    }

    #[tokio::test]
    async fn test_empty_session_is_not_sent() {
        let mut session = PortfolioSession::new(TargetSchema::default(), 5.0);
        let client = ScoringClient::new("http://127.0.0.1:1");
        let err = score_session(&mut session, &ScoringSettings::default(), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }
}
