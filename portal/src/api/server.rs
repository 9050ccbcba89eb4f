//! HTTP server for the portfolio front end.
//!
//! Stateless: every request carries what it needs (portfolio, mapping,
//! settings), so a browser UI keeps its own session between calls.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                                |
//! |--------|-----------------------|--------------------------------------------|
//! | GET    | `/health`             | Health check                               |
//! | GET    | `/api/options`        | Target fields and settings choices         |
//! | POST   | `/api/parse`          | Upload CSV/Excel, get portfolio + mapping  |
//! | POST   | `/api/mapping`        | Propose a mapping for column names         |
//! | POST   | `/api/score`          | Map, forward to the backend, return result |
//! | POST   | `/api/export/{kind}`  | Rows to a CSV attachment                   |
//! | GET    | `/api/logs`           | SSE stream for real-time logs              |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{
    error_response, ColumnCandidates, ExportRequest, MappingRequest, MappingResponse, OptionsResponse, ParseResponse,
    ScoreRequestBody,
};
use crate::client::ScoringClient;
use crate::config::{Config, MAX_FILE_SIZE};
use crate::error::{ExportError, PipelineError, ServerError, ServerResult};
use crate::mapping::{propose_mapping, rank_candidates, PortfolioSession};
use crate::parser::unique_headers;
use crate::transform::export::{rows_table, serialize_delimited, ExportKind};
use crate::transform::pipeline::{dispatch, finish, prepare_upload, ScoreOutcome};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: ScoringClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let client = ScoringClient::from_config(&config);
        Self {
            config: Arc::new(config),
            client,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::Export(ExportError::UnknownKind(_))) => StatusCode::NOT_FOUND,
            ServerError::Pipeline(
                PipelineError::Csv(_) | PipelineError::Mapping(_) | PipelineError::EmptyInput,
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// All routes, with an optional static UI as fallback.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let static_dir = state.config.static_dir.clone();

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/options", get(options))
        .route("/api/parse", post(parse_upload))
        .route("/api/mapping", post(propose))
        .route("/api/score", post(score))
        .route("/api/export/{kind}", post(export))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE))
        .layer(cors)
        .with_state(state);

    match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.route("/", get(health)),
    }
}

/// Start the HTTP server
pub async fn start_server(config: Config, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let backend = config.backend_url.clone();
    let app = router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_info(format!("Server running on http://localhost:{}", port));
    log_info(format!("Scoring backend: {}", backend));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tempscore",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse::from(state.config.as_ref()))
}

/// Multipart upload: `file` plus optional `skiprows`. Workbooks are
/// forwarded to the backend parser.
async fn parse_upload(State(state): State<AppState>, mut multipart: Multipart) -> ServerResult<Json<ParseResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut skip_rows = state.config.skip_rows;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "skiprows" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                skip_rows = text
                    .trim()
                    .parse()
                    .map_err(|_| ServerError::BadRequest(format!("Invalid skiprows: '{}'", text)))?;
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    log_info(format!(
        "Upload: {} ({} bytes, skipping {} rows)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len(),
        skip_rows
    ));

    let config = Config {
        skip_rows,
        ..state.config.as_ref().clone()
    };
    let (session, info) = prepare_upload(&state.client, file_name.as_deref(), bytes, &config).await?;

    Ok(Json(ParseResponse::new(&session, info, &config.available_columns())))
}

async fn propose(State(state): State<AppState>, Json(body): Json<MappingRequest>) -> Json<MappingResponse> {
    let fields = state.config.target_schema.fields();
    let threshold = body.threshold.unwrap_or(state.config.similarity_threshold);

    // repeated names would collide as keys of the mapping object
    let columns = unique_headers(body.columns);
    let mapping = propose_mapping(&columns, fields, threshold);
    let candidates = columns
        .iter()
        .map(|column| ColumnCandidates {
            column: column.clone(),
            candidates: rank_candidates(column, fields),
        })
        .collect();

    Json(MappingResponse {
        columns,
        mapping,
        candidates,
    })
}

/// Score a mapped portfolio. A failing backend still answers 200 with the
/// empty result and an alert.
async fn score(State(state): State<AppState>, Json(body): Json<ScoreRequestBody>) -> ServerResult<Json<ScoreOutcome>> {
    if body.portfolio.is_empty() {
        return Err(PipelineError::EmptyInput.into());
    }

    let mut session = PortfolioSession::new(state.config.target_schema.clone(), state.config.similarity_threshold);
    session.load(body.portfolio);
    session.replace_mapping(&body.mapping).map_err(PipelineError::from)?;

    let (ticket, request) = session.prepare_request(&body.settings);
    let outcome = dispatch(&state.client, &request).await;
    finish(&mut session, ticket, &outcome)?;

    Ok(Json(outcome))
}

async fn export(Path(kind): Path<String>, Json(body): Json<ExportRequest>) -> ServerResult<Response> {
    let kind: ExportKind = kind.parse().map_err(PipelineError::from)?;
    let csv = serialize_delimited(&rows_table(&body.rows));

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", kind.file_name()),
        ),
    ];
    Ok((headers, csv).into_response())
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // lagged subscribers skip what they missed
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(config: Config) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(config));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn offline_backend() -> Config {
        Config {
            backend_url: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(Config::default()).await;
        let body: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_parse_upload() {
        let base = spawn(Config::default()).await;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(b"Report\ncompany_nam,weight,region\nAcme,0.5,EU\n".to_vec())
                    .file_name("portfolio.csv"),
            )
            .text("skiprows", "1");

        let response = reqwest::Client::new()
            .post(format!("{}/api/parse", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["columns"], json!(["company_nam", "weight", "region"]));
        assert_eq!(body["mapping"]["company_nam"], "company_name");
        assert_eq!(body["mapping"]["region"], Value::Null);
        assert_eq!(body["portfolio"][0]["weight"], 0.5);
        assert!(body["groupingOptions"]
            .as_array()
            .unwrap()
            .contains(&json!("region")));
    }

    #[tokio::test]
    async fn test_workbook_upload_is_parsed_by_backend() {
        use axum::extract::Multipart;

        let backend = Router::new().route(
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
                assert_eq!(file_name, "holdings.xlsx");
                assert_eq!(skiprows, "2");
                Json(json!({"portfolio": [{"company_nam": "Acme", "weight": 0.5}]}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, backend).await.unwrap();
        });

        let base = spawn(Config {
            backend_url: format!("http://{}", backend_addr),
            ..Config::default()
        })
        .await;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(b"PK\x03\x04".to_vec()).file_name("holdings.xlsx"),
            )
            .text("skiprows", "2");
        let response = reqwest::Client::new()
            .post(format!("{}/api/parse", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["csvInfo"]["source"], "backend");
        assert_eq!(body["columns"], json!(["company_nam", "weight"]));
        assert_eq!(body["mapping"]["company_nam"], "company_name");
    }

    #[tokio::test]
    async fn test_parse_without_file_is_bad_request() {
        let base = spawn(Config::default()).await;
        let form = reqwest::multipart::Form::new().text("skiprows", "0");
        let response = reqwest::Client::new()
            .post(format!("{}/api/parse", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_mapping_proposal() {
        let base = spawn(Config::default()).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/mapping", base))
            .json(&json!({"columns": ["company_id", "inv_value"], "threshold": 3}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["mapping"]["company_id"], "company_id");
        assert_eq!(body["mapping"]["inv_value"], Value::Null);
        assert_eq!(body["candidates"][1]["column"], "inv_value");
        assert_eq!(body["candidates"][0]["candidates"][0]["distance"], 0);
    }

    #[tokio::test]
    async fn test_mapping_keeps_repeated_columns_apart() {
        let base = spawn(Config::default()).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/mapping", base))
            .json(&json!({"columns": ["company_id", "company_id"], "threshold": 3}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["columns"], json!(["company_id", "company_id.1"]));
        let mapping = body["mapping"].as_object().unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["company_id"], "company_id");
        assert_eq!(mapping["company_id.1"], Value::Null);
        assert_eq!(body["candidates"][1]["column"], "company_id.1");
    }

    #[tokio::test]
    async fn test_score_falls_back_when_backend_is_down() {
        let base = spawn(offline_backend()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/score", base))
            .json(&json!({
                "portfolio": [{"id": "A", "w": 1.0}],
                "mapping": {"id": "company_id", "w": "portfolio_weight"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["response"]["coverage"], 0.0);
        assert_eq!(body["response"]["companies"], json!([]));
        assert_eq!(body["alert"]["type"], "danger");
    }

    #[tokio::test]
    async fn test_score_rejects_conflicting_mapping() {
        let base = spawn(offline_backend()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/score", base))
            .json(&json!({
                "portfolio": [{"a": 1, "b": 2}],
                "mapping": {"a": "company_id", "b": "company_id"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_export_attachment() {
        let base = spawn(Config::default()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/export/temperature_scores", base))
            .json(&json!({"rows": [{"company_name": "Acme, Inc.", "temperature_score": 2.1}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains("temperature_scores.csv"));
        let text = response.text().await.unwrap();
        assert_eq!(text, "company_name,temperature_score\n\"Acme, Inc.\",2.1\n");
    }

    #[tokio::test]
    async fn test_unknown_export_is_not_found() {
        let base = spawn(Config::default()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/export/everything", base))
            .json(&json!({"rows": []}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }
}
