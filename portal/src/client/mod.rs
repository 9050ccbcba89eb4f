//! HTTP client for the temperature-scoring backend.
//!
//! Three endpoints are used: the list of data providers, the server-side
//! Excel parser and the scoring endpoint itself. There are no retries;
//! a failed call surfaces as a [`ClientError`] and the caller decides
//! whether to fall back to [`ScoringResponse::empty`].

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{DataProvider, Record, ScoringRequest, ScoringResponse};

/// Body of `POST /parse_portfolio/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedPortfolio {
    #[serde(default)]
    pub portfolio: Vec<Record>,
}

#[derive(Clone)]
pub struct ScoringClient {
    http: reqwest::Client,
    base_url: String,
}

impl ScoringClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backend_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /data_providers`
    pub async fn data_providers(&self) -> ClientResult<Vec<DataProvider>> {
        let response = self.http.get(self.endpoint("data_providers")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Upload a spreadsheet to the backend parser.
    ///
    /// `skip_rows` is sent as the `skiprows` form field.
    pub async fn parse_portfolio(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        skip_rows: usize,
    ) -> ClientResult<Vec<Record>> {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("skiprows", skip_rows.to_string());

        let response = self
            .http
            .post(self.endpoint("parse_portfolio/"))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: ParsedPortfolio = response.json().await?;
        Ok(parsed.portfolio)
    }

    /// `POST /temperature_score/`
    pub async fn temperature_score(&self, request: &ScoringRequest) -> ClientResult<ScoringResponse> {
        let response = self
            .http
            .post(self.endpoint("temperature_score/"))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}
