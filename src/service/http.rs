//! HTTP client for the remote execution service.
//!
//! Talks JSON to the backend API:
//! - `POST {base}/sql/execute/` with `{query, limit}`
//! - `GET {base}/sql/schema/`
//! - `POST {base}/sql/suggestions/` with `{query, include_schema, max_suggestions}`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{
    Acknowledgement, ExecutionService, QueryResult, Row, RowSet, SchemaPayload,
    SuggestionResponse,
};
use crate::config::ServiceConfig;
use crate::error::{GateError, Result, DEFAULT_EXECUTION_ERROR};

/// Maximum number of attempts for idempotent requests.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Execution service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpExecutionService {
    base: Url,
    token: Option<String>,
    client: Client,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Serialize)]
struct SuggestionRequest<'a> {
    query: &'a str,
    include_schema: bool,
    max_suggestions: usize,
}

/// Wire shape of an execution response. A body with `columns` is a row-set,
/// anything else is an acknowledgement.
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    row_count: Option<usize>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    execution_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ExecuteResponse {
    fn into_result(self, measured: Duration) -> QueryResult {
        let execution_time_ms = self
            .execution_time_ms
            .unwrap_or(measured.as_millis() as u64);

        match self.columns {
            Some(columns) => {
                let row_count = self.row_count.unwrap_or(self.rows.len());
                QueryResult::Rows(RowSet {
                    columns,
                    rows: self.rows,
                    row_count,
                    execution_time_ms,
                    has_more: self.has_more,
                })
            }
            None => QueryResult::Ack(Acknowledgement {
                message: self
                    .message
                    .unwrap_or_else(|| "Statement executed.".to_string()),
                row_count: self.row_count.unwrap_or(0),
                execution_time_ms,
            }),
        }
    }
}

impl HttpExecutionService {
    /// Creates a client for the configured base URL.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut base = config.url()?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateError::service(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base,
            token: config.token.clone(),
            client,
        })
    }

    /// Resolves an endpoint path against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| GateError::config(format!("Invalid endpoint '{path}': {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turns a non-success response into the error shown to the operator.
    fn parse_error(status: StatusCode, body: &str) -> GateError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return GateError::service(format!("Not authorized ({status})"));
        }

        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
            if let Some(detail) = parsed.error.or(parsed.detail) {
                return GateError::execution(detail);
            }
        }

        if status.is_server_error() {
            GateError::service(format!("Execution service error ({status})"))
        } else {
            GateError::execution(DEFAULT_EXECUTION_ERROR)
        }
    }

    fn is_retryable(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    /// Sends a request once and returns the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GateError::service(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GateError::service(format!("Failed to read response: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(Self::parse_error(status, &body))
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T> {
        serde_json::from_str(body)
            .map_err(|e| GateError::service(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    /// Statements are never retried: a write may already have been applied.
    async fn execute(&self, statement: &str, limit: usize) -> Result<QueryResult> {
        let url = self.endpoint("sql/execute/")?;
        let started = std::time::Instant::now();
        let body = self
            .send(self.client.post(url).json(&ExecuteRequest {
                query: statement,
                limit,
            }))
            .await?;
        let response: ExecuteResponse = Self::decode(&body)?;
        Ok(response.into_result(started.elapsed()))
    }

    async fn fetch_schema(&self) -> Result<SchemaPayload> {
        let url = self.endpoint("sql/schema/")?;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Schema request attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);
            match self.authorize(self.client.get(url.clone())).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(|e| {
                        GateError::service(format!("Failed to read response: {e}"))
                    })?;
                    if !status.is_success() {
                        return Err(Self::parse_error(status, &body));
                    }
                    return Self::decode(&body);
                }
                Err(e) if Self::is_retryable(&e) && attempt < MAX_RETRY_ATTEMPTS => {
                    warn!(
                        "Schema request failed (attempt {}), retrying in {:?}: {}",
                        attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(GateError::service(format!("Request failed: {e}"))),
            }
        }
    }

    async fn request_suggestions(
        &self,
        statement: &str,
        include_schema: bool,
        max_suggestions: usize,
    ) -> Result<SuggestionResponse> {
        let url = self.endpoint("sql/suggestions/")?;
        let body = self
            .send(self.client.post(url).json(&SuggestionRequest {
                query: statement,
                include_schema,
                max_suggestions,
            }))
            .await?;
        Self::decode(&body)
    }
}
