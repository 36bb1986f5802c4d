//! SQL session over the service's REST API
//!
//! Statements are submitted to `POST /api/v2/statements`. Long-running
//! statements answer `202 Accepted` with a handle that is polled until the
//! result is available. Files are uploaded to
//! `PUT /api/v2/stages/{stage}/files/{path}`.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snowctl_core::StageLocation;
use std::path::Path;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::Connection;
use crate::error::{ClientError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Rows returned by a statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Service message (for DDL this is the status line)
    #[serde(default)]
    pub message: Option<String>,
}

impl QueryResult {
    /// A single-column `status` result, as returned by DDL statements
    pub fn status(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            columns: vec!["status".to_string()],
            rows: vec![vec![Some(message.clone())]],
            message: Some(message),
        }
    }

    /// Rows as column name → value maps, in column order
    pub fn records(&self) -> Vec<IndexMap<String, Option<String>>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().chain(std::iter::repeat(None)))
                    .collect()
            })
            .collect()
    }

    /// The status line of a DDL statement
    ///
    /// Prefers the `status` column of the first row, then the service message.
    pub fn status_message(&self) -> String {
        let from_column = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case("status"))
            .and_then(|idx| self.rows.first()?.get(idx)?.clone());

        from_column
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Statement executed successfully.".to_string())
    }
}

/// Executes SQL and uploads files on behalf of the manager
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a single statement
    async fn execute(&self, sql: &str) -> Result<QueryResult>;

    /// Upload a local file into a stage directory, keeping its file name
    async fn upload(&self, local: &Path, target: &StageLocation) -> Result<()>;
}

/// Optional session context sent with every statement
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatementContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(flatten)]
    context: &'a StatementContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
}

impl From<StatementResponse> for QueryResult {
    fn from(resp: StatementResponse) -> Self {
        Self {
            columns: resp
                .result_set_meta_data
                .map(|m| m.row_type.into_iter().map(|c| c.name).collect())
                .unwrap_or_default(),
            rows: resp.data,
            message: resp.message,
        }
    }
}

/// HTTP session bound to one connection
pub struct RestSession {
    client: reqwest::Client,
    base: Url,
    token: String,
    context: StatementContext,
    timeout: Duration,
}

impl RestSession {
    /// Create a session for a resolved connection
    pub fn new(connection: &Connection) -> Result<Self> {
        let timeout = Duration::from_secs(connection.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snowctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Network {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base: connection.account_url.clone(),
            token: connection.token.clone(),
            context: StatementContext {
                database: connection.database.clone(),
                schema: connection.schema.clone(),
                warehouse: connection.warehouse.clone(),
                role: connection.role.clone(),
            },
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            e.into()
        }
    }

    /// Turn a non-success response into an error
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(ClientError::RateLimited { retry_after });
        }

        let body: ErrorResponse = response.json().await.unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ClientError::AuthFailed { message });
        }

        Err(ClientError::Http {
            status: status.as_u16(),
            message,
            sql_state: body.sql_state,
        })
    }

    async fn poll(&self, handle: &str) -> Result<StatementResponse> {
        let url = self.endpoint(&["api", "v2", "statements", handle])?;
        let started = Instant::now();

        loop {
            if started.elapsed() > self.timeout {
                return Err(ClientError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            tracing::debug!(handle, "polling statement");
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| self.request_error(e))?;
            let response = self.check(response).await?;

            if response.status() != reqwest::StatusCode::ACCEPTED {
                return response.json().await.map_err(|e| ClientError::UnexpectedResponse {
                    message: e.to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl SqlExecutor for RestSession {
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let url = self.endpoint(&["api", "v2", "statements"])?;
        let request = StatementRequest {
            statement: sql,
            timeout: self.timeout.as_secs(),
            context: &self.context,
        };

        tracing::debug!(%url, sql, "executing statement");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = self.check(response).await?;
        let accepted = response.status() == reqwest::StatusCode::ACCEPTED;

        let body: StatementResponse =
            response
                .json()
                .await
                .map_err(|e| ClientError::UnexpectedResponse {
                    message: e.to_string(),
                })?;

        let body = match (accepted, body.statement_handle.as_deref()) {
            (true, Some(handle)) => self.poll(handle).await?,
            (true, None) => {
                return Err(ClientError::UnexpectedResponse {
                    message: "statement accepted without a handle".to_string(),
                });
            }
            (false, _) => body,
        };

        Ok(body.into())
    }

    async fn upload(&self, local: &Path, target: &StageLocation) -> Result<()> {
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' has no file name", local.display()),
                ))
            })?;

        let mut segments = vec!["api", "v2", "stages", target.stage(), "files"];
        if let Some(path) = target.path() {
            segments.extend(path.split('/'));
        }
        segments.push(&file_name);
        let url = self.endpoint(&segments)?;

        let data = tokio::fs::read(local).await?;
        tracing::debug!(%url, bytes = data.len(), "uploading file");

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.check(response).await?;
        Ok(())
    }
}
