//! In-memory SQL executor for testing
//!
//! Records every statement and upload, and answers statements from canned
//! responses matched by prefix. Useful for exercising the manager without a
//! live service.

use async_trait::async_trait;
use snowctl_core::StageLocation;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::{ClientError, Result};
use crate::session::{QueryResult, SqlExecutor};

#[derive(Debug, Clone)]
enum Reply {
    Result(QueryResult),
    Fail(String),
}

/// Recording executor with canned responses
#[derive(Clone, Default)]
pub struct MockExecutor {
    replies: Arc<RwLock<Vec<(String, Reply)>>>,
    statements: Arc<RwLock<Vec<String>>>,
    uploads: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements starting with `prefix` with `result`
    pub fn with_response(self, prefix: &str, result: QueryResult) -> Self {
        self.replies
            .write()
            .unwrap()
            .push((prefix.to_string(), Reply::Result(result)));
        self
    }

    /// Fail statements starting with `prefix` with a service error
    pub fn fail_on(self, prefix: &str, message: &str) -> Self {
        self.replies
            .write()
            .unwrap()
            .push((prefix.to_string(), Reply::Fail(message.to_string())));
        self
    }

    /// Statements executed so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.read().unwrap().clone()
    }

    /// Uploads so far as (file name, target location) pairs
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.read().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.statements.write().unwrap().push(sql.to_string());

        let replies = self.replies.read().unwrap();
        let reply = replies
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Result(result)) => Ok(result),
            Some(Reply::Fail(message)) => Err(ClientError::Http {
                status: 422,
                message,
                sql_state: Some("42000".to_string()),
            }),
            None if sql.starts_with("DESCRIBE") || sql.starts_with("SHOW") => {
                Ok(QueryResult::default())
            }
            None => Ok(QueryResult::status("Statement executed successfully.")),
        }
    }

    async fn upload(&self, local: &Path, target: &StageLocation) -> Result<()> {
        if !local.is_file() {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", local.display()),
            )));
        }

        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.uploads
            .write()
            .unwrap()
            .push((name, target.to_string()));
        Ok(())
    }
}
