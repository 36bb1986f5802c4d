//! Error types for remote operations

use snowctl_core::CoreError;
use thiserror::Error;

/// Errors raised while talking to the service
#[derive(Debug, Error)]
pub enum ClientError {
    // ============ Configuration Errors ============
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Connection '{name}' is not defined in {path}")]
    ConnectionNotFound { name: String, path: String },

    #[error("Connection '{connection}' is missing required setting '{field}'")]
    MissingSetting { connection: String, field: String },

    #[error("Invalid account URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    Http {
        status: u16,
        message: String,
        sql_state: Option<String>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Rate limited by server. Retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    // ============ Authentication Errors ============
    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    // ============ Statement Errors ============
    #[error("Unexpected response from service: {message}")]
    UnexpectedResponse { message: String },

    #[error("Streamlit '{name}' does not exist or is not authorized")]
    NotFound { name: String },

    // ============ Local Errors ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Whether the error comes from local configuration rather than the service
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig { .. }
                | ClientError::ConnectionNotFound { .. }
                | ClientError::MissingSetting { .. }
                | ClientError::InvalidUrl { .. }
        )
    }
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Network {
                message: format!("Request timed out: {}", e),
            }
        } else if e.is_connect() {
            ClientError::Network {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            ClientError::Http {
                status: status.as_u16(),
                message: e.to_string(),
                sql_state: None,
            }
        } else {
            ClientError::Network {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(e: serde_yaml::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
