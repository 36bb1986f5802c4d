//! CLI error types with exit code handling
//!
//! Library errors are wrapped here without rewording their message; the
//! variant only decides the exit code and an optional help line.

use miette::Diagnostic;
use snowctl_client::ClientError;
use snowctl_core::CoreError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Local input rejected before contacting the service
    #[error("Validation failed: {message}")]
    #[diagnostic(code(snowctl::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Connection settings missing or invalid
    #[error("{message}")]
    #[diagnostic(code(snowctl::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Failure reported by the service or the network
    #[error("{message}")]
    #[diagnostic(code(snowctl::cli::remote))]
    Remote {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(snowctl::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(snowctl::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Remote { .. } => exit_codes::REMOTE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        let message = err.to_string();

        if err.is_config() {
            return CliError::Config {
                message,
                help: Some(
                    "Configure a connection in config.yaml or set SNOWCTL_ACCOUNT_URL and SNOWCTL_TOKEN"
                        .to_string(),
                ),
            };
        }

        let help = match &err {
            ClientError::AuthFailed { .. } => {
                Some("Check the token of the selected connection".to_string())
            }
            ClientError::Timeout { .. } => {
                Some("Increase timeoutSecs in the connection settings".to_string())
            }
            _ => None,
        };

        match err {
            ClientError::Io(_) => CliError::Io { message },
            ClientError::Core(CoreError::Io(_)) => CliError::Io { message },
            _ => CliError::Remote { message, help },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_is_unmodified() {
        let err: CliError = ClientError::Http {
            status: 422,
            message: "SQL compilation error".to_string(),
            sql_state: None,
        }
        .into();

        assert_eq!(err.exit_code(), exit_codes::REMOTE_ERROR);
        assert_eq!(err.to_string(), "HTTP error: 422 - SQL compilation error");
    }

    #[test]
    fn test_config_errors_map_to_config_exit_code() {
        let err: CliError = ClientError::MissingSetting {
            connection: "default".to_string(),
            field: "accountUrl".to_string(),
        }
        .into();

        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        assert!(err.to_string().contains("accountUrl"));
    }

    #[test]
    fn test_validation_exit_code() {
        let err = CliError::validation_with_help("bad file", "use --file");
        assert_eq!(err.exit_code(), exit_codes::VALIDATION_ERROR);
    }
}
