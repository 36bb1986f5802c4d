//! Connection configuration
//!
//! Stored in `config.yaml` under `$SNOWFLAKE_HOME` when that variable is set,
//! otherwise under `~/.config/snowctl/`:
//!
//! ```yaml
//! defaultConnection: dev
//! connections:
//!   dev:
//!     accountUrl: https://acme.example.com
//!     tokenFile: ~/.snowctl/token
//!     database: ANALYTICS
//!     schema: PUBLIC
//!     warehouse: COMPUTE_WH
//!     role: DEVELOPER
//! ```
//!
//! Every field of the selected connection can be overridden through
//! `SNOWCTL_*` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{ClientError, Result};

/// Environment variable pointing at the configuration directory
pub const HOME_ENV: &str = "SNOWFLAKE_HOME";

/// Connection used when neither the CLI nor the file names one
pub const DEFAULT_CONNECTION: &str = "default";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Connection to use when none is given
    #[serde(default)]
    pub default_connection: Option<String>,

    /// Named connections
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,

    /// Where the file was loaded from (internal)
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// A single named connection, as written in the file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default)]
    pub account_url: Option<String>,

    /// Bearer token (prefer `tokenFile`)
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the bearer token
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub warehouse: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// Base URL of the web UI used to build application links
    #[serde(default)]
    pub app_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Fully resolved connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub account_url: Url,
    pub token: String,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub app_url: String,
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Load configuration from the default location
    ///
    /// A missing file yields an empty configuration so that environment
    /// variables alone can describe a connection.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self {
                source: Some(path),
                ..Self::default()
            })
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ClientError::InvalidConfig {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let mut config: Self = serde_yaml::from_str(&content).map_err(|e| {
            ClientError::InvalidConfig {
                message: format!("{}: {}", path.display(), e),
            }
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home).join("config.yaml"));
        }
        let config_dir = dirs::config_dir().ok_or_else(|| ClientError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("snowctl").join("config.yaml"))
    }

    /// Resolve a connection, applying `SNOWCTL_*` environment overrides
    pub fn connection(&self, name: Option<&str>) -> Result<Connection> {
        self.connection_with_env(name, |key| std::env::var(key).ok())
    }

    /// Resolve a connection with an explicit environment lookup
    pub fn connection_with_env<F>(&self, name: Option<&str>, env: F) -> Result<Connection>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = name.is_some();
        let name = name
            .map(str::to_string)
            .or_else(|| self.default_connection.clone())
            .unwrap_or_else(|| DEFAULT_CONNECTION.to_string());

        let mut settings = match self.connections.get(&name) {
            Some(c) => c.clone(),
            None if explicit || self.default_connection.is_some() => {
                return Err(ClientError::ConnectionNotFound {
                    name,
                    path: self
                        .source
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "configuration".to_string()),
                });
            }
            None => ConnectionConfig::default(),
        };
        settings.apply_env(env);
        settings.resolve(&name)
    }
}

impl ConnectionConfig {
    /// Override fields from `SNOWCTL_*` variables
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SNOWCTL_ACCOUNT_URL") {
            self.account_url = Some(v);
        }
        if let Some(v) = get("SNOWCTL_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = get("SNOWCTL_DATABASE") {
            self.database = Some(v);
        }
        if let Some(v) = get("SNOWCTL_SCHEMA") {
            self.schema = Some(v);
        }
        if let Some(v) = get("SNOWCTL_WAREHOUSE") {
            self.warehouse = Some(v);
        }
        if let Some(v) = get("SNOWCTL_ROLE") {
            self.role = Some(v);
        }
    }

    /// Validate and resolve into a usable connection
    pub fn resolve(&self, name: &str) -> Result<Connection> {
        let missing = |field: &str| ClientError::MissingSetting {
            connection: name.to_string(),
            field: field.to_string(),
        };

        let raw_url = self.account_url.as_deref().ok_or_else(|| missing("accountUrl"))?;
        let account_url = Url::parse(raw_url).map_err(|e| ClientError::InvalidUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(account_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: raw_url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let token = match (&self.token, &self.token_file) {
            (Some(token), _) => token.clone(),
            (None, Some(path)) => std::fs::read_to_string(expand_home(path))
                .map_err(|e| ClientError::InvalidConfig {
                    message: format!("cannot read token file {}: {}", path.display(), e),
                })?
                .trim()
                .to_string(),
            (None, None) => return Err(missing("token")),
        };
        if token.is_empty() {
            return Err(missing("token"));
        }

        let app_url = self
            .app_url
            .clone()
            .unwrap_or_else(|| account_url.as_str().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Connection {
            name: name.to_string(),
            account_url,
            token,
            database: self.database.clone(),
            schema: self.schema.clone(),
            warehouse: self.warehouse.clone(),
            role: self.role.clone(),
            app_url,
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
defaultConnection: dev
connections:
  dev:
    accountUrl: https://acme.example.com
    token: secret
    database: ANALYTICS
    schema: PUBLIC
  prod:
    accountUrl: https://prod.example.com/
    token: other
    appUrl: https://ui.example.com/acme/
"#;

    fn config() -> ClientConfig {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_connection_is_used() {
        let conn = config().connection_with_env(None, no_env).unwrap();
        assert_eq!(conn.name, "dev");
        assert_eq!(conn.database.as_deref(), Some("ANALYTICS"));
        assert_eq!(conn.app_url, "https://acme.example.com");
        assert_eq!(conn.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_named_connection_and_app_url() {
        let conn = config().connection_with_env(Some("prod"), no_env).unwrap();
        assert_eq!(conn.token, "other");
        assert_eq!(conn.app_url, "https://ui.example.com/acme");
    }

    #[test]
    fn test_unknown_connection() {
        let err = config().connection_with_env(Some("qa"), no_env).unwrap_err();
        assert!(matches!(err, ClientError::ConnectionNotFound { .. }));
        assert!(err.is_config());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SNOWCTL_ROLE", "ADMIN"),
            ("SNOWCTL_TOKEN", "from-env"),
            ("SNOWCTL_SCHEMA", ""),
        ]
        .into_iter()
        .collect();

        let conn = config()
            .connection_with_env(None, |k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(conn.role.as_deref(), Some("ADMIN"));
        assert_eq!(conn.token, "from-env");
        assert_eq!(conn.schema.as_deref(), Some("PUBLIC"));
    }

    #[test]
    fn test_env_only_connection() {
        let env: HashMap<&str, &str> = [
            ("SNOWCTL_ACCOUNT_URL", "http://localhost:8080"),
            ("SNOWCTL_TOKEN", "t"),
        ]
        .into_iter()
        .collect();

        let conn = ClientConfig::default()
            .connection_with_env(None, |k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(conn.name, DEFAULT_CONNECTION);
        assert_eq!(conn.account_url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_missing_settings() {
        let err = ClientConfig::default()
            .connection_with_env(None, no_env)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::MissingSetting { ref field, .. } if field == "accountUrl"
        ));

        let settings = ConnectionConfig {
            account_url: Some("ftp://acme".to_string()),
            token: Some("t".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            settings.resolve("x").unwrap_err(),
            ClientError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn test_token_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "file-token\n").unwrap();

        let settings = ConnectionConfig {
            account_url: Some("https://acme.example.com".to_string()),
            token_file: Some(token_path),
            ..Default::default()
        };
        assert_eq!(settings.resolve("dev").unwrap().token, "file-token");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.connections.len(), 2);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));

        std::fs::write(&path, "connections: [").unwrap();
        assert!(ClientConfig::load_from(&path).unwrap_err().is_config());
    }
}
