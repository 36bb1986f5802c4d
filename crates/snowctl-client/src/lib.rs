//! snowctl Client - the remote side of the Streamlit management CLI
//!
//! This crate provides:
//! - **Configuration**: named connections loaded from `config.yaml` with environment overrides
//! - **SQL session**: statements and file uploads over the service's REST API
//! - **Statement builders**: quoting-aware SQL for Streamlit objects
//! - **Manager**: one method per CLI command, backed by any [`SqlExecutor`]
//! - **Mock executor**: records statements for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use snowctl_client::{ClientConfig, SqlStreamlitManager, StreamlitManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = ClientConfig::load()?.connection(None)?;
//! let manager = SqlStreamlitManager::connect(&connection)?;
//!
//! for app in manager.list().await? {
//!     println!("{}", app.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod mock;
pub mod session;
pub mod sql;

pub use config::{ClientConfig, Connection, ConnectionConfig};
pub use error::{ClientError, Result};
pub use manager::{AppUrlBuilder, DEFAULT_STAGE, SqlStreamlitManager, StreamlitManager};
pub use mock::MockExecutor;
pub use session::{QueryResult, RestSession, SqlExecutor, StatementContext};
