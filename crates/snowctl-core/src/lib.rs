//! snowctl Core - shared types for the Streamlit management client
//!
//! This crate provides the foundational types used throughout snowctl:
//! - `ObjectName` / `StageLocation`: validated identifiers and their SQL rendering
//! - `CreateOptions` / `DeployOptions` / `ShareOptions`: per-command parameter bags
//! - `StreamlitApp` / `Description`: records returned by the remote service
//! - `packaging`: the archive-based packaging workaround

pub mod app;
pub mod error;
pub mod identifier;
pub mod options;
pub mod packaging;

pub use app::{Description, StreamlitApp, parse_timestamp};
pub use error::{CoreError, Result};
pub use identifier::{ObjectName, StageLocation, sql_string_literal};
pub use options::{
    CreateOptions, DEFAULT_APP_FILE, DeployOptions, ExcludedDeps, ShareOptions, YesNoAsk,
};
pub use packaging::{PackagedApp, PackagingOptions, Requirement, package_app, parse_requirements};
