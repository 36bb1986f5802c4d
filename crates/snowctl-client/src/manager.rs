//! Streamlit manager
//!
//! One method per CLI command. The SQL-backed implementation turns each call
//! into statements and uploads executed through a [`SqlExecutor`].

use async_trait::async_trait;
use snowctl_core::packaging::LAUNCHER_NAME;
use snowctl_core::{
    CreateOptions, DeployOptions, Description, ObjectName, ShareOptions, StageLocation,
    StreamlitApp, package_app,
};
use std::path::{Path, PathBuf};

use crate::config::Connection;
use crate::error::{ClientError, Result};
use crate::session::{RestSession, SqlExecutor};
use crate::sql::{self, AppSource, CreateStatement};

/// Stage that holds deployed application files
pub const DEFAULT_STAGE: &str = "streamlit";

/// Environment file uploaded next to the main file when present
const ENVIRONMENT_FILE: &str = "environment.yml";

/// Remote operations on Streamlit applications
///
/// Implementations must be Send + Sync so the CLI can hold them behind a
/// trait object.
#[async_trait]
pub trait StreamlitManager: Send + Sync {
    /// List applications visible to the current role
    async fn list(&self) -> Result<Vec<StreamlitApp>>;

    /// Describe an application; returns its description and access URL
    async fn describe(&self, name: &ObjectName) -> Result<(Description, String)>;

    /// Register an application without uploading files
    async fn create(&self, options: &CreateOptions) -> Result<String>;

    /// Grant usage on an application to a role
    async fn share(&self, options: &ShareOptions) -> Result<String>;

    /// Drop an application
    async fn drop(&self, name: &ObjectName) -> Result<String>;

    /// Upload files and create the application if needed; returns its URL
    async fn deploy(&self, options: &DeployOptions) -> Result<String>;
}

/// Builds links to applications in the web UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUrlBuilder {
    base: String,
    database: Option<String>,
    schema: Option<String>,
}

impl AppUrlBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            database: None,
            schema: None,
        }
    }

    /// Fall back to these when a description lacks database or schema
    pub fn with_defaults(mut self, database: Option<String>, schema: Option<String>) -> Self {
        self.database = database;
        self.schema = schema;
        self
    }

    pub fn from_connection(connection: &Connection) -> Self {
        Self::new(connection.app_url.clone())
            .with_defaults(connection.database.clone(), connection.schema.clone())
    }

    /// Link for a described application
    pub fn url_for(&self, name: &ObjectName, description: &Description) -> String {
        let id = description
            .get("url_id")
            .map(str::to_string)
            .unwrap_or_else(|| name.object());
        // Qualifiers in the name win over the row, which wins over defaults
        let (own_database, own_schema) = name.qualifiers();
        let database = own_database
            .or_else(|| description.get("database_name").map(str::to_string))
            .or_else(|| self.database.clone());
        let schema = own_schema
            .or_else(|| description.get("schema_name").map(str::to_string))
            .or_else(|| self.schema.clone());

        match (database, schema) {
            (Some(db), Some(schema)) => {
                format!("{}/#/streamlit-apps/{}.{}.{}", self.base, db, schema, id)
            }
            _ => format!("{}/#/streamlit-apps/{}", self.base, id),
        }
    }
}

/// Manager backed by SQL statements
pub struct SqlStreamlitManager<E: SqlExecutor> {
    executor: E,
    urls: AppUrlBuilder,
    stage: String,
    query_warehouse: Option<String>,
}

impl SqlStreamlitManager<RestSession> {
    /// Create a manager talking to the service over HTTP
    pub fn connect(connection: &Connection) -> Result<Self> {
        let session = RestSession::new(connection)?;
        Ok(Self::new(session, AppUrlBuilder::from_connection(connection))
            .with_query_warehouse(connection.warehouse.clone()))
    }
}

impl<E: SqlExecutor> SqlStreamlitManager<E> {
    pub fn new(executor: E, urls: AppUrlBuilder) -> Self {
        Self {
            executor,
            urls,
            stage: DEFAULT_STAGE.to_string(),
            query_warehouse: None,
        }
    }

    /// Warehouse used to run application queries
    pub fn with_query_warehouse(mut self, warehouse: Option<String>) -> Self {
        self.query_warehouse = warehouse;
        self
    }

    fn root_location(&self, name: &ObjectName) -> StageLocation {
        StageLocation::for_object(&self.stage, name)
    }

    async fn fetch_description(&self, name: &ObjectName) -> Result<Description> {
        let result = self.executor.execute(&sql::describe_streamlit(name)).await?;
        result
            .records()
            .into_iter()
            .next()
            .map(Description::new)
            .ok_or_else(|| ClientError::NotFound {
                name: name.to_string(),
            })
    }

    async fn upload_all(&self, files: &[&Path], target: &StageLocation) -> Result<()> {
        for file in files {
            tracing::info!(file = %file.display(), target = %target, "uploading");
            self.executor.upload(file, target).await?;
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' has no file name", path.display()),
            ))
        })
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

#[async_trait]
impl<E: SqlExecutor> StreamlitManager for SqlStreamlitManager<E> {
    async fn list(&self) -> Result<Vec<StreamlitApp>> {
        let result = self.executor.execute(&sql::show_streamlits()).await?;
        Ok(result
            .records()
            .iter()
            .filter_map(StreamlitApp::from_row)
            .collect())
    }

    async fn describe(&self, name: &ObjectName) -> Result<(Description, String)> {
        let description = self.fetch_description(name).await?;
        let url = self.urls.url_for(name, &description);
        Ok((description, url))
    }

    async fn create(&self, options: &CreateOptions) -> Result<String> {
        let main_file = if options.use_packaging_workaround {
            LAUNCHER_NAME.to_string()
        } else {
            file_name(&options.file)?
        };

        // An explicit stage takes precedence over the local file location
        let root = self.root_location(&options.name);
        let source = match &options.from_stage {
            Some(stage) => AppSource::FromStage(stage),
            None => AppSource::Root(&root),
        };

        let statement = CreateStatement {
            name: &options.name,
            source,
            main_file: &main_file,
            query_warehouse: self.query_warehouse.as_deref(),
            if_not_exists: false,
        };
        let result = self.executor.execute(&statement.to_sql()).await?;
        Ok(result.status_message())
    }

    async fn share(&self, options: &ShareOptions) -> Result<String> {
        let result = self
            .executor
            .execute(&sql::grant_usage(&options.name, &options.to_role))
            .await?;
        Ok(result.status_message())
    }

    async fn drop(&self, name: &ObjectName) -> Result<String> {
        let result = self.executor.execute(&sql::drop_streamlit(name)).await?;
        Ok(result.status_message())
    }

    async fn deploy(&self, options: &DeployOptions) -> Result<String> {
        let root = self.root_location(&options.name);
        self.executor
            .execute(&sql::create_stage_if_not_exists(&self.stage))
            .await?;

        let main_file = if options.use_packaging_workaround {
            let workdir = tempfile::TempDir::new()?;
            let packaged = package_app(&options.file, &options.packaging(), workdir.path())?;
            self.upload_all(&packaged.artifacts(), &root).await?;
            LAUNCHER_NAME.to_string()
        } else {
            let environment = sibling(&options.file, ENVIRONMENT_FILE);
            let mut files = vec![options.file.as_path()];
            if environment.is_file() {
                files.push(environment.as_path());
            }
            self.upload_all(&files, &root).await?;
            file_name(&options.file)?
        };

        let statement = CreateStatement {
            name: &options.name,
            source: AppSource::Root(&root),
            main_file: &main_file,
            query_warehouse: self.query_warehouse.as_deref(),
            if_not_exists: true,
        };
        self.executor.execute(&statement.to_sql()).await?;

        let description = self.fetch_description(&options.name).await?;
        Ok(self.urls.url_for(&options.name, &description))
    }
}
