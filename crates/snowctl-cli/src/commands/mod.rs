//! CLI commands

pub mod streamlit;

use snowctl_client::{ClientConfig, SqlStreamlitManager, StreamlitManager};
use std::path::Path;

use crate::browser::{BrowserOpener, SystemBrowser};
use crate::error::Result;
use crate::output::{OutputData, OutputFormat, OutputSink, Renderer};

/// Collaborators shared by every command of one invocation
pub struct CommandContext {
    pub manager: Box<dyn StreamlitManager>,
    pub browser: Box<dyn BrowserOpener>,
    pub sink: Box<dyn OutputSink>,
}

impl CommandContext {
    pub fn new(
        manager: Box<dyn StreamlitManager>,
        browser: Box<dyn BrowserOpener>,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            manager,
            browser,
            sink,
        }
    }

    /// Build the context for a configured connection
    pub fn connect(
        config_file: Option<&Path>,
        connection: Option<&str>,
        format: OutputFormat,
    ) -> Result<Self> {
        let config = match config_file {
            Some(path) => ClientConfig::load_from(path)?,
            None => ClientConfig::load()?,
        };
        let connection = config.connection(connection)?;
        tracing::info!(
            connection = %connection.name,
            account = %connection.account_url,
            "using connection"
        );

        let manager = SqlStreamlitManager::connect(&connection)?;
        Ok(Self::new(
            Box::new(manager),
            Box::new(SystemBrowser),
            Box::new(Renderer::stdout(format)),
        ))
    }

    /// Hand command output to the sink
    pub fn emit(&mut self, data: &OutputData) -> Result<()> {
        self.sink.emit(data)?;
        Ok(())
    }
}

/// A validated command ready to run
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Streamlit(streamlit::StreamlitRequest),
}

/// Run a request against the context
pub async fn dispatch(ctx: &mut CommandContext, request: Request) -> Result<()> {
    match request {
        Request::Streamlit(request) => streamlit::run(ctx, request).await,
    }
}
