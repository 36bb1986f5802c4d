//! Streamlit commands - manage applications on the platform

use clap::Subcommand;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use snowctl_client::StreamlitManager;
use snowctl_core::{
    CreateOptions, DEFAULT_APP_FILE, DeployOptions, ExcludedDeps, ObjectName, ShareOptions,
    StageLocation, YesNoAsk,
};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{CommandResult, OutputData};

#[derive(Subcommand, Debug)]
pub enum StreamlitCommand {
    /// List Streamlit applications
    List,

    /// Show details of a Streamlit application
    Describe {
        /// Application name
        name: ObjectName,
    },

    /// Create a Streamlit application
    Create {
        /// Application name
        name: ObjectName,

        /// Main application file
        #[arg(long, default_value = DEFAULT_APP_FILE)]
        file: PathBuf,

        /// Stage to copy the application files from
        #[arg(long)]
        from_stage: Option<StageLocation>,

        /// Bundle code and dependencies into an archive
        #[arg(long)]
        use_packaging_workaround: bool,
    },

    /// Grant usage on a Streamlit application to a role
    Share {
        /// Application name
        name: ObjectName,

        /// Role to grant usage to
        to_role: ObjectName,
    },

    /// Drop a Streamlit application
    Drop {
        /// Application name
        name: ObjectName,
    },

    /// Upload files and create the application if needed
    Deploy {
        /// Application name
        name: ObjectName,

        /// Main application file
        #[arg(long, default_value = DEFAULT_APP_FILE)]
        file: PathBuf,

        /// Open the application in a browser once deployed
        #[arg(short = 'o', long)]
        open: bool,

        /// Bundle code and dependencies into an archive
        #[arg(long)]
        use_packaging_workaround: bool,

        /// Ship non-code files in the archive as well
        #[arg(long)]
        packaging_workaround_includes_content: bool,

        /// Whether PyPI packages may be downloaded
        #[arg(
            long,
            default_value = "no",
            value_parser = PossibleValuesParser::new(YesNoAsk::VALUES)
                .try_map(|s| s.parse::<YesNoAsk>())
        )]
        pypi_download: YesNoAsk,

        /// Check the Anaconda channel before falling back to PyPI (default)
        #[arg(long, overrides_with = "no_check_anaconda_for_pypi_deps")]
        check_anaconda_for_pypi_deps: bool,

        /// Do not check the Anaconda channel
        #[arg(long, overrides_with = "check_anaconda_for_pypi_deps")]
        no_check_anaconda_for_pypi_deps: bool,

        /// Whether native libraries may be packaged
        #[arg(
            long,
            default_value = "no",
            value_parser = PossibleValuesParser::new(YesNoAsk::VALUES)
                .try_map(|s| s.parse::<YesNoAsk>())
        )]
        package_native_libraries: YesNoAsk,

        /// Comma-separated Anaconda packages to leave out
        #[arg(long, value_name = "PACKAGES")]
        excluded_anaconda_deps: Option<ExcludedDeps>,
    },
}

/// A Streamlit command with its parameter bag assembled
#[derive(Debug, Clone, PartialEq)]
pub enum StreamlitRequest {
    List,
    Describe(ObjectName),
    Create(CreateOptions),
    Share(ShareOptions),
    Drop(ObjectName),
    Deploy(DeployOptions),
}

impl StreamlitCommand {
    /// Validate local input and build the request
    ///
    /// Runs before any connection is configured.
    pub fn into_request(self) -> Result<StreamlitRequest> {
        Ok(match self {
            StreamlitCommand::List => StreamlitRequest::List,
            StreamlitCommand::Describe { name } => StreamlitRequest::Describe(name),
            StreamlitCommand::Create {
                name,
                file,
                from_stage,
                use_packaging_workaround,
            } => {
                validate_app_file(&file)?;
                StreamlitRequest::Create(CreateOptions {
                    name,
                    file,
                    from_stage,
                    use_packaging_workaround,
                })
            }
            StreamlitCommand::Share { name, to_role } => {
                StreamlitRequest::Share(ShareOptions::new(name, to_role))
            }
            StreamlitCommand::Drop { name } => StreamlitRequest::Drop(name),
            StreamlitCommand::Deploy {
                name,
                file,
                open,
                use_packaging_workaround,
                packaging_workaround_includes_content,
                pypi_download,
                check_anaconda_for_pypi_deps: _,
                no_check_anaconda_for_pypi_deps,
                package_native_libraries,
                excluded_anaconda_deps,
            } => {
                validate_app_file(&file)?;
                StreamlitRequest::Deploy(DeployOptions {
                    name,
                    file,
                    open_in_browser: open,
                    use_packaging_workaround,
                    packaging_workaround_includes_content,
                    pypi_download,
                    check_anaconda_for_pypi_deps: !no_check_anaconda_for_pypi_deps,
                    package_native_libraries,
                    excluded_anaconda_deps,
                })
            }
        })
    }
}

/// The main file must be an existing, readable, regular file
fn validate_app_file(path: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CliError::validation_with_help(
                format!("File '{}' does not exist", path.display()),
                "Pass the main application file with --file",
            ));
        }
        Err(e) => {
            return Err(CliError::Validation {
                message: format!("Cannot access '{}': {}", path.display(), e),
                help: None,
            });
        }
    };

    if !metadata.is_file() {
        return Err(CliError::Validation {
            message: format!("'{}' is not a regular file", path.display()),
            help: None,
        });
    }

    File::open(path).map_err(|e| CliError::Validation {
        message: format!("File '{}' is not readable: {}", path.display(), e),
        help: None,
    })?;

    Ok(())
}

/// Run a Streamlit request: one manager call, then output
pub async fn run(ctx: &mut CommandContext, request: StreamlitRequest) -> Result<()> {
    let data = match request {
        StreamlitRequest::List => {
            let apps = ctx.manager.list().await?;
            tracing::debug!(count = apps.len(), "listed applications");
            OutputData::single(CommandResult::apps(&apps))
        }
        StreamlitRequest::Describe(name) => {
            let (description, url) = ctx.manager.describe(&name).await?;
            OutputData::new()
                .add(CommandResult::description(&description))
                .add(CommandResult::Url(url))
        }
        StreamlitRequest::Create(options) => {
            let status = ctx.manager.create(&options).await?;
            OutputData::single(CommandResult::Message(status))
        }
        StreamlitRequest::Share(options) => {
            let status = ctx.manager.share(&options).await?;
            OutputData::single(CommandResult::Message(status))
        }
        StreamlitRequest::Drop(name) => {
            let status = StreamlitManager::drop(&*ctx.manager, &name).await?;
            OutputData::single(CommandResult::Message(status))
        }
        StreamlitRequest::Deploy(options) => {
            let url = deploy(ctx, &options).await?;
            OutputData::single(CommandResult::Url(url))
        }
    };

    ctx.emit(&data)
}

async fn deploy(ctx: &mut CommandContext, options: &DeployOptions) -> Result<String> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Deploying {}", options.name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = ctx.manager.deploy(options).await;
    spinner.finish_and_clear();
    let url = result?;

    if options.open_in_browser {
        // The application is live; a browser failure is not fatal
        if let Err(e) = ctx.browser.open(&url) {
            tracing::warn!(error = %e, "could not open browser");
            eprintln!("{} Could not open a browser: {}", style("⚠").yellow(), e);
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserOpener;
    use crate::output::OutputSink;
    use async_trait::async_trait;
    use clap::Parser;
    use snowctl_client::ClientError;
    use snowctl_core::{Description, StreamlitApp};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: StreamlitCommand,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Describe(ObjectName),
        Create(CreateOptions),
        Share(ShareOptions),
        Drop(ObjectName),
        Deploy(DeployOptions),
    }

    #[derive(Default, Clone)]
    struct RecordingManager {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_with: Option<String>,
    }

    impl RecordingManager {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        fn record(&self, call: Call) -> snowctl_client::Result<()> {
            self.calls.lock().unwrap().push(call);
            match &self.fail_with {
                Some(message) => Err(ClientError::Http {
                    status: 422,
                    message: message.clone(),
                    sql_state: None,
                }),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StreamlitManager for RecordingManager {
        async fn list(&self) -> snowctl_client::Result<Vec<StreamlitApp>> {
            self.record(Call::List)?;
            Ok(vec![])
        }

        async fn describe(
            &self,
            name: &ObjectName,
        ) -> snowctl_client::Result<(Description, String)> {
            self.record(Call::Describe(name.clone()))?;
            let mut fields = indexmap::IndexMap::new();
            fields.insert("name".to_string(), Some(name.object()));
            Ok((
                Description::new(fields),
                format!("https://app.example.com/#/streamlit-apps/{}", name.object()),
            ))
        }

        async fn create(&self, options: &CreateOptions) -> snowctl_client::Result<String> {
            self.record(Call::Create(options.clone()))?;
            Ok("Streamlit created".to_string())
        }

        async fn share(&self, options: &ShareOptions) -> snowctl_client::Result<String> {
            self.record(Call::Share(options.clone()))?;
            Ok("Statement executed successfully.".to_string())
        }

        async fn drop(&self, name: &ObjectName) -> snowctl_client::Result<String> {
            self.record(Call::Drop(name.clone()))?;
            Ok(format!("{} successfully dropped.", name.object()))
        }

        async fn deploy(&self, options: &DeployOptions) -> snowctl_client::Result<String> {
            self.record(Call::Deploy(options.clone()))?;
            Ok(format!(
                "https://app.example.com/#/streamlit-apps/{}",
                options.name.object()
            ))
        }
    }

    #[derive(Default, Clone)]
    struct CaptureSink(Arc<Mutex<Vec<OutputData>>>);

    impl OutputSink for CaptureSink {
        fn emit(&mut self, data: &OutputData) -> io::Result<()> {
            self.0.lock().unwrap().push(data.clone());
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct FakeBrowser(Arc<Mutex<Vec<String>>>);

    impl BrowserOpener for FakeBrowser {
        fn open(&mut self, url: &str) -> io::Result<()> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct Harness {
        manager: RecordingManager,
        sink: CaptureSink,
        browser: FakeBrowser,
        ctx: CommandContext,
    }

    fn harness(manager: RecordingManager) -> Harness {
        let sink = CaptureSink::default();
        let browser = FakeBrowser::default();
        let ctx = CommandContext::new(
            Box::new(manager.clone()),
            Box::new(browser.clone()),
            Box::new(sink.clone()),
        );
        Harness {
            manager,
            sink,
            browser,
            ctx,
        }
    }

    fn app_dir() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "import streamlit as st\n").unwrap();
        let path = file.to_string_lossy().into_owned();
        (dir, path)
    }

    fn parse(args: &[&str]) -> std::result::Result<StreamlitCommand, clap::Error> {
        TestCli::try_parse_from(std::iter::once("streamlit").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    async fn run_args(h: &mut Harness, args: &[&str]) -> Result<()> {
        let request = parse(args)
            .map_err(|e| CliError::internal(e.to_string()))?
            .into_request()?;
        run(&mut h.ctx, request).await
    }

    fn name(raw: &str) -> ObjectName {
        ObjectName::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_list_calls_manager_once() {
        let mut h = harness(RecordingManager::default());
        run_args(&mut h, &["list"]).await.unwrap();

        assert_eq!(h.manager.calls(), vec![Call::List]);
        assert_eq!(h.sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_describe_outputs_description_then_url() {
        let mut h = harness(RecordingManager::default());
        run_args(&mut h, &["describe", "dash"]).await.unwrap();

        assert_eq!(h.manager.calls(), vec![Call::Describe(name("dash"))]);

        let outputs = h.sink.0.lock().unwrap();
        let results: Vec<&CommandResult> = outputs[0].results().collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], CommandResult::Record(_)));
        assert_eq!(
            results[1],
            &CommandResult::Url("https://app.example.com/#/streamlit-apps/dash".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_forwards_options() {
        let (_dir, file) = app_dir();
        let mut h = harness(RecordingManager::default());
        run_args(
            &mut h,
            &[
                "create",
                "dash",
                "--file",
                &file,
                "--from-stage",
                "@apps/dash",
                "--use-packaging-workaround",
            ],
        )
        .await
        .unwrap();

        let expected = CreateOptions {
            name: name("dash"),
            file: PathBuf::from(&file),
            from_stage: Some(StageLocation::parse("@apps/dash").unwrap()),
            use_packaging_workaround: true,
        };
        assert_eq!(h.manager.calls(), vec![Call::Create(expected)]);
    }

    #[tokio::test]
    async fn test_share_forwards_role() {
        let mut h = harness(RecordingManager::default());
        run_args(&mut h, &["share", "dash", "analyst"]).await.unwrap();

        assert_eq!(
            h.manager.calls(),
            vec![Call::Share(ShareOptions::new(name("dash"), name("analyst")))]
        );
    }

    #[tokio::test]
    async fn test_drop_calls_manager_once() {
        let mut h = harness(RecordingManager::default());
        run_args(&mut h, &["drop", "dash"]).await.unwrap();

        assert_eq!(h.manager.calls(), vec![Call::Drop(name("dash"))]);
        let outputs = h.sink.0.lock().unwrap();
        assert_eq!(
            outputs[0].results().next(),
            Some(&CommandResult::Message("dash successfully dropped.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_deploy_forwards_all_options() {
        let (_dir, file) = app_dir();
        let mut h = harness(RecordingManager::default());
        run_args(
            &mut h,
            &[
                "deploy",
                "dash",
                "--file",
                &file,
                "--use-packaging-workaround",
                "--packaging-workaround-includes-content",
                "--pypi-download",
                "ask",
                "--no-check-anaconda-for-pypi-deps",
                "--package-native-libraries",
                "yes",
                "--excluded-anaconda-deps",
                "a,b,c",
            ],
        )
        .await
        .unwrap();

        let calls = h.manager.calls();
        assert_eq!(calls.len(), 1);
        let Call::Deploy(options) = &calls[0] else {
            panic!("expected deploy, got {:?}", calls[0]);
        };
        assert_eq!(options.name, name("dash"));
        assert_eq!(options.file, PathBuf::from(&file));
        assert!(!options.open_in_browser);
        assert!(options.use_packaging_workaround);
        assert!(options.packaging_workaround_includes_content);
        assert_eq!(options.pypi_download, YesNoAsk::Ask);
        assert!(!options.check_anaconda_for_pypi_deps);
        assert_eq!(options.package_native_libraries, YesNoAsk::Yes);

        let excluded = options.excluded_anaconda_deps.as_ref().unwrap();
        assert_eq!(excluded.raw(), "a,b,c");
        let names: Vec<&str> = excluded.names().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_deploy_defaults() {
        let (_dir, file) = app_dir();
        let mut h = harness(RecordingManager::default());
        run_args(&mut h, &["deploy", "dash", "--file", &file])
            .await
            .unwrap();

        assert_eq!(
            h.manager.calls(),
            vec![Call::Deploy(DeployOptions::new(name("dash"), &file))]
        );
    }

    #[test]
    fn test_check_anaconda_last_flag_wins() {
        let (_dir, file) = app_dir();
        let request = parse(&[
            "deploy",
            "dash",
            "--file",
            &file,
            "--no-check-anaconda-for-pypi-deps",
            "--check-anaconda-for-pypi-deps",
        ])
        .unwrap()
        .into_request()
        .unwrap();

        let StreamlitRequest::Deploy(options) = request else {
            panic!("expected deploy");
        };
        assert!(options.check_anaconda_for_pypi_deps);
    }

    #[test]
    fn test_invalid_choice_is_usage_error() {
        let err = parse(&["deploy", "dash", "--pypi-download", "maybe"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[tokio::test]
    async fn test_deploy_with_open_opens_browser() {
        let (_dir, file) = app_dir();
        let mut h = harness(RecordingManager::default());
        run_args(&mut h, &["deploy", "dash", "--file", &file, "-o"])
            .await
            .unwrap();

        assert_eq!(
            *h.browser.0.lock().unwrap(),
            vec!["https://app.example.com/#/streamlit-apps/dash".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deploy_failure_does_not_open_browser() {
        let (_dir, file) = app_dir();
        let mut h = harness(RecordingManager::failing("Insufficient privileges"));
        let err = run_args(&mut h, &["deploy", "dash", "--file", &file, "--open"])
            .await
            .unwrap_err();

        assert_eq!(h.manager.calls().len(), 1);
        assert!(h.browser.0.lock().unwrap().is_empty());
        assert!(h.sink.0.lock().unwrap().is_empty());
        assert!(err.to_string().contains("Insufficient privileges"));
        assert_eq!(err.exit_code(), crate::exit_codes::REMOTE_ERROR);
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_manager_call() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.py");
        let missing = missing.to_string_lossy();

        for command in ["create", "deploy"] {
            let mut h = harness(RecordingManager::default());
            let err = run_args(&mut h, &[command, "dash", "--file", &missing])
                .await
                .unwrap_err();

            assert_eq!(err.exit_code(), crate::exit_codes::VALIDATION_ERROR);
            assert!(err.to_string().contains("does not exist"));
            assert!(h.manager.calls().is_empty());
        }
    }

    #[test]
    fn test_directory_is_not_a_regular_file() {
        let dir = TempDir::new().unwrap();
        let err = validate_app_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_usage_error() {
        let mut h = harness(RecordingManager::default());

        let err = parse(&["share", "dash"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        assert!(run_args(&mut h, &["describe"]).await.is_err());
        assert!(h.manager.calls().is_empty());
    }

    #[test]
    fn test_invalid_name_is_rejected_by_parser() {
        let err = parse(&["drop", "a.b.c.d"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
