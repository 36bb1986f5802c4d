//! snowctl - manage Streamlit applications from the command line

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod browser;
mod commands;
mod error;
mod exit_codes;
mod logging;
mod output;

use commands::streamlit::StreamlitCommand;
use commands::{CommandContext, Request};
use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "snowctl")]
#[command(author = "snowctl Contributors")]
#[command(version)]
#[command(about = "Manage Streamlit applications on a hosted data platform", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Connection name from the configuration file
    #[arg(short, long, global = true, env = "SNOWCTL_CONNECTION")]
    connection: Option<String>,

    /// Configuration file (default: $SNOWFLAKE_HOME/config.yaml)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage Streamlit applications
    Streamlit {
        #[command(subcommand)]
        command: StreamlitCommand,
    },
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(exit_codes::USAGE_ERROR);
            }
        },
    };

    if cli.debug {
        // SAFETY: We're the only thread at this point (runtime not started)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    logging::init(cli.verbose, cli.debug);

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| error::CliError::internal(format!("failed to start runtime: {e}")))
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        let code = err.exit_code();
        tracing::debug!(code, "command failed");
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> error::Result<()> {
    // Local input is checked before any configuration is read
    let request = match cli.command {
        Commands::Streamlit { command } => Request::Streamlit(command.into_request()?),
    };

    let mut ctx = CommandContext::connect(
        cli.config_file.as_deref(),
        cli.connection.as_deref(),
        cli.format,
    )?;
    commands::dispatch(&mut ctx, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "snowctl",
            "streamlit",
            "list",
            "--format",
            "json",
            "-vv",
            "--connection",
            "dev",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.connection.as_deref(), Some("dev"));
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = Cli::try_parse_from(["snowctl", "streamlit", "share", "dash"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(exit_codes::USAGE_ERROR, 64);
    }

    #[test]
    fn test_validation_error_report_keeps_message() {
        let err = error::CliError::validation_with_help("File 'x' does not exist", "use --file");
        let report = format!("{:?}", miette::Report::new(err));
        assert!(report.contains("does not exist"));
    }
}
