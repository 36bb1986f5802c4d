//! Diagnostic logging on stderr

use tracing_subscriber::EnvFilter;

/// Default filter for a `-v` count
///
/// `--debug` raises the level to at least debug.
fn level_for(verbose: u8, debug: bool) -> &'static str {
    let verbose = if debug { verbose.max(2) } else { verbose };
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the command-line flags when set.
pub fn init(verbose: u8, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, debug)));

    // A subscriber may already be installed when running under a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init();
}
