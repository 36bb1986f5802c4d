//! Opening application URLs in a web browser

use std::io;
use std::process::{Command, Stdio};

/// Opens a URL for the user
pub trait BrowserOpener: Send {
    fn open(&mut self, url: &str) -> io::Result<()>;
}

/// Uses the platform's default URL handler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&mut self, url: &str) -> io::Result<()> {
        let (program, args) = launcher(url);
        tracing::debug!(program, url, "opening browser");

        let status = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{program} exited with {status}")))
        }
    }
}

#[cfg(target_os = "macos")]
fn launcher(url: &str) -> (&'static str, Vec<String>) {
    ("open", vec![url.to_string()])
}

#[cfg(target_os = "windows")]
fn launcher(url: &str) -> (&'static str, Vec<String>) {
    // `start` treats the first quoted argument as a window title
    (
        "cmd",
        vec!["/C".into(), "start".into(), String::new(), url.to_string()],
    )
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launcher(url: &str) -> (&'static str, Vec<String>) {
    ("xdg-open", vec![url.to_string()])
}
