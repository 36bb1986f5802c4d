//! Parameter bags for the Streamlit commands
//!
//! Each command builds exactly one of these from its parsed arguments and
//! hands it to the manager. None of them outlive the invocation.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CoreError;
use crate::identifier::{ObjectName, StageLocation};
use crate::packaging::PackagingOptions;

/// Main file used when `--file` is not given
pub const DEFAULT_APP_FILE: &str = "streamlit_app.py";

/// Three-way answer used by the dependency packaging switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNoAsk {
    Yes,
    #[default]
    No,
    Ask,
}

impl YesNoAsk {
    pub const VALUES: [&'static str; 3] = ["yes", "no", "ask"];

    pub fn as_str(&self) -> &'static str {
        match self {
            YesNoAsk::Yes => "yes",
            YesNoAsk::No => "no",
            YesNoAsk::Ask => "ask",
        }
    }
}

impl fmt::Display for YesNoAsk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YesNoAsk {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(YesNoAsk::Yes),
            "no" => Ok(YesNoAsk::No),
            "ask" => Ok(YesNoAsk::Ask),
            _ => Err(CoreError::InvalidChoice {
                value: s.to_string(),
                expected: Self::VALUES.join(", "),
            }),
        }
    }
}

/// Anaconda packages to leave out of `environment.yml`
///
/// The raw comma-separated string is kept verbatim next to the parsed set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedDeps {
    raw: String,
    names: IndexSet<String>,
}

impl ExcludedDeps {
    /// Parse a comma-separated package list
    pub fn parse(raw: &str) -> Self {
        let names = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw: raw.to_string(),
            names,
        }
    }

    /// The string exactly as given on the command line
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed package names in the order given
    pub fn names(&self) -> &IndexSet<String> {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether a requirement name is excluded
    ///
    /// Comparison follows Python package name normalization: case and the
    /// separators `-`, `_` and `.` are not significant.
    pub fn contains(&self, package: &str) -> bool {
        let wanted = normalize_package_name(package);
        self.names
            .iter()
            .any(|n| normalize_package_name(n) == wanted)
    }
}

impl FromStr for ExcludedDeps {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

fn normalize_package_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace(['_', '.'], "-")
}

/// Options for `streamlit create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOptions {
    /// Application name
    pub name: ObjectName,

    /// Main application file
    pub file: PathBuf,

    /// Stage to copy the application files from
    pub from_stage: Option<StageLocation>,

    /// Bundle code and dependencies into an archive
    pub use_packaging_workaround: bool,
}

impl CreateOptions {
    /// Create options with the default file and no stage
    pub fn new(name: ObjectName) -> Self {
        Self {
            name,
            file: PathBuf::from(DEFAULT_APP_FILE),
            from_stage: None,
            use_packaging_workaround: false,
        }
    }
}

/// Options for `streamlit share`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareOptions {
    /// Application name
    pub name: ObjectName,

    /// Role to grant usage to
    pub to_role: ObjectName,
}

impl ShareOptions {
    pub fn new(name: ObjectName, to_role: ObjectName) -> Self {
        Self { name, to_role }
    }
}

/// Options for `streamlit deploy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOptions {
    /// Application name
    pub name: ObjectName,

    /// Main application file
    pub file: PathBuf,

    /// Open the deployed application in a browser
    pub open_in_browser: bool,

    /// Bundle code and dependencies into an archive
    pub use_packaging_workaround: bool,

    /// Ship non-code files in the archive and unpack them next to the app
    pub packaging_workaround_includes_content: bool,

    /// Whether PyPI packages may be downloaded
    pub pypi_download: YesNoAsk,

    /// Check the Anaconda channel before falling back to PyPI
    pub check_anaconda_for_pypi_deps: bool,

    /// Whether native libraries may be packaged
    pub package_native_libraries: YesNoAsk,

    /// Packages to leave out of `environment.yml`
    pub excluded_anaconda_deps: Option<ExcludedDeps>,
}

impl DeployOptions {
    /// Create deploy options with defaults for everything but name and file
    pub fn new(name: ObjectName, file: impl Into<PathBuf>) -> Self {
        Self {
            name,
            file: file.into(),
            open_in_browser: false,
            use_packaging_workaround: false,
            packaging_workaround_includes_content: false,
            pypi_download: YesNoAsk::No,
            check_anaconda_for_pypi_deps: true,
            package_native_libraries: YesNoAsk::No,
            excluded_anaconda_deps: None,
        }
    }

    /// Packaging settings carried by this deploy
    pub fn packaging(&self) -> PackagingOptions {
        PackagingOptions {
            includes_content: self.packaging_workaround_includes_content,
            pypi_download: self.pypi_download,
            check_anaconda_for_pypi_deps: self.check_anaconda_for_pypi_deps,
            package_native_libraries: self.package_native_libraries,
            excluded_anaconda_deps: self.excluded_anaconda_deps.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_no_ask_parsing() {
        assert_eq!("yes".parse::<YesNoAsk>().unwrap(), YesNoAsk::Yes);
        assert_eq!("ASK".parse::<YesNoAsk>().unwrap(), YesNoAsk::Ask);
        assert_eq!(YesNoAsk::default(), YesNoAsk::No);

        let err = "maybe".parse::<YesNoAsk>().unwrap_err();
        assert!(err.to_string().contains("yes, no, ask"));
    }

    #[test]
    fn test_excluded_deps_keeps_raw_string() {
        let deps = ExcludedDeps::parse("a,b,c");
        assert_eq!(deps.raw(), "a,b,c");
        let names: Vec<&str> = deps.names().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_excluded_deps_trims_and_dedups() {
        let deps = ExcludedDeps::parse(" numpy , ,pandas,numpy ");
        assert_eq!(deps.names().len(), 2);
        assert!(deps.contains("NumPy"));
        assert!(!deps.contains("scipy"));
    }

    #[test]
    fn test_excluded_deps_normalizes_separators() {
        let deps = ExcludedDeps::parse("scikit_learn");
        assert!(deps.contains("scikit-learn"));
        assert!(deps.contains("Scikit.Learn"));
    }

    #[test]
    fn test_deploy_defaults() {
        let name = ObjectName::parse("app").unwrap();
        let opts = DeployOptions::new(name, DEFAULT_APP_FILE);
        assert!(!opts.open_in_browser);
        assert!(opts.check_anaconda_for_pypi_deps);
        assert_eq!(opts.pypi_download, YesNoAsk::No);
        assert!(opts.packaging().excluded_anaconda_deps.is_empty());
    }
}
