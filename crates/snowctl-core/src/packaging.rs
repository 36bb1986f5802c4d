//! Packaging workaround
//!
//! Bundles an application directory into `app.tar.gz` together with a
//! launcher that unpacks it at startup. Used when the service cannot resolve
//! the application's dependencies natively.
//!
//! Produced artifacts (all written to the output directory):
//! - `app.tar.gz` - the application sources (and content, if requested)
//! - `streamlit_app_launcher.py` - the main file registered with the service
//! - `environment.yml` - Anaconda dependencies, when `requirements.txt` exists
//! - `packaging.json` - the dependency handling switches for the service

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Builder;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::options::{ExcludedDeps, YesNoAsk};

pub const ARCHIVE_NAME: &str = "app.tar.gz";
pub const LAUNCHER_NAME: &str = "streamlit_app_launcher.py";
pub const ENVIRONMENT_NAME: &str = "environment.yml";
pub const MANIFEST_NAME: &str = "packaging.json";
pub const REQUIREMENTS_NAME: &str = "requirements.txt";

const LAUNCHER_TEMPLATE: &str = r#"import hashlib
import os
import sys
import tarfile
import tempfile

_here = os.path.dirname(os.path.abspath(__file__))
_archive = os.path.join(_here, "app.tar.gz")
_main = {main}

with open(_archive, "rb") as _f:
    _digest = hashlib.sha256(_f.read()).hexdigest()[:16]
_target = os.path.join(tempfile.gettempdir(), "streamlit_app_" + _digest)

if not os.path.isdir(_target):
    _staging = tempfile.mkdtemp(dir=tempfile.gettempdir())
    with tarfile.open(_archive) as archive:
        archive.extractall(_staging)
    try:
        os.rename(_staging, _target)
    except OSError:
        if not os.path.isdir(_target):
            raise

sys.path.insert(0, _target)
{chdir}
with open(os.path.join(_target, _main)) as main_file:
    exec(compile(main_file.read(), _main, "exec"))
"#;

/// Dependency and content switches for the packaging workaround
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagingOptions {
    /// Archive every file, not only Python sources
    pub includes_content: bool,
    pub pypi_download: YesNoAsk,
    pub check_anaconda_for_pypi_deps: bool,
    pub package_native_libraries: YesNoAsk,
    pub excluded_anaconda_deps: ExcludedDeps,
}

/// A single line of `requirements.txt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Package name
    pub name: String,
    /// The full requirement line (name plus version specifier)
    pub line: String,
}

/// Artifacts produced by [`package_app`]
#[derive(Debug, Clone)]
pub struct PackagedApp {
    pub archive: PathBuf,
    pub launcher: PathBuf,
    pub environment: Option<PathBuf>,
    pub manifest: PathBuf,
    /// Archived files, relative to the application directory
    pub files: Vec<String>,
}

impl PackagedApp {
    /// Every artifact that has to be uploaded, launcher first
    pub fn artifacts(&self) -> Vec<&Path> {
        let mut paths = vec![self.launcher.as_path(), self.archive.as_path()];
        if let Some(env) = &self.environment {
            paths.push(env.as_path());
        }
        paths.push(self.manifest.as_path());
        paths
    }
}

#[derive(Debug, Serialize)]
struct PackagingManifest<'a> {
    main_file: &'a str,
    includes_content: bool,
    pypi_download: YesNoAsk,
    check_anaconda_for_pypi_deps: bool,
    package_native_libraries: YesNoAsk,
    excluded_anaconda_deps: Vec<&'a str>,
    files: &'a [String],
}

#[derive(Debug, Serialize)]
struct Environment {
    name: String,
    channels: Vec<String>,
    dependencies: Vec<String>,
}

/// Package the directory holding `main_file` into `out_dir`
pub fn package_app(
    main_file: &Path,
    options: &PackagingOptions,
    out_dir: &Path,
) -> Result<PackagedApp> {
    let root = match main_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let main_name = main_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| CoreError::Packaging {
            message: format!("'{}' is not a file path", main_file.display()),
        })?;

    std::fs::create_dir_all(out_dir)?;
    let out_canonical = out_dir.canonicalize()?;

    // Collect files
    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e.path(), &out_canonical));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_python = entry.path().extension().is_some_and(|ext| ext == "py");
        if options.includes_content || is_python {
            let rel = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            files.push(rel);
        }
    }

    if !files.iter().any(|f| f == &main_name) {
        files.push(main_name.clone());
    }
    tracing::debug!(count = files.len(), root = %root.display(), "packaging application files");

    // Archive
    let archive = out_dir.join(ARCHIVE_NAME);
    let encoder = GzEncoder::new(File::create(&archive)?, Compression::default());
    let mut builder = Builder::new(encoder);
    for rel in &files {
        builder.append_path_with_name(root.join(rel), rel)?;
    }
    builder.into_inner()?.finish()?;

    // Launcher
    let launcher = out_dir.join(LAUNCHER_NAME);
    let chdir = if options.includes_content {
        "os.chdir(_target)\n"
    } else {
        ""
    };
    // JSON string syntax is a valid Python string literal
    let main_literal = serde_json::to_string(&main_name)?;
    let script = LAUNCHER_TEMPLATE
        .replace("{chdir}", chdir)
        .replace("{main}", &main_literal);
    std::fs::write(&launcher, script)?;

    // Environment
    let requirements_path = root.join(REQUIREMENTS_NAME);
    let environment = if requirements_path.is_file() {
        let content = std::fs::read_to_string(&requirements_path)?;
        let requirements = parse_requirements(&content);
        let dependencies: Vec<String> = requirements
            .into_iter()
            .filter(|r| !options.excluded_anaconda_deps.contains(&r.name))
            .map(|r| r.line)
            .collect();

        let env = Environment {
            name: "sf_env".to_string(),
            channels: vec!["snowflake".to_string()],
            dependencies,
        };
        let path = out_dir.join(ENVIRONMENT_NAME);
        std::fs::write(&path, serde_yaml::to_string(&env)?)?;
        Some(path)
    } else {
        None
    };

    // Manifest
    let manifest = out_dir.join(MANIFEST_NAME);
    let manifest_data = PackagingManifest {
        main_file: &main_name,
        includes_content: options.includes_content,
        pypi_download: options.pypi_download,
        check_anaconda_for_pypi_deps: options.check_anaconda_for_pypi_deps,
        package_native_libraries: options.package_native_libraries,
        excluded_anaconda_deps: options
            .excluded_anaconda_deps
            .names()
            .iter()
            .map(String::as_str)
            .collect(),
        files: &files,
    };
    std::fs::write(&manifest, serde_json::to_string_pretty(&manifest_data)?)?;

    Ok(PackagedApp {
        archive,
        launcher,
        environment,
        manifest,
        files,
    })
}

/// Parse `requirements.txt` content
///
/// Blank lines, comments and pip options (`-r`, `--index-url`, ...) are
/// skipped. Inline comments are stripped.
pub fn parse_requirements(content: &str) -> Vec<Requirement> {
    content
        .lines()
        .filter_map(|line| {
            let line = match line.find(" #") {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
                return None;
            }

            let end = line
                .find(|c: char| "<>=!~;[@ ".contains(c))
                .unwrap_or(line.len());
            let name = line[..end].trim();
            if name.is_empty() {
                return None;
            }

            Some(Requirement {
                name: name.to_string(),
                line: line.to_string(),
            })
        })
        .collect()
}

fn is_skipped(path: &Path, out_dir: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| {
            let n = n.to_string_lossy();
            n.starts_with('.') || n == "__pycache__"
        })
        .unwrap_or(false);

    hidden || path.canonicalize().is_ok_and(|p| p == out_dir)
}
