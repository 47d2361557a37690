//! `pip list` integration
//!
//! Runs `python -m pip list` (optionally with `--outdated`) and parses the
//! tabular output into a mapping of package name to versions:
//!
//! ```text
//! Package    Version Latest Type
//! ---------- ------- ------ -----
//! asn1crypto 0.24.0  1.4.0  wheel
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

/// Number of heading lines printed by `pip list` before the first package row
const HEADER_LINES: usize = 2;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Failed to execute {python}: {source}")]
    Exec {
        python: String,
        source: std::io::Error,
    },

    #[error("pip list failed: {message}")]
    CommandFailed { message: String },
}

/// Versions reported by pip for a single installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub current_version: String,
    /// Same as `current_version` unless the listing came from `--outdated`
    pub latest_version: String,
}

/// Which packages to ask pip about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Installed,
    Outdated,
}

/// A `pip list` invocation
#[derive(Debug, Clone)]
pub struct PipList {
    pub python: String,
    pub path: Option<PathBuf>,
    pub kind: ListingKind,
}

impl PipList {
    pub fn new(python: &str, kind: ListingKind) -> Self {
        Self {
            python: python.to_string(),
            path: None,
            kind,
        }
    }

    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    /// Arguments passed to the python executable
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-m".to_string(), "pip".to_string(), "list".to_string()];
        if let Some(path) = &self.path {
            args.push("--path".to_string());
            args.push(path.display().to_string());
        }
        if self.kind == ListingKind::Outdated {
            args.push("--outdated".to_string());
        }
        args
    }

    /// Run pip and return its raw stdout
    pub fn run(&self) -> Result<String, ListingError> {
        tracing::debug!(python = %self.python, args = ?self.args(), "running pip list");

        let output = Command::new(&self.python)
            .args(self.args())
            .output()
            .map_err(|source| ListingError::Exec {
                python: self.python.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ListingError::CommandFailed {
                message: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::info!("{}", stdout.trim_end());
        Ok(stdout)
    }

    /// Run pip and parse the listing
    pub fn packages(&self) -> Result<BTreeMap<String, PackageRecord>, ListingError> {
        Ok(parse_pip_list(&self.run()?))
    }
}

/// Parse the output of `pip list` or `pip list --outdated`
///
/// The first two lines are headings. Parsing stops at the first blank line.
/// A third column, when present, is the latest available version; otherwise
/// the current version doubles as the latest. Later duplicates win.
pub fn parse_pip_list(text: &str) -> BTreeMap<String, PackageRecord> {
    let mut packages = BTreeMap::new();

    for line in text.lines().skip(HEADER_LINES) {
        if line.trim().is_empty() {
            break;
        }

        // e.g. ["asn1crypto", "0.24.0", "1.4.0", "wheel"]
        let mut tokens = line.split_whitespace();
        let (Some(name), Some(current)) = (tokens.next(), tokens.next()) else {
            tracing::warn!(line, "skipping malformed pip list row");
            continue;
        };
        let latest = tokens.next().unwrap_or(current);

        packages.insert(
            name.to_string(),
            PackageRecord {
                name: name.to_string(),
                current_version: current.to_string(),
                latest_version: latest.to_string(),
            },
        );
    }

    packages
}
