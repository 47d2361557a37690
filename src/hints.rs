//! Package hint validation
//!
//! External project files mark auto-generated requirements with a pair of
//! comment hints:
//!
//! ```text
//! # [packagename]
//! <auto-generated-requirements>
//! # [/packagename]
//! ```
//!
//! Hints are collected in file order and checked two at a time. Every opening
//! hint must be followed by the closing hint for the same package.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// A hint line: optional leading whitespace, `# [`, the name, `]`, end of line.
/// Lines may end with `\n` or `\r\n`.
static HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mR)^\s*# \[(/?[\w\-\])]+)\]$").expect("hint regex is valid")
});

#[derive(Error, Debug)]
pub enum HintsError {
    #[error("Search directory {path} does not exist")]
    MissingDirectory { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A badly paired hint found in an external project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HintMismatch {
    /// `# [first]` closed by `# [/second]`
    Mismatch {
        path: PathBuf,
        first: String,
        second: String,
    },
    /// A trailing hint with nothing to pair with
    Unterminated { path: PathBuf, name: String },
}

impl fmt::Display for HintMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintMismatch::Mismatch {
                path,
                first,
                second,
            } => write!(f, "{}\n  {} != {}", path.display(), first, second),
            HintMismatch::Unterminated { path, name } => {
                write!(f, "{}\n  {} is never closed", path.display(), name)
            }
        }
    }
}

/// List every regular file below `dir`, in sorted order, without following symlinks
pub fn external_project_files(dir: &Path) -> Result<Vec<PathBuf>, HintsError> {
    if !dir.is_dir() {
        return Err(HintsError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), HintsError> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| HintsError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in read_dir {
        let entry = entry.map_err(|source| HintsError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type().map_err(|source| HintsError::ReadDir {
            path: entry.path(),
            source,
        })?;

        // Symlinks are not followed; they could lead out of the tree
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }

    Ok(())
}

/// Read an external project file as text
pub(crate) fn read_text(path: &Path) -> Result<String, HintsError> {
    std::fs::read_to_string(path).map_err(|source| HintsError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract hint names in file order, e.g. `["numpy", "/numpy"]`
pub fn hint_names(text: &str) -> Vec<&str> {
    HINT_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Check the hints of a single file's contents
pub fn check_text(path: &Path, text: &str) -> Vec<HintMismatch> {
    let names = hint_names(text);
    let mut mismatches = Vec::new();

    let mut pairs = names.chunks_exact(2);
    for pair in &mut pairs {
        let first = pair[0];
        let second = pair[1].strip_prefix('/').unwrap_or(pair[1]);
        if first != second {
            mismatches.push(HintMismatch::Mismatch {
                path: path.to_path_buf(),
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    if let [name] = pairs.remainder() {
        mismatches.push(HintMismatch::Unterminated {
            path: path.to_path_buf(),
            name: name.to_string(),
        });
    }

    mismatches
}

/// Check that every external project file below `dir` has matching hint pairs
///
/// Returns the mismatches found across the whole tree; empty means valid.
pub fn validate(dir: &Path) -> Result<Vec<HintMismatch>, HintsError> {
    let mut mismatches = Vec::new();

    for path in external_project_files(dir)? {
        let text = read_text(&path)?;
        let found = check_text(&path, &text);
        if !found.is_empty() {
            tracing::debug!(path = %path.display(), count = found.len(), "hint mismatches");
        }
        mismatches.extend(found);
    }

    Ok(mismatches)
}

/// Format mismatches for display, one entry per mismatch
pub fn mismatch_summary(mismatches: &[HintMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
