//! CPython interpreter tags
//!
//! Wheels are matched against tags of the form `cpXY` (e.g. `cp311`). The tag
//! of the interpreter used to run pip is obtained by asking it directly.

use serde::Serialize;
use std::fmt;
use std::process::Command;
use std::str::FromStr;
use thiserror::Error;

const PROBE_SCRIPT: &str =
    "import sys; print(f'cp{sys.version_info.major}{sys.version_info.minor}')";

#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error("Failed to execute {python}: {source}")]
    Exec {
        python: String,
        source: std::io::Error,
    },

    #[error("{python} exited with an error: {message}")]
    CommandFailed { python: String, message: String },

    #[error("Invalid CPython tag '{0}'. Expected: cp<major><minor> (e.g. cp311)")]
    InvalidTag(String),
}

/// A CPython tag such as `cp311`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CpythonTag(String);

impl CpythonTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CpythonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CpythonTag {
    type Err = InterpreterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        let valid = tag
            .strip_prefix("cp")
            .is_some_and(|digits| digits.len() >= 2 && digits.chars().all(|c| c.is_ascii_digit()));

        if valid {
            Ok(CpythonTag(tag))
        } else {
            Err(InterpreterError::InvalidTag(s.to_string()))
        }
    }
}

/// Ask `python` for its own CPython tag
pub fn probe_tag(python: &str) -> Result<CpythonTag, InterpreterError> {
    let output = Command::new(python)
        .args(["-c", PROBE_SCRIPT])
        .output()
        .map_err(|source| InterpreterError::Exec {
            python: python.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(InterpreterError::CommandFailed {
            python: python.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let tag: CpythonTag = String::from_utf8_lossy(&output.stdout).parse()?;
    tracing::debug!(python, %tag, "probed interpreter tag");
    Ok(tag)
}
