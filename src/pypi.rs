//! PyPI registry integration
//!
//! Fetches release metadata from the PyPI JSON API
//! (`{index_url}/pypi/{package}/json`). Lookups that fail on transport
//! errors or server-side statuses are retried with exponential backoff.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Package '{package}' not found on the package index")]
    NotFound { package: String },

    #[error("Package index returned HTTP {status} for '{package}'")]
    Status { package: String, status: u16 },

    #[error("Failed to fetch package info for '{package}': {message}")]
    Fetch { package: String, message: String },

    #[error("Failed to parse package index response for '{package}': {message}")]
    Parse { package: String, message: String },
}

impl IndexError {
    /// Whether a new attempt could succeed
    fn is_retryable(&self) -> bool {
        match self {
            IndexError::NotFound { .. } | IndexError::Parse { .. } => false,
            IndexError::Status { status, .. } => *status == 429 || *status >= 500,
            IndexError::Fetch { .. } => true,
        }
    }
}

/// PyPI JSON API response structure
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub releases: HashMap<String, Vec<ReleaseFile>>,
}

impl ProjectMetadata {
    /// Files published for `version`, empty when the version is unknown
    pub fn files_for(&self, version: &str) -> &[ReleaseFile] {
        self.releases.get(version).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A single distribution file of a release
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseFile {
    pub filename: String,
    /// `py3`, `py2.py3`, `cp311`, `source`, ...
    pub python_version: String,
    /// `bdist_wheel`, `sdist`, ...
    pub packagetype: String,
    pub digests: Digests,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Digests {
    pub sha256: String,
}

/// Source of release metadata for packages
pub trait IndexClient {
    fn fetch_project(&self, package: &str) -> Result<ProjectMetadata, IndexError>;
}

/// Retry policy for index lookups
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following one
    pub backoff: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Blocking client for the PyPI JSON API
pub struct PypiClient {
    agent: ureq::Agent,
    base_url: String,
    retry: RetryPolicy,
}

impl Default for PypiClient {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_URL, Duration::from_secs(30), RetryPolicy::default())
    }
}

impl PypiClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .user_agent(concat!("pinsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .into();

        Self::with_agent(agent, base_url, retry)
    }

    pub fn with_agent(agent: ureq::Agent, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    pub fn project_url(&self, package: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, package)
    }

    fn fetch_once(&self, package: &str) -> Result<ProjectMetadata, IndexError> {
        let url = self.project_url(package);

        let response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(404) => IndexError::NotFound {
                package: package.to_string(),
            },
            ureq::Error::StatusCode(status) => IndexError::Status {
                package: package.to_string(),
                status,
            },
            other => IndexError::Fetch {
                package: package.to_string(),
                message: other.to_string(),
            },
        })?;

        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| IndexError::Fetch {
                package: package.to_string(),
                message: e.to_string(),
            })?;

        serde_json::from_str(&body).map_err(|e| IndexError::Parse {
            package: package.to_string(),
            message: e.to_string(),
        })
    }
}

impl IndexClient for PypiClient {
    fn fetch_project(&self, package: &str) -> Result<ProjectMetadata, IndexError> {
        let mut attempt = 0;
        loop {
            tracing::debug!(package, attempt, url = %self.project_url(package), "fetching release metadata");
            match self.fetch_once(package) {
                Ok(metadata) => return Ok(metadata),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(package, error = %e, ?delay, "index lookup failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
