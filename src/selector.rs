//! Wheel selection and requirement block generation
//!
//! For each package, picks the release files of the desired version that
//! can be installed on the target interpreter and renders them as a
//! hash-pinned requirement block:
//!
//! ```text
//!   # Hashes correspond to the following packages:
//!   #  - numpy-1.26.4-cp311-cp311-win_amd64.whl
//!   #  - numpy-1.26.4-cp311-cp311-manylinux_2_17_x86_64.whl
//!   numpy==1.26.4 --hash=sha256:aaaa \
//!                 --hash=sha256:bbbb
//! ```
//!
//! The filename comments are only emitted when more than one wheel matched.

use crate::interpreter::CpythonTag;
use crate::listing::PackageRecord;
use crate::pypi::{IndexClient, IndexError, ReleaseFile};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Indentation of generated lines inside a hint block
pub const INDENTATION: usize = 2;

/// Interpreter tags compatible with every CPython 3
const UNIVERSAL_PYTHON_TAGS: [&str; 2] = ["py3", "py2.py3"];

/// Marker of wheels built against the stable ABI (usable on later versions)
const ABI_STABLE_MARKER: &str = "abi3";

/// Pure python, 64-bit (win_amd64, x86_64, aarch64) and universal macOS wheels
const ACCEPTED_SUFFIXES: [&str; 3] = ["py3-none-any.whl", "64.whl", "universal2.whl"];

#[derive(Error, Debug)]
pub enum SelectError {
    #[error(
        "Unable to find a wheel of version {version} for {tag}. This package might need an updated package version for the specified CPython tag."
    )]
    NoEligibleWheel { version: String, tag: String },

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagingType {
    Wheel,
    Other(String),
}

impl From<&str> for PackagingType {
    fn from(value: &str) -> Self {
        match value {
            "bdist_wheel" => PackagingType::Wheel,
            other => PackagingType::Other(other.to_string()),
        }
    }
}

/// A release file considered for pinning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionArtifact {
    pub filename: String,
    pub python_tag: String,
    pub packaging_type: PackagingType,
    pub digest_sha256: String,
}

impl From<&ReleaseFile> for DistributionArtifact {
    fn from(file: &ReleaseFile) -> Self {
        Self {
            filename: file.filename.clone(),
            python_tag: file.python_version.clone(),
            packaging_type: PackagingType::from(file.packagetype.as_str()),
            digest_sha256: file.digests.sha256.clone(),
        }
    }
}

impl DistributionArtifact {
    /// Whether the artifact can be installed on `target`
    pub fn is_eligible(&self, target: &CpythonTag) -> bool {
        let tag_ok = UNIVERSAL_PYTHON_TAGS.contains(&self.python_tag.as_str())
            || self.python_tag == target.as_str()
            || self.filename.contains(ABI_STABLE_MARKER);

        // Building from source can require complex build tools
        let wheel_ok = self.packaging_type == PackagingType::Wheel;

        let suffix_ok = ACCEPTED_SUFFIXES
            .iter()
            .any(|suffix| self.filename.ends_with(suffix));

        tag_ok && wheel_ok && suffix_ok
    }
}

/// Replacement text for one package's hint block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedBlock {
    pub package_name: String,
    pub version: String,
    /// Lines between the opening and closing hints, newline terminated
    pub text: String,
}

/// Inputs deciding which version and which wheels get pinned
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    /// Interpreter the pins are generated for
    pub target_tag: CpythonTag,
    /// Interpreter pip reported versions for
    pub interpreter_tag: CpythonTag,
    /// Packages never pinned (e.g. wrapped by the host application)
    pub excluded: BTreeSet<String>,
}

impl SelectionPolicy {
    /// Latest versions are only trusted when pip ran on the target interpreter
    pub fn desired_version<'a>(&self, record: &'a PackageRecord) -> &'a str {
        if self.target_tag == self.interpreter_tag {
            &record.latest_version
        } else {
            &record.current_version
        }
    }

    pub fn is_excluded(&self, package: &str) -> bool {
        self.excluded.contains(package)
    }
}

/// Outcome of selecting wheels for every listed package
#[derive(Debug, Default)]
pub struct Selection {
    pub blocks: BTreeMap<String, GeneratedBlock>,
    pub failures: Vec<(String, SelectError)>,
    pub skipped: Vec<String>,
}

/// Keep the eligible artifacts of `files`, in index order
pub fn eligible_artifacts(files: &[ReleaseFile], target: &CpythonTag) -> Vec<DistributionArtifact> {
    files
        .iter()
        .map(DistributionArtifact::from)
        .filter(|artifact| artifact.is_eligible(target))
        .collect()
}

/// Render the requirement lines for `package` pinned to `version`
///
/// The first hash shares the line with the pin; further hashes are
/// continued on their own lines, aligned under the first one.
pub fn render_block(package: &str, version: &str, artifacts: &[DistributionArtifact]) -> String {
    let indent = " ".repeat(INDENTATION);
    let pin = format!("{indent}{package}=={version} ");
    let joiner = format!(" \\\n{}", " ".repeat(pin.len()));

    let hashes: Vec<String> = artifacts
        .iter()
        .map(|artifact| format!("--hash=sha256:{}", artifact.digest_sha256))
        .collect();

    let mut text = String::new();
    if artifacts.len() > 1 {
        text.push_str(&format!("{indent}# Hashes correspond to the following packages:\n"));
        for artifact in artifacts {
            text.push_str(&format!("{indent}#  - {}\n", artifact.filename));
        }
    }
    text.push_str(&pin);
    text.push_str(&hashes.join(&joiner));
    text.push('\n');
    text
}

/// Pick the wheels of one package and render its block
pub fn select_package(
    record: &PackageRecord,
    policy: &SelectionPolicy,
    index: &dyn IndexClient,
) -> Result<GeneratedBlock, SelectError> {
    let version = policy.desired_version(record);
    let metadata = index.fetch_project(&record.name)?;

    let artifacts = eligible_artifacts(metadata.files_for(version), &policy.target_tag);
    if artifacts.is_empty() {
        return Err(SelectError::NoEligibleWheel {
            version: version.to_string(),
            tag: policy.target_tag.to_string(),
        });
    }

    tracing::debug!(
        package = %record.name,
        version,
        wheels = artifacts.len(),
        "selected wheels"
    );

    Ok(GeneratedBlock {
        package_name: record.name.clone(),
        version: version.to_string(),
        text: render_block(&record.name, version, &artifacts),
    })
}

/// Select wheels for every package; failures are collected, not fatal
pub fn select_all(
    packages: &BTreeMap<String, PackageRecord>,
    policy: &SelectionPolicy,
    index: &dyn IndexClient,
) -> Selection {
    let mut selection = Selection::default();

    for (name, record) in packages {
        if policy.is_excluded(name) {
            tracing::info!(package = %name, "skipping excluded package");
            selection.skipped.push(name.clone());
            continue;
        }

        match select_package(record, policy, index) {
            Ok(block) => {
                selection.blocks.insert(name.clone(), block);
            }
            Err(e) => {
                tracing::warn!(package = %name, error = %e, "no block generated");
                selection.failures.push((name.clone(), e));
            }
        }
    }

    selection
}
