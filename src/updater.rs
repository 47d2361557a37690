//! Update driver
//!
//! Validates the hints of the search directory, then regenerates the hint
//! blocks of every listed package:
//!
//! 1. Validation always runs first; mismatches stop the run before any write
//! 2. Installed or outdated packages are listed with pip
//! 3. Wheels are selected from the package index for each package
//! 4. The generated blocks are written back into the search directory

use crate::hints::{self, HintMismatch, HintsError};
use crate::interpreter::{self, CpythonTag, InterpreterError};
use crate::listing::{ListingError, ListingKind, PackageRecord, PipList};
use crate::pypi::IndexClient;
use crate::rewrite::{self, RewriteError};
use crate::selector::{self, GeneratedBlock, SelectionPolicy};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error(transparent)]
    Hints(#[from] HintsError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Interpreter(#[from] InterpreterError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// Provider of the interpreter tag and installed package listings
pub trait PackageSource {
    /// Tag of the interpreter the listings describe
    fn interpreter_tag(&self) -> Result<CpythonTag, UpdaterError>;

    fn packages(&self, kind: ListingKind)
    -> Result<BTreeMap<String, PackageRecord>, UpdaterError>;
}

/// Package source backed by `python -m pip list`
pub struct PipSource {
    pub python: String,
    /// Forwarded to pip as `--path`
    pub installation_path: Option<PathBuf>,
}

impl PackageSource for PipSource {
    fn interpreter_tag(&self) -> Result<CpythonTag, UpdaterError> {
        Ok(interpreter::probe_tag(&self.python)?)
    }

    fn packages(
        &self,
        kind: ListingKind,
    ) -> Result<BTreeMap<String, PackageRecord>, UpdaterError> {
        let list = PipList::new(&self.python, kind).with_path(self.installation_path.clone());
        Ok(list.packages()?)
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub search_directory: PathBuf,
    /// Target interpreter; defaults to the interpreter running pip
    pub cpython_tag: Option<CpythonTag>,
    pub from_installed: bool,
    pub validate_only: bool,
    pub dry_run: bool,
    pub excluded: BTreeSet<String>,
}

/// A package that could not be pinned
#[derive(Debug, Clone, Serialize)]
pub struct PackageFailure {
    pub package: String,
    pub message: String,
}

/// Result of a full update run
#[derive(Debug, Serialize)]
pub struct UpdateReport {
    pub target_tag: CpythonTag,
    pub interpreter_tag: CpythonTag,
    pub listing: ListingKind,
    pub blocks: Vec<GeneratedBlock>,
    pub failures: Vec<PackageFailure>,
    pub skipped: Vec<String>,
    pub modified_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum Outcome {
    /// The run stopped after validation (requested, or mismatches found)
    Validated { mismatches: Vec<HintMismatch> },
    Updated(UpdateReport),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Validated { mismatches } => mismatches.is_empty(),
            Outcome::Updated(_) => true,
        }
    }
}

/// Decide which pip listing feeds the update
///
/// Outdated packages are only meaningful when pip runs on the target
/// interpreter; otherwise the installed versions are re-pinned.
pub fn choose_listing(
    from_installed: bool,
    target: &CpythonTag,
    interpreter: &CpythonTag,
) -> ListingKind {
    if !from_installed && target == interpreter {
        ListingKind::Outdated
    } else {
        ListingKind::Installed
    }
}

/// Validate, then update the hint blocks below the search directory
pub fn run(
    options: &UpdateOptions,
    source: &dyn PackageSource,
    index: &dyn IndexClient,
) -> Result<Outcome, UpdaterError> {
    tracing::info!(dir = %options.search_directory.display(), "validating external projects");
    let mismatches = hints::validate(&options.search_directory)?;

    if options.validate_only || !mismatches.is_empty() {
        return Ok(Outcome::Validated { mismatches });
    }

    let interpreter_tag = source.interpreter_tag()?;
    let target_tag = options
        .cpython_tag
        .clone()
        .unwrap_or_else(|| interpreter_tag.clone());
    let listing = choose_listing(options.from_installed, &target_tag, &interpreter_tag);
    tracing::info!(%target_tag, %interpreter_tag, ?listing, "listing packages");

    let packages = source.packages(listing)?;

    let policy = SelectionPolicy {
        target_tag: target_tag.clone(),
        interpreter_tag: interpreter_tag.clone(),
        excluded: options.excluded.clone(),
    };
    let selection = selector::select_all(&packages, &policy, index);

    let modified_files = rewrite::rewrite_tree(
        &options.search_directory,
        &selection.blocks,
        options.dry_run,
    )?;

    let failures = selection
        .failures
        .iter()
        .map(|(package, e)| PackageFailure {
            package: package.clone(),
            message: e.to_string(),
        })
        .collect();

    Ok(Outcome::Updated(UpdateReport {
        target_tag,
        interpreter_tag,
        listing,
        blocks: selection.blocks.into_values().collect(),
        failures,
        skipped: selection.skipped,
        modified_files,
        dry_run: options.dry_run,
    }))
}
