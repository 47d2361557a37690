//! Rewriting of hint blocks in external project files
//!
//! Everything from `# [name]` up to the next `# [/name]` is replaced with the
//! generated requirement lines. Text outside of those spans is left as is.
//! Files are replaced atomically: the new content is written to a temporary
//! file in the same directory which is then renamed over the original.

use crate::hints::{self, HintsError};
use crate::selector::{GeneratedBlock, INDENTATION};
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error(transparent)]
    Scan(#[from] HintsError),

    #[error("Invalid hint pattern for '{package}': {source}")]
    Pattern {
        package: String,
        source: regex::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A compiled replacement for one package's hint blocks
struct BlockReplacement {
    pattern: Regex,
    replacement: String,
}

impl BlockReplacement {
    fn new(block: &GeneratedBlock) -> Result<Self, RewriteError> {
        let name = &block.package_name;
        let escaped = regex::escape(name);
        let pattern = Regex::new(&format!(r"(?s)# \[{escaped}\].*?# \[/{escaped}\]")).map_err(
            |source| RewriteError::Pattern {
                package: name.clone(),
                source,
            },
        )?;

        let replacement = format!(
            "# [{name}]\n{}{}# [/{name}]",
            block.text,
            " ".repeat(INDENTATION)
        );

        Ok(Self {
            pattern,
            replacement,
        })
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, NoExpand(&self.replacement))
            .into_owned()
    }
}

fn compile(blocks: &BTreeMap<String, GeneratedBlock>) -> Result<Vec<BlockReplacement>, RewriteError> {
    blocks.values().map(BlockReplacement::new).collect()
}

/// Replace the hint blocks of every package in `blocks` within `text`
pub fn rewrite_text(
    text: &str,
    blocks: &BTreeMap<String, GeneratedBlock>,
) -> Result<String, RewriteError> {
    Ok(apply_all(text, &compile(blocks)?))
}

fn apply_all(text: &str, replacements: &[BlockReplacement]) -> String {
    replacements
        .iter()
        .fold(text.to_string(), |current, replacement| replacement.apply(&current))
}

/// Generated blocks use `\n`; files written with `\r\n` keep it
fn rewrite_keeping_line_endings(text: &str, replacements: &[BlockReplacement]) -> String {
    if text.contains("\r\n") {
        apply_all(&text.replace("\r\n", "\n"), replacements).replace('\n', "\r\n")
    } else {
        apply_all(text, replacements)
    }
}

/// Atomically replace the contents of `path`, keeping its permissions
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), RewriteError> {
    let to_write_error = |source: std::io::Error| RewriteError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(to_write_error)?;
    tmp.write_all(contents.as_bytes()).map_err(to_write_error)?;
    tmp.as_file().sync_all().map_err(to_write_error)?;

    if let Ok(metadata) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(to_write_error)?;
    }

    tmp.persist(path).map_err(|e| to_write_error(e.error))?;
    Ok(())
}

/// Rewrite hint blocks in every file below `dir`
///
/// Only files whose content changes are written; with `dry_run` nothing is.
/// Returns the files that were (or would have been) modified.
pub fn rewrite_tree(
    dir: &Path,
    blocks: &BTreeMap<String, GeneratedBlock>,
    dry_run: bool,
) -> Result<Vec<PathBuf>, RewriteError> {
    if blocks.is_empty() {
        return Ok(Vec::new());
    }

    let replacements = compile(blocks)?;
    let mut modified = Vec::new();

    for path in hints::external_project_files(dir)? {
        let original = hints::read_text(&path)?;
        let updated = rewrite_keeping_line_endings(&original, &replacements);
        if updated == original {
            continue;
        }

        if dry_run {
            tracing::info!(path = %path.display(), "would update");
        } else {
            write_atomic(&path, &updated)?;
            tracing::info!(path = %path.display(), "updated");
        }
        modified.push(path);
    }

    Ok(modified)
}
