//! Output formatting for JSON and text modes
//!
//! Provides types for structured output that can be serialized to JSON
//! for machine-readable output, or displayed as text for human consumption.

use crate::hints::{self, HintMismatch};
use crate::updater::{PackageFailure, UpdateReport};
use serde::Serialize;

/// Result of a validation-only run
#[derive(Debug, Serialize)]
pub struct ValidationResult<'a> {
    pub valid: bool,
    pub mismatches: &'a [HintMismatch],
}

impl<'a> ValidationResult<'a> {
    pub fn new(mismatches: &'a [HintMismatch]) -> Self {
        Self {
            valid: mismatches.is_empty(),
            mismatches,
        }
    }
}

/// Message printed for a package that could not be pinned
pub fn failure_line(failure: &PackageFailure) -> String {
    format!("ERROR UPDATING '{}': {}", failure.package, failure.message)
}

/// Human readable rendering of an update run
pub fn report_text(report: &UpdateReport) -> String {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let mut lines = Vec::new();

    for block in &report.blocks {
        lines.push(block.text.trim_end().to_string());
    }

    if !report.skipped.is_empty() {
        lines.push(format!("Skipped: {}", report.skipped.join(", ")));
    }

    if report.modified_files.is_empty() {
        lines.push(format!("{}No external project files changed", prefix));
    } else {
        for path in &report.modified_files {
            lines.push(format!("{}Updated {}", prefix, path.display()));
        }
    }

    lines.join("\n")
}

/// Print the outcome of validation to the right stream
pub fn print_validation(mismatches: &[HintMismatch], json_output: bool) {
    if json_output {
        print_json(&ValidationResult::new(mismatches));
    } else if mismatches.is_empty() {
        println!("All external project hints are consistent");
    } else {
        eprintln!("{}", hints::mismatch_summary(mismatches));
    }
}

/// Print the outcome of an update run
pub fn print_report(report: &UpdateReport, json_output: bool) {
    if json_output {
        print_json(report);
        return;
    }

    for failure in &report.failures {
        eprintln!("{}", failure_line(failure));
    }
    println!("{}", report_text(report));
}

/// Print JSON output to stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing JSON: {}", e);
            std::process::exit(1);
        }
    }
}
