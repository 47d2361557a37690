use clap::Parser;
use pinsync::interpreter::CpythonTag;
use std::path::PathBuf;

/// Update external project files with the latest version and download hashes
/// of the python packages they pin.
///
/// Each pinned package lives between a pair of hints:
///
///   # [packagename]
///   packagename==1.2.3 --hash=sha256:...
///   # [/packagename]
///
/// This does NOT handle python package version incompatibilities or the
/// addition/removal of other package dependencies for a given package.
#[derive(Parser, Debug)]
#[command(name = "pinsync")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Directory to search and replace python version info
    #[arg(short, long, value_name = "DIR")]
    pub search_directory: Option<PathBuf>,

    /// CPython version of python packages to check for (e.g. cp311)
    #[arg(short, long, value_name = "cpXY", value_parser = parse_cpython_tag)]
    pub cpython_tag: Option<CpythonTag>,

    /// Update external projects based on installed packages
    #[arg(long)]
    pub from_installed_packages: bool,

    /// Only check that external project hints are consistent
    #[arg(long)]
    pub validate: bool,

    /// Package installation path (site-packages) passed to pip
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Python executable used to run pip
    #[arg(long, value_name = "EXE")]
    pub python: Option<String>,

    /// Base URL of the package index
    #[arg(long, value_name = "URL")]
    pub index_url: Option<String>,

    /// Never pin this package (repeatable)
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Show what would change without writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_cpython_tag(s: &str) -> Result<CpythonTag, String> {
    s.parse().map_err(|e: pinsync::interpreter::InterpreterError| e.to_string())
}
