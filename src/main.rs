mod cli;

use clap::Parser;
use cli::Cli;
use pinsync::config::Config;
use pinsync::output;
use pinsync::pypi::PypiClient;
use pinsync::updater::{self, Outcome, PipSource, UpdateOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over `-v`
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether the run succeeded (no hint mismatches)
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let json_output = cli.json;

    let search_directory = cli
        .search_directory
        .or_else(|| config.search_directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut excluded = config.excluded_packages.clone();
    excluded.extend(cli.exclude);

    let options = UpdateOptions {
        search_directory,
        cpython_tag: cli.cpython_tag,
        from_installed: cli.from_installed_packages,
        validate_only: cli.validate,
        dry_run: cli.dry_run,
        excluded,
    };

    let source = PipSource {
        python: cli.python.unwrap_or_else(|| config.python.clone()),
        installation_path: cli.path,
    };

    let index_url = cli.index_url.unwrap_or_else(|| config.index_url.clone());
    let index = PypiClient::new(&index_url, config.timeout(), config.retry_policy());

    if !json_output {
        println!(
            "Searching external projects in {}",
            options.search_directory.display()
        );
    }

    let outcome = updater::run(&options, &source, &index)?;
    match &outcome {
        Outcome::Validated { mismatches } => output::print_validation(mismatches, json_output),
        Outcome::Updated(report) => output::print_report(report, json_output),
    }

    Ok(outcome.is_success())
}
