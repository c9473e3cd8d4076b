mod anchors;
mod classify;
mod commands;
mod config;
mod diagnostics;
mod error;
mod grammar;
mod resolver;
mod scanner;
mod types;
mod watch;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::CheckOptions;
use crate::config::{ConfigOverrides, RunConfiguration};
use crate::diagnostics::Format;

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(
    name = "doclinks",
    version,
    about = "Check that internal markdown links point at existing files and headings"
)]
struct Cli {
    /// Fallback base path when the working directory is not inside a git repository
    #[arg(long)]
    base_path: Option<PathBuf>,
    /// Extension that link targets leave off, appended before lookup (e.g. `md`)
    #[arg(long)]
    dropped_extension: Option<String>,
    /// Markdown files or directories to check
    files: Vec<PathBuf>,
    /// Diagnostic output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Number of documents to check in parallel
    #[arg(short, long, default_value = "1")]
    jobs: NonZeroUsize,
    /// Allow link targets that contain path separators
    #[arg(long)]
    relative_links: bool,
    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Re-check whenever files under the base path change
    #[arg(long)]
    watch: bool,
}

/// Install the stderr log subscriber. `RUST_LOG` wins unless `-v` was given.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_err| return EnvFilter::new("doclinks=warn")),
        1 => EnvFilter::new("doclinks=debug"),
        _ => EnvFilter::new("doclinks=trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("doclinks starting with args: {cli:?}");

    return match run(cli) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(2)
        },
    };
}

/// Resolve the run configuration, then check once or keep watching.
///
/// # Errors
///
/// Returns fatal errors from configuration, checking, or watch setup.
fn run(cli: Cli) -> Result<ExitCode, error::Error> {
    if cli.files.is_empty() {
        return Err(error::Error::NoInputFiles);
    }

    let working_dir = std::env::current_dir()?;
    let overrides = ConfigOverrides {
        base_path: cli.base_path,
        dropped_extension: cli.dropped_extension,
        relative_links: cli.relative_links,
    };
    let config = RunConfiguration::load(&working_dir, overrides)?;

    let options = CheckOptions {
        files: cli.files,
        format: cli.format,
        jobs: cli.jobs,
    };

    if cli.watch {
        return watch::run(&options, &config);
    }
    return Ok(commands::check(&options, &config)?.exit_code());
}
