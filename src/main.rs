//! MainframeBench evaluation CLI
//!
//! Runs the MainframeBench tasks against a model command, writes checkpoints while it goes and
//! renders the results.
//!
//! # Commands
//!
//! - `mfbench run`: evaluate every enabled task from the start
//! - `mfbench resume --run-dir D`: continue an interrupted run from its checkpoints
//! - `mfbench rescore --input results.json`: recompute scores from stored records
//! - `mfbench report --input results.json`: render a stored report
//! - `mfbench checkpoints --run-dir D`: list stored checkpoints
//!
//! Ctrl+C stops the run at the next batch boundary; a second Ctrl+C exits immediately.

mod args;
mod commands;
mod console;
mod progress;
mod router;
mod signal_handler;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);
    router::route(cli).await
}

/// Initialize logging; RUST_LOG takes precedence over --verbose
fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
