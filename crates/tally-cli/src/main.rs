//! `tally` command-line entry point.
//!
//! Parses `STATE-DELTA` blocks and applies them to a JSON resource state
//! file through [`tally_store::StateStore`].
//!
//! ```text
//! text --> tally-parse --> DeltaBatch --> StateStore::apply_delta --> state.json (+ backup)
//! ```
//!
//! Reports go to stdout; logs go to stderr.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tally_store::TallyConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "command failed");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration, set up logging, and dispatch the subcommand.
fn run(args: &Args) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => TallyConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let mut config = TallyConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    if let Some(state) = &args.state {
        config.store.state_path.clone_from(state);
    }
    if args.verbose {
        "debug".clone_into(&mut config.logging.level);
    }

    init_logging(&config, args.json_logs);
    info!(
        state_path = %config.store.state_path.display(),
        backup_dir = %config.store.resolved_backup_dir().display(),
        "configuration loaded"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(&args.command, &config.store, &mut out)
}

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &TallyConfig, json_flag: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.logging.json || json_flag {
        builder.json().init();
    } else {
        builder.init();
    }
}
