//! Subcommand handlers.
//!
//! Handlers write their report to `out` and return the process exit code;
//! errors are left to the caller.

use std::io::{Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tally_parse::parse_with_diagnostics;
use tally_store::{StateStore, StoreConfig};
use tally_types::EntityId;
use tracing::{info, warn};

use crate::cli::Command;

/// Run one subcommand against the configured store.
pub fn run(command: &Command, config: &StoreConfig, out: &mut impl Write) -> Result<ExitCode> {
    match command {
        Command::Parse { input } => {
            let text = read_input(input.as_deref())?;
            parse(&text, out)
        }
        Command::Apply { input, dry_run } => {
            let text = read_input(input.as_deref())?;
            apply(&text, *dry_run, config, out)
        }
        Command::Validate => validate(config, out),
        Command::Show { entity } => show(entity, config, out),
        Command::Check {
            entity,
            resource,
            amount,
            level,
        } => check(entity, resource, *amount, *level, config, out),
        Command::Backup => backup(config, out),
    }
}

/// Read the delta text from a file, or from standard input for `None` / `-`.
fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read standard input")?;
            Ok(text)
        }
    }
}

fn open(config: &StoreConfig) -> Result<StateStore> {
    StateStore::with_config(config)
        .with_context(|| format!("failed to open state {}", config.state_path.display()))
}

fn parse(text: &str, out: &mut impl Write) -> Result<ExitCode> {
    let report = parse_with_diagnostics(text);
    if !report.block_found {
        writeln!(out, "no STATE-DELTA block found")?;
        return Ok(ExitCode::SUCCESS);
    }
    writeln!(out, "{}", report.batch)?;
    for skipped in &report.skipped {
        warn!(line = skipped.line_number, reason = %skipped.reason, "skipped delta line");
        writeln!(
            out,
            "skipped line {}: {} ({})",
            skipped.line_number, skipped.text, skipped.reason
        )?;
    }
    Ok(ExitCode::SUCCESS)
}

fn apply(
    text: &str,
    dry_run: bool,
    config: &StoreConfig,
    out: &mut impl Write,
) -> Result<ExitCode> {
    let report = parse_with_diagnostics(text);
    for skipped in &report.skipped {
        warn!(
            line = skipped.line_number,
            text = %skipped.text,
            reason = %skipped.reason,
            "skipped delta line"
        );
    }
    if report.batch.is_empty() {
        writeln!(out, "no deltas found; nothing to apply")?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut store = open(config)?;
    let outcome = store
        .apply_delta(&report.batch, dry_run)
        .context("failed to apply deltas")?;

    for change in &outcome.changes {
        writeln!(out, "{change}")?;
    }
    if let Some(backup) = &outcome.backup {
        writeln!(out, "backup: {}", backup.display())?;
    }
    info!(
        applied = outcome.applied,
        changes = outcome.changes.len(),
        "apply finished"
    );
    Ok(ExitCode::SUCCESS)
}

fn validate(config: &StoreConfig, out: &mut impl Write) -> Result<ExitCode> {
    let store = open(config)?;
    let report = store.validate();
    if report.is_valid() {
        writeln!(out, "state is valid")?;
        return Ok(ExitCode::SUCCESS);
    }
    writeln!(out, "state has {} issue(s):", report.issues().len())?;
    for issue in report.issues() {
        warn!(%issue, "validation issue");
        writeln!(out, "- {issue}")?;
    }
    Ok(ExitCode::FAILURE)
}

fn show(entity: &str, config: &StoreConfig, out: &mut impl Write) -> Result<ExitCode> {
    let store = open(config)?;
    let resources = store.get_entity_resources(&EntityId::from(entity));
    writeln!(out, "{}", serde_json::to_string_pretty(&resources)?)?;
    Ok(ExitCode::SUCCESS)
}

fn check(
    entity: &str,
    resource: &str,
    amount: u64,
    level: u32,
    config: &StoreConfig,
    out: &mut impl Write,
) -> Result<ExitCode> {
    let store = open(config)?;
    let entity_id = EntityId::from(entity);
    let available = store.document().resource_amount(&entity_id, resource, level);
    if store.check_resource_availability(&entity_id, resource, amount, level) {
        writeln!(out, "available: {entity} has {available}, needs {amount}")?;
        Ok(ExitCode::SUCCESS)
    } else {
        writeln!(out, "insufficient: {entity} has {available}, needs {amount}")?;
        Ok(ExitCode::FAILURE)
    }
}

fn backup(config: &StoreConfig, out: &mut impl Write) -> Result<ExitCode> {
    let store = open(config)?;
    let path = store.create_backup().context("failed to create backup")?;
    writeln!(out, "{}", path.display())?;
    Ok(ExitCode::SUCCESS)
}
