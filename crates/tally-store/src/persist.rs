//! File persistence: load, atomic save, and timestamped backups.
//!
//! Saves go to a temporary file in the target's directory which is then
//! renamed over the target, so readers see either the old or the new file.
//! Nothing here locks the file against other writers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tally_types::StateDocument;

use crate::config::state_dir;
use crate::error::{LoadFailure, StoreError};

/// `strftime` pattern of the backup file timestamp (second resolution).
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Read and parse the state file, or build a fresh document if it is absent.
pub(crate) fn load_document(
    path: &Path,
    default_version: &str,
) -> Result<StateDocument, StoreError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "state file absent, starting fresh");
        return Ok(StateDocument::fresh(default_version, Utc::now()));
    }

    let load_err = |source: LoadFailure| StoreError::Load {
        path: path.to_path_buf(),
        source,
    };
    let contents = fs::read_to_string(path).map_err(|e| load_err(e.into()))?;
    let document: StateDocument =
        serde_json::from_str(&contents).map_err(|e| load_err(e.into()))?;

    tracing::debug!(path = %path.display(), "loaded state file");
    Ok(document)
}

/// Serialize `document` and atomically replace `path` with it.
pub(crate) fn write_document(path: &Path, document: &StateDocument) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document)?;
    atomic_write(path, &bytes).map_err(|source| StoreError::Save {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `data` to a temp file next to `path`, flush it, then rename it over `path`.
///
/// The temp file is removed if any step before the rename fails.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = state_dir(path);
    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.as_file_mut().write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// File name of the backup taken at `at`: `state.<YYYYMMDD_HHMMSS>.json`.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("state.{}.json", at.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Copy the state file (or, if it does not exist yet, `current`) into
/// `backup_dir`, returning the backup path.
///
/// Backups taken within the same second share a name; the later one wins.
pub(crate) fn write_backup(
    path: &Path,
    backup_dir: &Path,
    current: &StateDocument,
    at: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    let backup_path = backup_dir.join(backup_file_name(at));
    let backup_err = |source: std::io::Error| StoreError::Backup {
        path: backup_path.clone(),
        source,
    };

    fs::create_dir_all(backup_dir).map_err(backup_err)?;
    if path.exists() {
        fs::copy(path, &backup_path).map_err(backup_err)?;
    } else {
        let bytes = serde_json::to_vec_pretty(current)?;
        fs::write(&backup_path, bytes).map_err(backup_err)?;
    }

    tracing::info!(backup = %backup_path.display(), "state backup written");
    Ok(backup_path)
}
