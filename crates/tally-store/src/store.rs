//! The state store: one JSON file, its backups, and the in-memory document.
//!
//! The store is single-writer. It reads the file once when opened, mutates
//! only through [`StateStore::apply_delta`], and swaps its in-memory state
//! only after the new document has been saved.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use tally_types::{Change, DeltaBatch, EntityId, StateDocument};
use tracing::{debug, info};

use crate::apply::apply_batch;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::persist::{load_document, write_backup, write_document};
use crate::validate::{ValidationReport, validate_document};

/// Result of [`StateStore::apply_delta`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// The working copy (dry run) or the newly persisted state.
    pub document: StateDocument,
    /// One note per evaluated delta, in batch order.
    pub changes: Vec<Change>,
    /// Whether the changes were persisted.
    pub applied: bool,
    /// Backup taken before the save; `None` for dry runs.
    pub backup: Option<PathBuf>,
}

/// JSON-file-backed store of entity resources.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    backup_dir: PathBuf,
    default_version: String,
    state: StateDocument,
}

impl StateStore {
    /// Open the store at `path` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Load`] if the file exists but is not a readable
    /// JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_config(&StoreConfig::for_path(path))
    }

    /// Open the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Load`] if the file exists but is not a readable
    /// JSON object.
    pub fn with_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = config.state_path.clone();
        let state = load_document(&path, &config.default_version)?;
        info!(
            path = %path.display(),
            entities = state.entities().map_or(0, Map::len),
            "state store opened"
        );
        Ok(Self {
            backup_dir: config.resolved_backup_dir(),
            default_version: config.default_version.clone(),
            path,
            state,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory backups are written to.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// The current in-memory document.
    pub const fn document(&self) -> &StateDocument {
        &self.state
    }

    /// Read the backing file again, or build a fresh document if it is absent.
    ///
    /// Does not replace the in-memory state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Load`] if the file is unreadable or not a JSON object.
    pub fn load(&self) -> Result<StateDocument, StoreError> {
        load_document(&self.path, &self.default_version)
    }

    /// Stamp `metadata.last_updated` on `document` and atomically write it
    /// to the backing file.
    ///
    /// Does not replace the in-memory state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Save`] on any I/O failure; the file on disk is
    /// then unchanged.
    pub fn save(&self, document: &mut StateDocument) -> Result<(), StoreError> {
        document.stamp(Utc::now(), &self.default_version);
        write_document(&self.path, document)?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }

    /// Copy the backing file into the backup directory under a timestamped
    /// name and return the backup path.
    ///
    /// If the backing file does not exist yet, the in-memory document is
    /// written instead.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backup`] if the directory or file cannot be written.
    pub fn create_backup(&self) -> Result<PathBuf, StoreError> {
        write_backup(&self.path, &self.backup_dir, &self.state, Utc::now())
    }

    /// Subtract every delta in `deltas`, clamping at zero.
    ///
    /// All work happens on a copy of the current document. A dry run only
    /// reports. A real run backs up the file, saves the new document, and
    /// then replaces the in-memory state; if any step fails the in-memory
    /// state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if a delta addresses a value
    /// of the wrong JSON type, and [`StoreError::Backup`] or
    /// [`StoreError::Save`] if persisting fails.
    pub fn apply_delta(
        &mut self,
        deltas: &DeltaBatch,
        dry_run: bool,
    ) -> Result<ApplyOutcome, StoreError> {
        let mut working = self.state.clone();
        let changes = apply_batch(&mut working, deltas, dry_run)?;

        if dry_run {
            debug!(deltas = deltas.len(), changes = changes.len(), "dry run complete");
            return Ok(ApplyOutcome {
                document: working,
                changes,
                applied: false,
                backup: None,
            });
        }

        let backup = self.create_backup()?;
        self.save(&mut working)?;
        self.state = working.clone();

        info!(
            deltas = deltas.len(),
            changes = changes.len(),
            backup = %backup.display(),
            "state deltas applied"
        );
        Ok(ApplyOutcome {
            document: working,
            changes,
            applied: true,
            backup: Some(backup),
        })
    }

    /// Validate the in-memory document.
    pub fn validate(&self) -> ValidationReport {
        validate_document(&self.state)
    }

    /// The entity's `resources` map, or an empty map if the entity is absent.
    pub fn get_entity_resources(&self, entity_id: &EntityId) -> Map<String, Value> {
        self.state.entity_resources(entity_id)
    }

    /// Whether the entity holds at least `amount` of the resource.
    ///
    /// `level` is only consulted for leveled resources. Absent entities and
    /// resources count as zero.
    pub fn check_resource_availability(
        &self,
        entity_id: &EntityId,
        resource_type: &str,
        amount: u64,
        level: u32,
    ) -> bool {
        self.state.resource_amount(entity_id, resource_type, level) >= amount
    }
}
