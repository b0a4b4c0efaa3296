//! Error types for the `tally-store` crate.
//!
//! Load and save failures carry the path involved. Validation problems are
//! not errors; they are returned as data by [`crate::validate_document`].

use std::path::PathBuf;

/// Why an existing state file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    /// The file exists but could not be read.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The content is not a JSON object.
    #[error("invalid state JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file exists but is not a readable JSON object.
    #[error("failed to load state from {path}: {source}")]
    Load {
        /// The state file.
        path: PathBuf,
        /// The underlying failure.
        source: LoadFailure,
    },

    /// Writing the temporary file or renaming it over the target failed.
    ///
    /// The target file is unchanged when this is returned.
    #[error("failed to save state to {path}: {source}")]
    Save {
        /// The state file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document could not be rendered as JSON.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Copying the state file into the backup directory failed.
    #[error("failed to write backup {path}: {source}")]
    Backup {
        /// The backup file that was being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document's structure prevents a delta from being applied.
    #[error("invalid state document: {reason}")]
    InvalidDocument {
        /// What is wrong and where.
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }
}
