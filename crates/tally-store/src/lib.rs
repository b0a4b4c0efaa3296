//! Atomic JSON state store for entity resources.
//!
//! A [`StateStore`] owns one JSON document describing entities and their
//! numeric resources. Batches of subtractive deltas (usually parsed from a
//! `STATE-DELTA` text block) are applied all at once: the batch is computed
//! on a copy, a timestamped backup of the file is taken, the new document is
//! written through a temp file and a rename, and only then does the store's
//! in-memory state change.
//!
//! # Modules
//!
//! - [`store`] -- [`StateStore`] and [`ApplyOutcome`]
//! - [`validate`] -- structural checks that report issues as data
//! - [`persist`] -- load, atomic save, and backup file naming
//! - [`config`] -- YAML configuration with environment overrides
//! - [`error`] -- [`StoreError`] and [`LoadFailure`]
//!
//! # Usage
//!
//! ```no_run
//! use tally_store::StateStore;
//! use tally_types::{DeltaBatch, DeltaKey};
//!
//! # fn main() -> Result<(), tally_store::StoreError> {
//! let mut store = StateStore::open("state.json")?;
//! let deltas: DeltaBatch = [(DeltaKey::scalar("entity_003", "ki"), 2)].into_iter().collect();
//!
//! let preview = store.apply_delta(&deltas, true)?;
//! for change in &preview.changes {
//!     println!("{change}");
//! }
//!
//! let outcome = store.apply_delta(&deltas, false)?;
//! assert!(outcome.applied);
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//!
//! The file is not locked; callers must ensure a single writer. Backups
//! taken within the same second overwrite each other.

mod apply;
pub mod config;
pub mod error;
pub mod persist;
pub mod store;
pub mod validate;

// Re-export primary types at crate root.
pub use config::{ConfigError, LoggingConfig, StoreConfig, TallyConfig};
pub use error::{LoadFailure, StoreError};
pub use persist::backup_file_name;
pub use store::{ApplyOutcome, StateStore};
pub use validate::{ValidationIssue, ValidationReport, validate_document};
