//! Shared type definitions for the Tally state store.
//!
//! This crate is the single source of truth for the data model used by the
//! parser, the store, and the command-line front end.
//!
//! # Modules
//!
//! - [`ids`] -- Entity identifier wrapper
//! - [`delta`] -- Delta keys and ordered, accumulating delta batches
//! - [`change`] -- Change notes produced when a batch is applied
//! - [`document`] -- The JSON state document and read-only accessors

pub mod change;
pub mod delta;
pub mod document;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use change::{Change, DRY_RUN_MARKER};
pub use delta::{DeltaBatch, DeltaKey, LEVELED_CONTAINER, LEVELED_RESOURCE, is_leveled};
pub use document::{
    DEFAULT_VERSION, KEY_ENTITIES, KEY_LAST_UPDATED, KEY_METADATA, KEY_RESOURCES, KEY_VERSION,
    StateDocument,
};
pub use ids::EntityId;
