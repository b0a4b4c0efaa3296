//! The JSON state document.
//!
//! The document is kept as a JSON object rather than a fully typed struct:
//! unknown keys must survive a load/save round trip untouched, and
//! structural problems (a missing `metadata`, an entity that is not an
//! object) are reported by validation instead of being rejected at load.
//!
//! Shape:
//!
//! ```text
//! {
//!   "entities": { "<id>": { "resources": { "ki": 3, "spell_slots": { "2": 1 } }, "metadata": {} } },
//!   "resources": {},
//!   "metadata": { "version": "1.0", "last_updated": "<rfc3339>" }
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::delta::{LEVELED_CONTAINER, is_leveled};
use crate::ids::EntityId;

/// Top-level key holding the entity map.
pub const KEY_ENTITIES: &str = "entities";
/// Top-level reserved bucket; also the per-entity resource map key.
pub const KEY_RESOURCES: &str = "resources";
/// Top-level metadata key; also the per-entity metadata key.
pub const KEY_METADATA: &str = "metadata";
/// Metadata key holding the document format version.
pub const KEY_VERSION: &str = "version";
/// Metadata key holding the last save timestamp.
pub const KEY_LAST_UPDATED: &str = "last_updated";
/// Version written into fresh documents.
pub const DEFAULT_VERSION: &str = "1.0";

/// A state document: a JSON object with `entities`, `resources`, and `metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDocument(Map<String, Value>);

impl StateDocument {
    /// A fresh document with no entities, stamped with `version` and `now`.
    pub fn fresh(version: &str, now: DateTime<Utc>) -> Self {
        let mut root = Map::new();
        root.insert(KEY_ENTITIES.to_owned(), Value::Object(Map::new()));
        root.insert(KEY_RESOURCES.to_owned(), Value::Object(Map::new()));
        let mut metadata = Map::new();
        metadata.insert(KEY_VERSION.to_owned(), Value::String(version.to_owned()));
        metadata.insert(KEY_LAST_UPDATED.to_owned(), Value::String(timestamp(now)));
        root.insert(KEY_METADATA.to_owned(), Value::Object(metadata));
        Self(root)
    }

    /// Wrap an existing JSON object.
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Borrow the underlying JSON object.
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutably borrow the underlying JSON object.
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Consume the document, returning the JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Set `metadata.last_updated` to `now`.
    ///
    /// A missing or non-object `metadata` is replaced, and a missing
    /// `metadata.version` is filled with `default_version`, so both keys are
    /// present afterwards.
    pub fn stamp(&mut self, now: DateTime<Utc>, default_version: &str) {
        let metadata = self
            .0
            .entry(KEY_METADATA)
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        if let Value::Object(metadata) = metadata {
            metadata
                .entry(KEY_VERSION)
                .or_insert_with(|| Value::String(default_version.to_owned()));
            metadata.insert(KEY_LAST_UPDATED.to_owned(), Value::String(timestamp(now)));
        }
    }

    /// The `metadata.version` string, if present.
    pub fn version(&self) -> Option<&str> {
        self.metadata_str(KEY_VERSION)
    }

    /// The `metadata.last_updated` string, if present.
    pub fn last_updated(&self) -> Option<&str> {
        self.metadata_str(KEY_LAST_UPDATED)
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(KEY_METADATA)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    /// The `entities` object, if present and an object.
    pub fn entities(&self) -> Option<&Map<String, Value>> {
        self.0.get(KEY_ENTITIES).and_then(Value::as_object)
    }

    /// The raw JSON value of one entity.
    pub fn entity(&self, entity_id: &EntityId) -> Option<&Value> {
        self.entities().and_then(|e| e.get(entity_id.as_str()))
    }

    /// The entity's `resources` map, or an empty map when the entity or its
    /// resources are absent.
    pub fn entity_resources(&self, entity_id: &EntityId) -> Map<String, Value> {
        self.entity(entity_id)
            .and_then(|e| e.get(KEY_RESOURCES))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Current value of one counter; absent or non-integer values read as 0.
    pub fn resource_amount(&self, entity_id: &EntityId, resource_type: &str, level: u32) -> u64 {
        let Some(resources) = self
            .entity(entity_id)
            .and_then(|e| e.get(KEY_RESOURCES))
            .and_then(Value::as_object)
        else {
            return 0;
        };
        let value = if is_leveled(resource_type) {
            resources
                .get(LEVELED_CONTAINER)
                .and_then(|slots| slots.get(level.to_string()))
        } else {
            resources.get(resource_type)
        };
        value.and_then(Value::as_u64).unwrap_or(0)
    }
}

impl From<StateDocument> for Value {
    fn from(doc: StateDocument) -> Self {
        Self::Object(doc.0)
    }
}

/// RFC 3339 rendering used for `metadata.last_updated`.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}
