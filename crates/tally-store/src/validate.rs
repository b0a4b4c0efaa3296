//! Structural validation of state documents.
//!
//! Validation never fails and never mutates: every problem found is returned
//! as a [`ValidationIssue`] in a fixed order (top-level keys, entities,
//! metadata).

use serde_json::Value;
use tally_types::{
    EntityId, KEY_ENTITIES, KEY_LAST_UPDATED, KEY_METADATA, KEY_RESOURCES, KEY_VERSION,
    StateDocument,
};

/// Top-level keys every document must carry.
pub const REQUIRED_KEYS: [&str; 3] = [KEY_ENTITIES, KEY_RESOURCES, KEY_METADATA];

/// A single structural problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A required top-level key is absent.
    MissingKey(&'static str),
    /// `entities` is present but not an object.
    EntitiesNotObject,
    /// An entity is not an object.
    EntityNotObject(EntityId),
    /// An entity has no `resources` field.
    EntityMissingResources(EntityId),
    /// `metadata` is present but not an object.
    MetadataNotObject,
    /// `metadata.version` is absent.
    MetadataMissingVersion,
    /// `metadata.last_updated` is absent.
    MetadataMissingLastUpdated,
}

impl core::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "Missing required key: {key}"),
            Self::EntitiesNotObject => f.write_str("entities is not an object"),
            Self::EntityNotObject(id) => write!(f, "Entity {id} is not an object"),
            Self::EntityMissingResources(id) => write!(f, "Entity {id} missing resources"),
            Self::MetadataNotObject => f.write_str("metadata is not an object"),
            Self::MetadataMissingVersion => f.write_str("Metadata missing version"),
            Self::MetadataMissingLastUpdated => f.write_str("Metadata missing last_updated"),
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether no issues were found.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// The issues, in the order they were found.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The issues rendered as messages.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// `(is_valid, messages)`.
    pub fn into_parts(self) -> (bool, Vec<String>) {
        (self.is_valid(), self.messages())
    }
}

/// Check the structural invariants of `document`.
pub fn validate_document(document: &StateDocument) -> ValidationReport {
    let root = document.as_map();
    let mut issues = Vec::new();

    for key in REQUIRED_KEYS {
        if !root.contains_key(key) {
            issues.push(ValidationIssue::MissingKey(key));
        }
    }

    match root.get(KEY_ENTITIES) {
        Some(Value::Object(entities)) => {
            for (id, entity) in entities {
                match entity {
                    Value::Object(fields) if !fields.contains_key(KEY_RESOURCES) => {
                        issues.push(ValidationIssue::EntityMissingResources(EntityId::from(
                            id.as_str(),
                        )));
                    }
                    Value::Object(_) => {}
                    _ => issues.push(ValidationIssue::EntityNotObject(EntityId::from(id.as_str()))),
                }
            }
        }
        Some(_) => issues.push(ValidationIssue::EntitiesNotObject),
        None => {}
    }

    match root.get(KEY_METADATA) {
        Some(Value::Object(metadata)) => {
            if !metadata.contains_key(KEY_VERSION) {
                issues.push(ValidationIssue::MetadataMissingVersion);
            }
            if !metadata.contains_key(KEY_LAST_UPDATED) {
                issues.push(ValidationIssue::MetadataMissingLastUpdated);
            }
        }
        Some(_) => issues.push(ValidationIssue::MetadataNotObject),
        None => {}
    }

    ValidationReport { issues }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> StateDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn fresh_document_is_valid() {
        let report = validate_document(&StateDocument::fresh("1.0", Utc::now()));
        assert!(report.is_valid());
        assert!(report.issues().is_empty());
    }

    #[test]
    fn missing_metadata_is_reported() {
        let report = validate_document(&doc(json!({ "entities": {}, "resources": {} })));
        assert_eq!(
            report.into_parts(),
            (false, vec!["Missing required key: metadata".to_owned()])
        );
    }

    #[test]
    fn empty_document_reports_every_key() {
        let (valid, issues) = validate_document(&StateDocument::default()).into_parts();
        assert!(!valid);
        assert_eq!(
            issues,
            vec![
                "Missing required key: entities",
                "Missing required key: resources",
                "Missing required key: metadata",
            ]
        );
    }

    #[test]
    fn entity_problems_are_reported() {
        let report = validate_document(&doc(json!({
            "entities": {
                "good": { "resources": {} },
                "bare": { "metadata": {} },
                "scalar": 7
            },
            "resources": {},
            "metadata": { "version": "1.0", "last_updated": "now" }
        })));
        assert_eq!(
            report.issues(),
            &[
                ValidationIssue::EntityMissingResources(EntityId::from("bare")),
                ValidationIssue::EntityNotObject(EntityId::from("scalar")),
            ]
        );
    }

    #[test]
    fn metadata_fields_are_checked() {
        let report = validate_document(&doc(json!({
            "entities": {},
            "resources": {},
            "metadata": {}
        })));
        assert_eq!(
            report.messages(),
            vec!["Metadata missing version", "Metadata missing last_updated"]
        );
    }

    #[test]
    fn wrong_container_types_are_reported() {
        let report = validate_document(&doc(json!({
            "entities": [],
            "resources": {},
            "metadata": "1.0"
        })));
        assert_eq!(
            report.issues(),
            &[
                ValidationIssue::EntitiesNotObject,
                ValidationIssue::MetadataNotObject
            ]
        );
    }
}
