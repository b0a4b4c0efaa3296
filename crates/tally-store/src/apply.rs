//! Delta application against a working copy of the document.
//!
//! Subtraction clamps at zero. A dry run reads the same counters a real run
//! would write but never touches the document; missing entities are reported
//! as [`Change::WouldCreate`] and skipped.

use serde_json::{Map, Value};
use tally_types::{
    Change, DeltaBatch, DeltaKey, EntityId, KEY_ENTITIES, KEY_METADATA, KEY_RESOURCES,
    LEVELED_CONTAINER, StateDocument,
};

use crate::error::StoreError;

/// Apply every delta of `deltas` to `working`, in batch order.
///
/// With `dry_run` the document is left as it was. Fails if a counter sits
/// inside a value of the wrong JSON type; `working` may then be partially
/// updated and must be discarded.
pub(crate) fn apply_batch(
    working: &mut StateDocument,
    deltas: &DeltaBatch,
    dry_run: bool,
) -> Result<Vec<Change>, StoreError> {
    let mut changes = Vec::with_capacity(deltas.len());

    for (key, amount) in deltas.iter() {
        let change = if dry_run {
            preview(working, key, amount)?
        } else {
            Some(write(working, key, amount)?)
        };
        if let Some(change) = change {
            tracing::debug!(%change, "delta evaluated");
            changes.push(change);
        }
    }

    Ok(changes)
}

/// Compute the change a real run would make without mutating anything.
fn preview(
    working: &StateDocument,
    key: &DeltaKey,
    amount: u64,
) -> Result<Option<Change>, StoreError> {
    let entities = match working.as_map().get(KEY_ENTITIES) {
        None => None,
        Some(Value::Object(entities)) => Some(entities),
        Some(_) => return Err(StoreError::invalid("entities is not an object")),
    };
    let Some(entity) = entities.and_then(|e| e.get(key.entity_id.as_str())) else {
        return Ok(Some(Change::WouldCreate {
            entity_id: key.entity_id.clone(),
        }));
    };
    let entity = entity
        .as_object()
        .ok_or_else(|| not_an_object("entity", &key.entity_id))?;

    let before = match entity.get(KEY_RESOURCES) {
        None => 0,
        Some(Value::Object(resources)) => {
            let (container, field) = if key.is_leveled() {
                match resources.get(LEVELED_CONTAINER) {
                    None => return Ok(Some(adjusted(key, 0, amount, true))),
                    Some(Value::Object(slots)) => (slots, key.level.to_string()),
                    Some(_) => return Err(not_an_object(LEVELED_CONTAINER, &key.entity_id)),
                }
            } else {
                (resources, key.resource_type.clone())
            };
            read_counter(container.get(&field), key)?
        }
        Some(_) => return Err(not_an_object(KEY_RESOURCES, &key.entity_id)),
    };

    Ok(Some(adjusted(key, before, amount, true)))
}

/// Subtract `amount` from the counter, creating any missing containers.
fn write(working: &mut StateDocument, key: &DeltaKey, amount: u64) -> Result<Change, StoreError> {
    let entities = working
        .as_map_mut()
        .entry(KEY_ENTITIES)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| StoreError::invalid("entities is not an object"))?;

    let entity = entities
        .entry(key.entity_id.as_str())
        .or_insert_with(|| {
            tracing::debug!(entity = %key.entity_id, "creating entity");
            new_entity()
        })
        .as_object_mut()
        .ok_or_else(|| not_an_object("entity", &key.entity_id))?;

    let resources = object_entry(entity, KEY_RESOURCES)
        .ok_or_else(|| not_an_object(KEY_RESOURCES, &key.entity_id))?;

    let (container, field) = if key.is_leveled() {
        let slots = object_entry(resources, LEVELED_CONTAINER)
            .ok_or_else(|| not_an_object(LEVELED_CONTAINER, &key.entity_id))?;
        (slots, key.level.to_string())
    } else {
        (resources, key.resource_type.clone())
    };

    let before = read_counter(container.get(&field), key)?;
    let change = adjusted(key, before, amount, false);
    if let Change::Adjusted { after, .. } = &change {
        container.insert(field, Value::from(*after));
    }
    Ok(change)
}

/// The object stored under `field`, inserting an empty one if absent.
fn object_entry<'a>(
    map: &'a mut Map<String, Value>,
    field: &str,
) -> Option<&'a mut Map<String, Value>> {
    map.entry(field)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

/// Read a counter value; absent reads as 0.
fn read_counter(value: Option<&Value>, key: &DeltaKey) -> Result<u64, StoreError> {
    match value {
        None => Ok(0),
        Some(v) => v.as_u64().ok_or_else(|| {
            StoreError::invalid(format!(
                "{} {} is not a non-negative integer: {v}",
                key.entity_id,
                key.resource_label()
            ))
        }),
    }
}

fn adjusted(key: &DeltaKey, before: u64, amount: u64, dry_run: bool) -> Change {
    Change::Adjusted {
        key: key.clone(),
        before,
        after: before.saturating_sub(amount),
        amount,
        dry_run,
    }
}

fn new_entity() -> Value {
    let mut entity = Map::new();
    entity.insert(KEY_RESOURCES.to_owned(), Value::Object(Map::new()));
    entity.insert(KEY_METADATA.to_owned(), Value::Object(Map::new()));
    Value::Object(entity)
}

fn not_an_object(what: &str, entity_id: &EntityId) -> StoreError {
    StoreError::invalid(format!("{what} of entity {entity_id} is not an object"))
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

    fn batch(items: &[(DeltaKey, u64)]) -> DeltaBatch {
        items.iter().cloned().collect()
    }

    #[test]
    fn subtracts_scalar() {
        let mut working = doc(json!({ "entities": { "e1": { "resources": { "ki": 5 } } } }));
        let changes =
            apply_batch(&mut working, &batch(&[(DeltaKey::scalar("e1", "ki"), 2)]), false).unwrap();
        assert_eq!(working.resource_amount(&EntityId::from("e1"), "ki", 0), 3);
        let notes: Vec<String> = changes.iter().map(ToString::to_string).collect();
        assert_eq!(notes, vec!["e1 ki: 5 -> 3 (subtract 2)"]);
    }

    #[test]
    fn clamps_at_zero() {
        let mut working = doc(json!({ "entities": { "e1": { "resources": { "ki": 5 } } } }));
        apply_batch(&mut working, &batch(&[(DeltaKey::scalar("e1", "ki"), 10)]), false).unwrap();
        assert_eq!(working.resource_amount(&EntityId::from("e1"), "ki", 0), 0);
    }

    #[test]
    fn creates_missing_entity_and_containers() {
        let mut working = StateDocument::fresh("1.0", Utc::now());
        apply_batch(
            &mut working,
            &batch(&[(DeltaKey::leveled("e1", 3), 1), (DeltaKey::scalar("e1", "ki"), 3)]),
            false,
        )
        .unwrap();
        assert_eq!(
            working.entity(&EntityId::from("e1")),
            Some(&json!({ "resources": { "spell_slots": { "3": 0 }, "ki": 0 }, "metadata": {} }))
        );
    }

    #[test]
    fn creates_resources_for_entity_without_one() {
        let mut working = doc(json!({ "entities": { "e1": { "metadata": { "note": "x" } } } }));
        apply_batch(&mut working, &batch(&[(DeltaKey::scalar("e1", "rage"), 1)]), false).unwrap();
        assert_eq!(
            working.entity(&EntityId::from("e1")),
            Some(&json!({ "metadata": { "note": "x" }, "resources": { "rage": 0 } }))
        );
    }

    #[test]
    fn dry_run_leaves_document_untouched() {
        let original = doc(json!({
            "entities": { "e1": { "resources": { "spell_slots": { "2": 4 } } } }
        }));
        let mut working = original.clone();
        let changes = apply_batch(
            &mut working,
            &batch(&[(DeltaKey::leveled("e1", 2), 1), (DeltaKey::scalar("ghost", "ki"), 1)]),
            true,
        )
        .unwrap();
        assert_eq!(working, original);
        let notes: Vec<String> = changes.iter().map(ToString::to_string).collect();
        assert_eq!(
            notes,
            vec![
                "DRY-RUN: e1 spell_slot.2: 4 -> 3 (subtract 1)",
                "DRY-RUN: Would create entity ghost",
            ]
        );
    }

    #[test]
    fn dry_run_without_entities_key_reports_creation() {
        let mut working = StateDocument::default();
        let changes =
            apply_batch(&mut working, &batch(&[(DeltaKey::scalar("e1", "ki"), 1)]), true).unwrap();
        assert_eq!(
            changes,
            vec![Change::WouldCreate {
                entity_id: EntityId::from("e1")
            }]
        );
        assert_eq!(working, StateDocument::default());
    }

    #[test]
    fn non_integer_counter_is_rejected() {
        let mut working = doc(json!({ "entities": { "e1": { "resources": { "ki": "lots" } } } }));
        let err = apply_batch(&mut working, &batch(&[(DeltaKey::scalar("e1", "ki"), 1)]), false);
        assert!(matches!(err, Err(StoreError::InvalidDocument { .. })));
    }

    #[test]
    fn non_object_entity_is_rejected_in_both_modes() {
        for dry_run in [true, false] {
            let mut working = doc(json!({ "entities": { "e1": 3 } }));
            let err =
                apply_batch(&mut working, &batch(&[(DeltaKey::scalar("e1", "ki"), 1)]), dry_run);
            assert!(matches!(err, Err(StoreError::InvalidDocument { .. })));
        }
    }
}
