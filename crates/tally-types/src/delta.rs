//! Delta keys and delta batches.
//!
//! A delta is a requested subtraction from one resource of one entity. A
//! [`DeltaBatch`] maps each [`DeltaKey`] to the total amount to subtract,
//! keeping keys in the order they were first seen. Adding a key that is
//! already present accumulates the amounts instead of replacing them.

use indexmap::IndexMap;

use crate::ids::EntityId;

/// Resource type of leveled resources (spell slots).
pub const LEVELED_RESOURCE: &str = "spell_slot";

/// Key under an entity's `resources` map that holds the per-level counts.
pub const LEVELED_CONTAINER: &str = "spell_slots";

/// Whether a resource type addresses the leveled container.
///
/// Both the bare `spell_slot` type and the dotted `spell_slot.<n>` form count.
pub fn is_leveled(resource_type: &str) -> bool {
    resource_type == LEVELED_RESOURCE
        || resource_type
            .strip_prefix(LEVELED_RESOURCE)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Address of a single resource counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeltaKey {
    /// The entity owning the resource.
    pub entity_id: EntityId,
    /// Resource name (`ki`, `rage`) or [`LEVELED_RESOURCE`].
    pub resource_type: String,
    /// Slot level for leveled resources, 0 for scalar ones.
    pub level: u32,
}

impl DeltaKey {
    /// Key for a scalar resource.
    pub fn scalar(entity_id: impl Into<EntityId>, resource_type: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            resource_type: resource_type.into(),
            level: 0,
        }
    }

    /// Key for a leveled resource at `level`.
    pub fn leveled(entity_id: impl Into<EntityId>, level: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            resource_type: LEVELED_RESOURCE.to_owned(),
            level,
        }
    }

    /// Whether this key addresses the leveled container.
    pub fn is_leveled(&self) -> bool {
        is_leveled(&self.resource_type)
    }

    /// Resource label as written in delta text and change notes
    /// (`ki`, `spell_slot.2`).
    pub fn resource_label(&self) -> String {
        if self.is_leveled() {
            format!("{}.{}", self.resource_type, self.level)
        } else {
            self.resource_type.clone()
        }
    }
}

impl core::fmt::Display for DeltaKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.entity_id, self.resource_label())
    }
}

/// Ordered batch of subtractive deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaBatch {
    entries: IndexMap<DeltaKey, u64>,
}

impl DeltaBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the total for `key`.
    ///
    /// Totals saturate at `u64::MAX`; subtraction clamps at zero anyway.
    pub fn add(&mut self, key: DeltaKey, amount: u64) {
        let total = self.entries.entry(key).or_insert(0);
        *total = total.saturating_add(amount);
    }

    /// Total amount recorded for `key`, if any.
    pub fn get(&self, key: &DeltaKey) -> Option<u64> {
        self.entries.get(key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch holds no deltas.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, amount)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeltaKey, u64)> {
        self.entries.iter().map(|(key, amount)| (key, *amount))
    }
}

impl FromIterator<(DeltaKey, u64)> for DeltaBatch {
    fn from_iter<I: IntoIterator<Item = (DeltaKey, u64)>>(iter: I) -> Self {
        let mut batch = Self::new();
        batch.extend(iter);
        batch
    }
}

impl Extend<(DeltaKey, u64)> for DeltaBatch {
    fn extend<I: IntoIterator<Item = (DeltaKey, u64)>>(&mut self, iter: I) {
        for (key, amount) in iter {
            self.add(key, amount);
        }
    }
}

impl IntoIterator for DeltaBatch {
    type Item = (DeltaKey, u64);
    type IntoIter = indexmap::map::IntoIter<DeltaKey, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Renders the batch back into a `STATE-DELTA` block.
impl core::fmt::Display for DeltaBatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "STATE-DELTA")?;
        for (key, amount) in self.iter() {
            writeln!(f, "- {key} -= {amount}")?;
        }
        write!(f, "END STATE-DELTA")
    }
}
