//! Change notes reported by delta application.

use crate::delta::DeltaKey;
use crate::ids::EntityId;

/// Prefix marking notes that describe a change without performing it.
pub const DRY_RUN_MARKER: &str = "DRY-RUN: ";

/// One entry in the ordered change report of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A dry run met an entity that a real run would create.
    WouldCreate {
        /// The missing entity.
        entity_id: EntityId,
    },

    /// A resource counter moved (or would move) from `before` to `after`.
    Adjusted {
        /// The counter that was addressed.
        key: DeltaKey,
        /// Value before subtraction (0 when absent).
        before: u64,
        /// Value after clamped subtraction.
        after: u64,
        /// Requested amount.
        amount: u64,
        /// Whether the value was only computed, not written.
        dry_run: bool,
    },
}

impl Change {
    /// Whether this note describes a change that was not performed.
    pub const fn is_dry_run(&self) -> bool {
        match self {
            Self::WouldCreate { .. } => true,
            Self::Adjusted { dry_run, .. } => *dry_run,
        }
    }

    /// The rendered note without the dry-run marker.
    pub fn description(&self) -> String {
        match self {
            Self::WouldCreate { entity_id } => format!("Would create entity {entity_id}"),
            Self::Adjusted {
                key,
                before,
                after,
                amount,
                ..
            } => format!(
                "{} {}: {before} -> {after} (subtract {amount})",
                key.entity_id,
                key.resource_label()
            ),
        }
    }
}

impl core::fmt::Display for Change {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_dry_run() {
            f.write_str(DRY_RUN_MARKER)?;
        }
        f.write_str(&self.description())
    }
}
