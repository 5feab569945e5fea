// ⚖️ Reconciliation Engine - minimal-diff merge of a submitted entity
//
// reconcile(current, proposed):
//   diff = fields where proposed != current
//   diff empty  -> NoChange
//   otherwise   -> current with exactly the diff fields copied from proposed,
//                  then the entity's post-merge hook
//
// The merge is built on a clone and handed back whole, or not at all.
// Nothing here touches storage.

use crate::fields::{FieldDescriptor, FieldDiffer};
use crate::temporal::Clock;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// RECONCILABLE ENTITIES
// ============================================================================

/// An entity kind that edit operations can reconcile
pub trait Reconcilable: Clone + Send + Sync + 'static {
    /// Kind name used in messages and logs
    const KIND: &'static str;

    /// Every diffable field, in a fixed order. Identity and version are
    /// not part of the table.
    fn field_table() -> Vec<FieldDescriptor<Self>>;

    fn id(&self) -> i64;

    fn version(&self) -> i64;

    /// Side effect applied after every successful merge
    fn after_merge(&mut self, _now: DateTime<FixedOffset>) {}
}

// ============================================================================
// OUTCOME & ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome<E> {
    /// Submitted entity is equal to the stored one
    NoChange,

    /// Stored entity with the changed fields applied, ready to commit
    Merged {
        entity: E,
        changed: Vec<&'static str>,
    },
}

impl<E> ReconciliationOutcome<E> {
    pub fn is_no_change(&self) -> bool {
        matches!(self, ReconciliationOutcome::NoChange)
    }

    pub fn merged(self) -> Option<E> {
        match self {
            ReconciliationOutcome::Merged { entity, .. } => Some(entity),
            ReconciliationOutcome::NoChange => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("{kind} {id} was modified concurrently (stored version {stored}, submitted {submitted})")]
    StaleVersion {
        kind: &'static str,
        id: i64,
        stored: i64,
        submitted: i64,
    },

    #[error("field '{field}' could not be applied: {reason}")]
    FieldRejected { field: &'static str, reason: String },
}

// ============================================================================
// ENTITY RECONCILER
// ============================================================================

pub struct EntityReconciler<E> {
    differ: FieldDiffer<E>,
    clock: Arc<dyn Clock>,
}

impl<E: Reconcilable> EntityReconciler<E> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        EntityReconciler {
            differ: FieldDiffer::new(E::field_table()),
            clock,
        }
    }

    pub fn differ(&self) -> &FieldDiffer<E> {
        &self.differ
    }

    /// Merge `proposed` into `current`.
    ///
    /// Fails with `StaleVersion` when `proposed` was based on a different
    /// version than the stored one, and with `FieldRejected` when any
    /// changed field cannot be written (no partial merge is returned).
    pub fn reconcile(
        &self,
        current: &E,
        proposed: &E,
    ) -> Result<ReconciliationOutcome<E>, ReconcileError> {
        if proposed.version() != current.version() {
            return Err(ReconcileError::StaleVersion {
                kind: E::KIND,
                id: current.id(),
                stored: current.version(),
                submitted: proposed.version(),
            });
        }

        let changed = self.differ.diff(current, proposed);
        if changed.is_empty() {
            tracing::debug!(kind = E::KIND, id = current.id(), "no fields changed");
            return Ok(ReconciliationOutcome::NoChange);
        }

        let mut merged = current.clone();
        for &name in &changed {
            if let Some(field) = self.differ.field(name) {
                field
                    .apply(proposed, &mut merged)
                    .map_err(|reason| ReconcileError::FieldRejected { field: name, reason })?;
            }
        }
        merged.after_merge(self.clock.now());

        tracing::debug!(kind = E::KIND, id = current.id(), changed = ?changed, "merged");
        Ok(ReconciliationOutcome::Merged {
            entity: merged,
            changed,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
