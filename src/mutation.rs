//! Mutation applier: validates a mutation intent, applies it to the store,
//! and decides whether the result is worth broadcasting.
//!
//! DESIGN
//! ======
//! Local and remote edits go through the same entry points. A call that
//! changes state returns a `MutationDescriptor`; a call that changes nothing
//! returns `None`, which is what keeps a re-applied remote echo from
//! bouncing around the board forever.
//!
//! Resizes set absolute width/height and reset the matching scale factor to
//! exactly 1 so repeated resizes never compound scale drift.
//!
//! CONFLICTS
//! =========
//! `LastWriteWins` applies whatever arrives last. `FieldTimestamps` keeps a
//! `(ts, origin)` stamp per object field and drops updates older than the
//! stamp already applied. Both share the same external contract.

#[cfg(test)]
#[path = "mutation_test.rs"]
mod tests;

use std::collections::HashMap;
use std::str::FromStr;

use tracing::{debug, error};

use crate::error::ErrorCode;
use crate::shape::{ObjectId, PropertyChange, Shape, ShapeKind};
use crate::store::{ClientId, Direction, ObjectStore, Selection, StoreError, Updated};

// =============================================================================
// TYPES
// =============================================================================

/// What a state-changing mutation did.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Created(Shape),
    Updated(Vec<PropertyChange>),
    Reordered(Direction),
    Deleted,
}

/// Normalized record of a state-changing operation, used to drive broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDescriptor {
    pub object_id: ObjectId,
    pub kind: ShapeKind,
    pub change: Change,
}

/// Logical time of an edit: wall-clock milliseconds with the origin as a
/// tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp {
    pub ts: i64,
    pub origin: ClientId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    #[default]
    LastWriteWins,
    FieldTimestamps,
}

impl FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lww" => Ok(Self::LastWriteWins),
            "field_timestamps" => Ok(Self::FieldTimestamps),
            other => Err(format!("unknown resolution policy: {other}")),
        }
    }
}

// =============================================================================
// APPLIER
// =============================================================================

pub struct MutationApplier {
    policy: ResolutionPolicy,
    /// Last applied stamp per (object, property). Only kept under `FieldTimestamps`.
    stamps: HashMap<(ObjectId, &'static str), Stamp>,
}

impl MutationApplier {
    #[must_use]
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self { policy, stamps: HashMap::new() }
    }

    #[must_use]
    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Insert a freshly created or remotely announced shape.
    pub fn create(&mut self, store: &mut ObjectStore, shape: Shape) -> Option<MutationDescriptor> {
        let (object_id, kind) = (shape.object_id, shape.kind);
        match store.insert(shape.clone()) {
            Ok(()) => Some(MutationDescriptor { object_id, kind, change: Change::Created(shape) }),
            Err(err @ StoreError::DuplicateId(_)) => {
                error!(board_id = %store.board_id(), %object_id, code = err.error_code(), error = %err, "create aborted");
                None
            }
            Err(err) => {
                debug!(board_id = %store.board_id(), %object_id, code = err.error_code(), error = %err, "create rejected");
                None
            }
        }
    }

    /// Apply a property change to the current selection. Only a
    /// single-object selection is a valid target.
    pub fn modify(
        &mut self,
        store: &mut ObjectStore,
        selection: &Selection,
        change: PropertyChange,
        stamp: Stamp,
    ) -> Option<MutationDescriptor> {
        let Some(object_id) = selection.single() else {
            debug!(property = change.name(), "modify ignored: no single-object selection");
            return None;
        };
        self.apply_update(store, object_id, &[change], stamp)
    }

    /// Apply property changes to one object.
    pub fn apply_update(
        &mut self,
        store: &mut ObjectStore,
        object_id: ObjectId,
        changes: &[PropertyChange],
        stamp: Stamp,
    ) -> Option<MutationDescriptor> {
        let changes = self.admit(object_id, expand_resizes(changes), stamp);
        if changes.is_empty() {
            return None;
        }

        match store.update(object_id, &changes) {
            Ok(Updated::Changed(effective)) => {
                self.record(object_id, &changes, stamp);
                let kind = store.get(object_id).ok()?.kind;
                Some(MutationDescriptor { object_id, kind, change: Change::Updated(effective) })
            }
            Ok(Updated::Unchanged) => {
                self.record(object_id, &changes, stamp);
                None
            }
            Err(err) => {
                debug!(board_id = %store.board_id(), %object_id, code = err.error_code(), error = %err, "update skipped");
                None
            }
        }
    }

    /// Move the selected object to the front or back of paint order.
    pub fn bring(
        &mut self,
        store: &mut ObjectStore,
        selection: &Selection,
        direction: Direction,
    ) -> Option<MutationDescriptor> {
        let Some(object_id) = selection.single() else {
            debug!(?direction, "reorder ignored: no single-object selection");
            return None;
        };
        self.apply_reorder(store, object_id, direction)
    }

    pub fn apply_reorder(
        &mut self,
        store: &mut ObjectStore,
        object_id: ObjectId,
        direction: Direction,
    ) -> Option<MutationDescriptor> {
        match store.reorder(object_id, direction) {
            Ok(true) => {
                let kind = store.get(object_id).ok()?.kind;
                Some(MutationDescriptor { object_id, kind, change: Change::Reordered(direction) })
            }
            Ok(false) => None,
            Err(err) => {
                debug!(board_id = %store.board_id(), %object_id, code = err.error_code(), "reorder skipped");
                None
            }
        }
    }

    /// Delete every id independently. Ids without a record are skipped.
    pub fn delete(&mut self, store: &mut ObjectStore, ids: &[ObjectId]) -> Vec<MutationDescriptor> {
        ids.iter()
            .filter_map(|&object_id| match store.remove(object_id) {
                Ok(shape) => {
                    self.stamps.retain(|(id, _), _| *id != object_id);
                    Some(MutationDescriptor { object_id, kind: shape.kind, change: Change::Deleted })
                }
                Err(err) => {
                    debug!(board_id = %store.board_id(), %object_id, code = err.error_code(), "delete skipped");
                    None
                }
            })
            .collect()
    }

    /// Replay a descriptor produced elsewhere (usually a remote peer).
    pub fn apply(
        &mut self,
        store: &mut ObjectStore,
        descriptor: MutationDescriptor,
        stamp: Stamp,
    ) -> Option<MutationDescriptor> {
        let MutationDescriptor { object_id, change, .. } = descriptor;
        match change {
            Change::Created(shape) => self.create(store, shape),
            Change::Updated(changes) => self.apply_update(store, object_id, &changes, stamp),
            Change::Reordered(direction) => self.apply_reorder(store, object_id, direction),
            Change::Deleted => self.delete(store, &[object_id]).pop(),
        }
    }

    /// Drop changes whose field already carries a newer stamp.
    fn admit(&self, object_id: ObjectId, changes: Vec<PropertyChange>, stamp: Stamp) -> Vec<PropertyChange> {
        if self.policy == ResolutionPolicy::LastWriteWins {
            return changes;
        }
        changes
            .into_iter()
            .filter(|change| match self.stamps.get(&(object_id, change.name())) {
                Some(applied) if *applied > stamp => {
                    debug!(%object_id, property = change.name(), "stale field update dropped");
                    false
                }
                _ => true,
            })
            .collect()
    }

    fn record(&mut self, object_id: ObjectId, changes: &[PropertyChange], stamp: Stamp) {
        if self.policy == ResolutionPolicy::LastWriteWins {
            return;
        }
        for change in changes {
            self.stamps.insert((object_id, change.name()), stamp);
        }
    }
}

impl Default for MutationApplier {
    fn default() -> Self {
        Self::new(ResolutionPolicy::default())
    }
}

/// Pair any width/height assignment with a reset of its scale factor to 1.
/// A scale change for a resized axis in the same batch is dropped, so the
/// reset always wins.
fn expand_resizes(changes: &[PropertyChange]) -> Vec<PropertyChange> {
    let resize_x = changes.iter().any(|c| matches!(c, PropertyChange::Width(_)));
    let resize_y = changes.iter().any(|c| matches!(c, PropertyChange::Height(_)));

    let mut out: Vec<PropertyChange> = changes
        .iter()
        .filter(|c| match c {
            PropertyChange::ScaleX(_) => !resize_x,
            PropertyChange::ScaleY(_) => !resize_y,
            _ => true,
        })
        .cloned()
        .collect();
    if resize_x {
        out.push(PropertyChange::ScaleX(1.0));
    }
    if resize_y {
        out.push(PropertyChange::ScaleY(1.0));
    }
    out
}
