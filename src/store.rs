//! Object store: the authoritative per-board shape map and paint order.
//!
//! DESIGN
//! ======
//! Records live in a `HashMap` keyed by object id; paint order is a separate
//! `Vec` of ids, back to front. Deleted ids are remembered so they can never
//! be inserted again. The store has no notion of the current selection: the
//! view layer passes its selected ids in and gets back a classified
//! `Selection` value.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::shape::{ObjectId, PropertyChange, Shape, ShapeError};

/// Partition key for a board.
pub type BoardId = Uuid;

/// Identity of one connected client.
pub type ClientId = Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("object id already used: {0}")]
    DuplicateId(ObjectId),
    #[error("object not found: {0}")]
    NotFound(ObjectId),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "E_DUPLICATE_ID",
            Self::NotFound(_) => "E_OBJECT_NOT_FOUND",
            Self::Shape(err) => err.error_code(),
        }
    }
}

/// Direction for a paint-order move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Front,
    Back,
}

/// Outcome of a field update.
#[derive(Debug, Clone, PartialEq)]
pub enum Updated {
    /// Every supplied value already matched the record.
    Unchanged,
    /// The changes that actually altered the record, in the order given.
    Changed(Vec<PropertyChange>),
}

/// Active selection scope as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Empty,
    Single(ObjectId),
    /// A transient group of several objects. Never a mutation target for
    /// single-object updates or reorders.
    Multi(Vec<ObjectId>),
}

impl Selection {
    /// The target id when exactly one object is selected.
    #[must_use]
    pub fn single(&self) -> Option<ObjectId> {
        match self {
            Self::Single(id) => Some(*id),
            Self::Empty | Self::Multi(_) => None,
        }
    }

    /// Every selected id.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(id) => vec![*id],
            Self::Multi(ids) => ids.clone(),
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct ObjectStore {
    board_id: BoardId,
    records: HashMap<ObjectId, Shape>,
    /// Back to front.
    order: Vec<ObjectId>,
    retired: HashSet<ObjectId>,
}

impl ObjectStore {
    #[must_use]
    pub fn new(board_id: BoardId) -> Self {
        Self { board_id, records: HashMap::new(), order: Vec::new(), retired: HashSet::new() }
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Add a new record on top of the paint order.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is live or was deleted earlier, or a
    /// shape error if the record is malformed.
    pub fn insert(&mut self, shape: Shape) -> Result<(), StoreError> {
        let id = shape.object_id;
        if self.records.contains_key(&id) || self.retired.contains(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        shape.validate()?;
        self.order.push(id);
        self.records.insert(id, shape);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn get(&self, id: ObjectId) -> Result<&Shape, StoreError> {
        self.records.get(&id).ok_or(StoreError::NotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.records.contains_key(&id)
    }

    /// Replace only the named fields of a record. The update is applied to a
    /// copy first, so a failing change leaves the record untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing record, or the shape error of the
    /// first change that does not apply.
    pub fn update(&mut self, id: ObjectId, changes: &[PropertyChange]) -> Result<Updated, StoreError> {
        let current = self.records.get(&id).ok_or(StoreError::NotFound(id))?;

        let mut next = current.clone();
        let mut effective = Vec::new();
        for change in changes {
            if next.apply(change)? {
                effective.push(change.clone());
            }
        }
        if effective.is_empty() {
            return Ok(Updated::Unchanged);
        }
        next.validate()?;
        self.records.insert(id, next);
        Ok(Updated::Changed(effective))
    }

    /// Move a record to the front or back of paint order. Returns `false`
    /// when it is already there.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn reorder(&mut self, id: ObjectId, direction: Direction) -> Result<bool, StoreError> {
        let pos = self
            .order
            .iter()
            .position(|x| *x == id)
            .ok_or(StoreError::NotFound(id))?;

        let target = match direction {
            Direction::Front => self.order.len() - 1,
            Direction::Back => 0,
        };
        if pos == target {
            return Ok(false);
        }
        self.order.remove(pos);
        match direction {
            Direction::Front => self.order.push(id),
            Direction::Back => self.order.insert(0, id),
        }
        Ok(true)
    }

    /// Delete a record. Its id is retired and can never be inserted again.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has this id.
    pub fn remove(&mut self, id: ObjectId) -> Result<Shape, StoreError> {
        let shape = self.records.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.order.retain(|x| *x != id);
        self.retired.insert(id);
        Ok(shape)
    }

    /// Classify the view layer's selected ids against live records. Ids
    /// without a record are ignored.
    #[must_use]
    pub fn selection_snapshot(&self, selected: &[ObjectId]) -> Selection {
        let mut live: Vec<ObjectId> = Vec::new();
        for id in selected {
            if self.records.contains_key(id) && !live.contains(id) {
                live.push(*id);
            }
        }
        match live.len() {
            0 => Selection::Empty,
            1 => Selection::Single(live[0]),
            _ => Selection::Multi(live),
        }
    }

    /// Records back to front.
    pub fn paint_order(&self) -> impl Iterator<Item = &Shape> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Ids back to front.
    #[must_use]
    pub fn order(&self) -> &[ObjectId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
