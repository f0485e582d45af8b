//! Sync bridge: translates local mutation descriptors into outbound sync
//! events and inbound sync events back into store mutations.
//!
//! DESIGN
//! ======
//! Every outbound event carries the board partition key, the origin client
//! id, and a per-origin `seq`. Inbound events are checked in a fixed order:
//! board partition, self-echo, duplicate `seq`, payload decode. Accepted
//! events are replayed through the same `MutationApplier` entry points as
//! local edits, so remote and local changes share one set of invariants.
//!
//! ORDERING
//! ========
//! The bridge never reorders. It assumes the medium keeps each origin's
//! events in emission order and makes no cross-origin promise: concurrent
//! edits to one object resolve to whatever each receiver applies last.
//! Gaps in an origin's `seq` are logged and otherwise ignored; there is no
//! retry.

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::ErrorCode;
use crate::mutation::{Change, MutationApplier, MutationDescriptor, Stamp};
use crate::shape::{ObjectId, PropertyChange, Shape, ShapeKind};
use crate::store::{BoardId, ClientId, Direction, ObjectStore};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("self echo (seq {seq})")]
    SelfEcho { seq: u64 },
    #[error("duplicate event from {origin} (seq {seq})")]
    Duplicate { origin: ClientId, seq: u64 },
    #[error("event for board {got} received on board {expected}")]
    WrongBoard { expected: BoardId, got: BoardId },
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ErrorCode for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SelfEcho { .. } => "E_SELF_ECHO",
            Self::Duplicate { .. } => "E_DUPLICATE_EVENT",
            Self::WrongBoard { .. } => "E_WRONG_BOARD",
            Self::Malformed(_) => "E_MALFORMED_EVENT",
            Self::Codec(_) => "E_CODEC",
        }
    }
}

// =============================================================================
// WIRE EVENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Reorder,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Properties,
    Front,
    Back,
}

/// A durable mutation as it travels between clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub board_id: BoardId,
    pub object_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ShapeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub origin_client_id: ClientId,
    /// Per-origin counter, used only to suppress duplicates.
    pub seq: u64,
    /// Milliseconds since Unix epoch at emission.
    #[serde(default)]
    pub ts: i64,
}

impl SyncEvent {
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns `Codec` if the blob is not a valid event.
    pub fn decode(blob: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(blob)?)
    }

    #[must_use]
    pub fn stamp(&self) -> Stamp {
        Stamp { ts: self.ts, origin: self.origin_client_id }
    }

    /// Decode the event body into a mutation descriptor.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` when a required field is missing or does not fit
    /// the event type, or `Codec` when the payload does not decode.
    pub fn descriptor(&self) -> Result<MutationDescriptor, SyncError> {
        let object_id = self.object_id;

        if self.event_type == EventType::Create {
            let shape: Shape = serde_json::from_value(self.payload()?.clone())?;
            if shape.object_id != object_id {
                return Err(SyncError::Malformed(format!("payload id {} != object id {object_id}", shape.object_id)));
            }
            return Ok(MutationDescriptor { object_id, kind: shape.kind, change: Change::Created(shape) });
        }

        let kind = self
            .kind
            .ok_or_else(|| SyncError::Malformed(format!("{:?} event without kind", self.event_type)))?;

        let change = match (self.event_type, self.change_type) {
            (EventType::Update, Some(ChangeType::Properties)) => {
                let changes: Vec<PropertyChange> = serde_json::from_value(self.payload()?.clone())?;
                Change::Updated(changes)
            }
            (EventType::Reorder, Some(ChangeType::Front)) => Change::Reordered(Direction::Front),
            (EventType::Reorder, Some(ChangeType::Back)) => Change::Reordered(Direction::Back),
            (EventType::Delete, _) => Change::Deleted,
            (event_type, change_type) => {
                return Err(SyncError::Malformed(format!("{event_type:?} event with change type {change_type:?}")));
            }
        };
        Ok(MutationDescriptor { object_id, kind, change })
    }

    fn payload(&self) -> Result<&serde_json::Value, SyncError> {
        self.payload
            .as_ref()
            .ok_or_else(|| SyncError::Malformed(format!("{:?} event without payload", self.event_type)))
    }
}

// =============================================================================
// BRIDGE
// =============================================================================

pub struct SyncBridge {
    board_id: BoardId,
    client_id: ClientId,
    /// Last `seq` this client emitted.
    last_emitted: u64,
    /// Highest `seq` accepted per origin.
    seen: HashMap<ClientId, u64>,
}

impl SyncBridge {
    #[must_use]
    pub fn new(board_id: BoardId, client_id: ClientId) -> Self {
        Self { board_id, client_id, last_emitted: 0, seen: HashMap::new() }
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Build the outbound event for a local, state-changing mutation.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the payload cannot be serialized.
    pub fn outbound(&mut self, descriptor: &MutationDescriptor) -> Result<SyncEvent, SyncError> {
        let (event_type, change_type, payload) = match &descriptor.change {
            Change::Created(shape) => (EventType::Create, None, Some(serde_json::to_value(shape)?)),
            Change::Updated(changes) => {
                (EventType::Update, Some(ChangeType::Properties), Some(serde_json::to_value(changes)?))
            }
            Change::Reordered(Direction::Front) => (EventType::Reorder, Some(ChangeType::Front), None),
            Change::Reordered(Direction::Back) => (EventType::Reorder, Some(ChangeType::Back), None),
            Change::Deleted => (EventType::Delete, None, None),
        };

        self.last_emitted += 1;
        Ok(SyncEvent {
            event_type,
            board_id: self.board_id,
            object_id: descriptor.object_id,
            kind: Some(descriptor.kind),
            change_type,
            payload,
            origin_client_id: self.client_id,
            seq: self.last_emitted,
            ts: crate::now_ms(),
        })
    }

    /// Run the inbound checks without touching a store.
    #[cfg(test)]
    pub(crate) fn accept(&mut self, event: &SyncEvent) -> Result<MutationDescriptor, SyncError> {
        self.admit(event, false)
    }

    /// Apply an inbound event from a peer. Returns the descriptor of the
    /// change it made, or `None` when it was dropped or changed nothing.
    pub fn inbound(
        &mut self,
        event: &SyncEvent,
        store: &mut ObjectStore,
        applier: &mut MutationApplier,
    ) -> Option<MutationDescriptor> {
        self.receive(event, false, store, applier)
    }

    /// Apply an event from the medium's durable log while hydrating a fresh
    /// store. The client's own earlier events are applied too, and the
    /// outbound `seq` resumes after the highest one seen.
    pub fn replay(
        &mut self,
        event: &SyncEvent,
        store: &mut ObjectStore,
        applier: &mut MutationApplier,
    ) -> Option<MutationDescriptor> {
        self.receive(event, true, store, applier)
    }

    fn receive(
        &mut self,
        event: &SyncEvent,
        allow_self: bool,
        store: &mut ObjectStore,
        applier: &mut MutationApplier,
    ) -> Option<MutationDescriptor> {
        let descriptor = match self.admit(event, allow_self) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.log_dropped(event, &err);
                return None;
            }
        };
        applier.apply(store, descriptor, event.stamp())
    }

    fn admit(&mut self, event: &SyncEvent, allow_self: bool) -> Result<MutationDescriptor, SyncError> {
        if event.board_id != self.board_id {
            return Err(SyncError::WrongBoard { expected: self.board_id, got: event.board_id });
        }

        let origin = event.origin_client_id;
        if origin == self.client_id {
            if !allow_self {
                return Err(SyncError::SelfEcho { seq: event.seq });
            }
            self.last_emitted = self.last_emitted.max(event.seq);
        }

        let last = self.seen.get(&origin).copied().unwrap_or(0);
        if event.seq <= last {
            return Err(SyncError::Duplicate { origin, seq: event.seq });
        }
        if event.seq > last + 1 {
            warn!(board_id = %self.board_id, %origin, expected = last + 1, got = event.seq, "sync seq gap");
        }
        self.seen.insert(origin, event.seq);

        event.descriptor()
    }

    fn log_dropped(&self, event: &SyncEvent, err: &SyncError) {
        let origin = event.origin_client_id;
        let seq = event.seq;
        match err {
            SyncError::SelfEcho { .. } => trace!(board_id = %self.board_id, seq, "self echo dropped"),
            SyncError::Duplicate { .. } => {
                debug!(board_id = %self.board_id, %origin, seq, code = err.error_code(), "duplicate dropped");
            }
            SyncError::WrongBoard { .. } | SyncError::Malformed(_) | SyncError::Codec(_) => {
                warn!(board_id = %self.board_id, %origin, seq, code = err.error_code(), error = %err, "sync event dropped");
            }
        }
    }
}
