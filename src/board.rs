//! Board handle: the explicit per-board context a client works against.
//!
//! DESIGN
//! ======
//! A `Board` bundles one `ObjectStore` with the `MutationApplier` and
//! `SyncBridge` that guard it. Nothing here is global, so a process can hold
//! any number of boards and tests can build one directly. Every method is
//! synchronous and runs to completion; I/O lives in `session`.

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;

use tracing::error;

use crate::error::ErrorCode;
use crate::mutation::{MutationApplier, MutationDescriptor, ResolutionPolicy, Stamp};
use crate::shape::{ObjectId, PropertyChange, Shape};
use crate::store::{BoardId, ClientId, Direction, ObjectStore};
use crate::sync::{SyncBridge, SyncEvent};

/// A local edit that changed state, with the event to publish for it.
#[derive(Debug, Clone)]
pub struct Local {
    pub descriptor: MutationDescriptor,
    /// `None` only if the event could not be encoded; the edit still stands.
    pub event: Option<SyncEvent>,
}

pub struct Board {
    store: ObjectStore,
    applier: MutationApplier,
    bridge: SyncBridge,
}

impl Board {
    #[must_use]
    pub fn new(board_id: BoardId, client_id: ClientId, policy: ResolutionPolicy) -> Self {
        Self {
            store: ObjectStore::new(board_id),
            applier: MutationApplier::new(policy),
            bridge: SyncBridge::new(board_id, client_id),
        }
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.store.board_id()
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.bridge.client_id()
    }

    #[must_use]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Add a shape built by the factory or captured as a free-form path.
    pub fn create(&mut self, shape: Shape) -> Option<Local> {
        let descriptor = self.applier.create(&mut self.store, shape)?;
        Some(self.emit(descriptor))
    }

    /// Change one property of the selected object. `selected` is the view
    /// layer's current selection; anything but a single live object is a no-op.
    pub fn modify(&mut self, selected: &[ObjectId], change: PropertyChange) -> Option<Local> {
        let selection = self.store.selection_snapshot(selected);
        let stamp = self.stamp();
        let descriptor = self.applier.modify(&mut self.store, &selection, change, stamp)?;
        Some(self.emit(descriptor))
    }

    /// Bring the selected object to the front or send it to the back.
    pub fn bring(&mut self, selected: &[ObjectId], direction: Direction) -> Option<Local> {
        let selection = self.store.selection_snapshot(selected);
        let descriptor = self.applier.bring(&mut self.store, &selection, direction)?;
        Some(self.emit(descriptor))
    }

    /// Delete every listed object that still exists.
    pub fn delete(&mut self, ids: &[ObjectId]) -> Vec<Local> {
        self.applier
            .delete(&mut self.store, ids)
            .into_iter()
            .map(|descriptor| self.emit(descriptor))
            .collect()
    }

    /// Apply an event from a peer.
    pub fn receive(&mut self, event: &SyncEvent) -> Option<MutationDescriptor> {
        self.bridge.inbound(event, &mut self.store, &mut self.applier)
    }

    /// Apply an event from the durable log while hydrating.
    pub fn replay(&mut self, event: &SyncEvent) -> Option<MutationDescriptor> {
        self.bridge.replay(event, &mut self.store, &mut self.applier)
    }

    fn stamp(&self) -> Stamp {
        Stamp { ts: crate::now_ms(), origin: self.bridge.client_id() }
    }

    fn emit(&mut self, descriptor: MutationDescriptor) -> Local {
        let event = match self.bridge.outbound(&descriptor) {
            Ok(event) => Some(event),
            Err(err) => {
                error!(board_id = %self.board_id(), object_id = %descriptor.object_id, code = err.error_code(), error = %err, "outbound event not built");
                None
            }
        };
        Local { descriptor, event }
    }
}
