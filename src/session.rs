//! Session: one client's live connection to one board.
//!
//! DESIGN
//! ======
//! A session wires the synchronous `Board` and `EphemeralChannel` to a
//! `Medium`. Joining resolves the board through the registry, subscribes,
//! then replays the medium's durable log into a fresh store. Subscribing
//! before reading the log means an event can arrive both ways; the sync
//! bridge drops the second copy by `seq`.
//!
//! Every state change, local or remote, is reported to the `Renderer` after
//! the store has been updated. The session never reads the view back.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::board::{Board, Local};
use crate::config::Config;
use crate::ephemeral::{EphemeralChannel, Signal};
use crate::error::ErrorCode;
use crate::medium::{Medium, MediumError, Message};
use crate::mutation::{Change, MutationDescriptor};
use crate::registry::{BoardEntry, BoardRegistry, RegistryError};
use crate::shape::{ObjectId, Point, PropertyChange, Shape, ShapeError, ShapeKind, create_named};
use crate::store::{BoardId, ClientId, Direction};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Medium(#[from] MediumError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Registry(e) => e.error_code(),
            Self::Medium(e) => e.error_code(),
            Self::Shape(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Medium(e) => e.retryable(),
            Self::Registry(_) | Self::Shape(_) => false,
        }
    }
}

/// What the view layer must redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUpdate {
    /// A shape was created or changed; draw it as given.
    Upsert(Shape),
    Remove(ObjectId),
    /// New paint order, back to front.
    Restack(Vec<ObjectId>),
    /// A cursor moved, a reaction arrived, or a peer left.
    Presence(Signal),
}

/// The view layer. Called after the store already reflects the change.
pub trait Renderer: Send {
    fn render(&mut self, update: RenderUpdate);
}

/// Renderer that draws nothing.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _update: RenderUpdate) {}
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    user_id: String,
    entry: BoardEntry,
    board: Board,
    presence: EphemeralChannel,
    medium: Arc<dyn Medium>,
    inbox: mpsc::Receiver<String>,
    renderer: Box<dyn Renderer>,
}

impl Session {
    /// Join a board the user owns and hydrate it from the medium's log.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the user has no such board.
    pub async fn join(
        medium: Arc<dyn Medium>,
        registry: &dyn BoardRegistry,
        user_id: &str,
        board_id: BoardId,
        config: &Config,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self, SessionError> {
        let entry = registry.resolve(user_id, board_id).await?;
        let client_id = config.client_id;
        let inbox = medium.subscribe(board_id, client_id).await;

        let mut session = Self {
            user_id: user_id.to_string(),
            entry,
            board: Board::new(board_id, client_id, config.resolution),
            presence: EphemeralChannel::new(client_id, config.reaction_window_ms, config.cursor_ttl_ms),
            medium,
            inbox,
            renderer,
        };

        let history = session.medium.history(board_id).await;
        let mut replayed = 0usize;
        for blob in &history {
            match Message::decode(blob) {
                Ok(Message::Sync(event)) => {
                    if let Some(descriptor) = session.board.replay(&event) {
                        session.render(&descriptor);
                        replayed += 1;
                    }
                }
                Ok(Message::Ephemeral(_)) => {}
                Err(err) => warn!(%board_id, code = err.error_code(), error = %err, "undecodable log entry skipped"),
            }
        }

        info!(%board_id, %client_id, user_id, name = %session.entry.name, replayed, objects = session.board.store().len(), "session joined");
        Ok(session)
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn presence(&self) -> &EphemeralChannel {
        &self.presence
    }

    #[must_use]
    pub fn entry(&self) -> &BoardEntry {
        &self.entry
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board.board_id()
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.board.client_id()
    }

    // -------------------------------------------------------------------------
    // Local edits
    // -------------------------------------------------------------------------

    /// Add a shape. Returns its id if it was created.
    pub async fn create(&mut self, shape: Shape) -> Option<ObjectId> {
        let local = self.board.create(shape)?;
        let id = local.descriptor.object_id;
        self.commit(local).await;
        Some(id)
    }

    /// Create a shape from a toolbar kind name. Unknown kinds and `freeform`
    /// create nothing.
    pub async fn create_named(&mut self, kind: &str, anchor: Point, text: Option<&str>) -> Option<ObjectId> {
        let shape = create_named(kind, anchor, text)?;
        self.create(shape).await
    }

    /// Commit a finished free-form stroke.
    ///
    /// # Errors
    ///
    /// Returns `Shape` if the stroke has fewer than two points.
    pub async fn draw_path(
        &mut self,
        anchor: Point,
        points: Vec<Point>,
        stroke: &str,
        stroke_width: f64,
    ) -> Result<Option<ObjectId>, SessionError> {
        let shape = Shape::freeform(anchor, points, stroke, stroke_width)?;
        debug!(board_id = %self.board_id(), kind = %ShapeKind::Freeform, "stroke committed");
        Ok(self.create(shape).await)
    }

    /// Change one property of the current selection.
    pub async fn modify(&mut self, selected: &[ObjectId], change: PropertyChange) -> bool {
        match self.board.modify(selected, change) {
            Some(local) => {
                self.commit(local).await;
                true
            }
            None => false,
        }
    }

    pub async fn bring(&mut self, selected: &[ObjectId], direction: Direction) -> bool {
        match self.board.bring(selected, direction) {
            Some(local) => {
                self.commit(local).await;
                true
            }
            None => false,
        }
    }

    /// Delete every listed object that still exists. Returns how many were.
    pub async fn delete(&mut self, ids: &[ObjectId]) -> usize {
        let deleted = self.board.delete(ids);
        let count = deleted.len();
        for local in deleted {
            self.commit(local).await;
        }
        count
    }

    // -------------------------------------------------------------------------
    // Presence
    // -------------------------------------------------------------------------

    pub async fn move_cursor(&mut self, x: f64, y: f64) {
        let signal = self.presence.cursor(x, y, crate::now_ms());
        self.publish(Message::Ephemeral(signal)).await;
    }

    pub async fn react(&mut self, x: f64, y: f64, emoji: &str) {
        let signal = self.presence.react(x, y, emoji, crate::now_ms());
        self.renderer.render(RenderUpdate::Presence(signal.clone()));
        self.publish(Message::Ephemeral(signal)).await;
    }

    // -------------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------------

    /// Handle one blob from the medium. Returns `true` if anything changed.
    pub fn handle(&mut self, blob: &str) -> bool {
        match Message::decode(blob) {
            Ok(Message::Sync(event)) => match self.board.receive(&event) {
                Some(descriptor) => {
                    self.render(&descriptor);
                    true
                }
                None => false,
            },
            Ok(Message::Ephemeral(signal)) => {
                if self.presence.receive(signal.clone()) {
                    self.renderer.render(RenderUpdate::Presence(signal));
                    true
                } else {
                    false
                }
            }
            Err(err) => {
                warn!(board_id = %self.board_id(), code = err.error_code(), error = %err, "undecodable message dropped");
                false
            }
        }
    }

    /// Handle everything already waiting in the inbox, then expire stale
    /// presence. Returns how many messages changed state.
    pub fn pump(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(blob) = self.inbox.try_recv() {
            if self.handle(&blob) {
                changed += 1;
            }
        }
        self.presence.prune(crate::now_ms());
        changed
    }

    /// Wait for the next message and handle it.
    ///
    /// # Errors
    ///
    /// Returns `Medium(Closed)` once the subscription has ended.
    pub async fn next(&mut self) -> Result<bool, SessionError> {
        let blob = self.inbox.recv().await.ok_or(MediumError::Closed(self.board_id()))?;
        Ok(self.handle(&blob))
    }

    /// Tell peers to drop this client's cursor, then unsubscribe.
    pub async fn leave(self) {
        let (board_id, client_id) = (self.board_id(), self.client_id());
        let notice = self.presence.depart(crate::now_ms());
        self.publish(Message::Ephemeral(notice)).await;
        self.medium.unsubscribe(board_id, client_id).await;
        info!(%board_id, %client_id, user_id = %self.user_id, "session left");
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn commit(&mut self, local: Local) {
        self.render(&local.descriptor);
        if let Some(event) = local.event {
            self.publish(Message::Sync(event)).await;
        }
    }

    async fn publish(&self, message: Message) {
        let board_id = self.board_id();
        let blob = match message.encode() {
            Ok(blob) => blob,
            Err(err) => {
                error!(%board_id, code = err.error_code(), error = %err, "message not encoded");
                return;
            }
        };
        let delivered = self.medium.publish(board_id, Some(self.client_id()), blob, message.delivery()).await;
        debug!(%board_id, delivered, "message published");
    }

    fn render(&mut self, descriptor: &MutationDescriptor) {
        let id = descriptor.object_id;
        let update = match &descriptor.change {
            Change::Created(_) | Change::Updated(_) => match self.board.store().get(id) {
                Ok(shape) => RenderUpdate::Upsert(shape.clone()),
                Err(_) => return,
            },
            Change::Reordered(_) => RenderUpdate::Restack(self.board.store().order().to_vec()),
            Change::Deleted => RenderUpdate::Remove(id),
        };
        self.renderer.render(update);
    }
}
