//! Broadcast medium: the pub/sub boundary between clients of a board.
//!
//! DESIGN
//! ======
//! The core only needs `publish` and a per-client subscription. `LocalHub`
//! is the in-process implementation: one channel per subscribed client,
//! grouped by board, plus an append-only log of every reliable message per
//! board so late joiners can hydrate. The publisher may exclude itself;
//! any self-echo that still arrives is dropped by the sync bridge.
//!
//! Publishing never waits on a subscriber. A subscriber whose channel is
//! full misses the live copy: best-effort messages are gone, reliable ones
//! stay in the log for the next join.

#[cfg(test)]
#[path = "medium_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::ephemeral::Signal;
use crate::error::ErrorCode;
use crate::store::{BoardId, ClientId};
use crate::sync::SyncEvent;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MediumError {
    #[error("subscription to board {0} closed")]
    Closed(BoardId),
    #[error("undecodable message: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ErrorCode for MediumError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed(_) => "E_MEDIUM_CLOSED",
            Self::Codec(_) => "E_CODEC",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Everything that travels over the medium, tagged by channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum Message {
    Sync(SyncEvent),
    Ephemeral(Signal),
}

impl Message {
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> Result<String, MediumError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns `Codec` if the blob is not a valid message.
    pub fn decode(blob: &str) -> Result<Self, MediumError> {
        Ok(serde_json::from_str(blob)?)
    }

    #[must_use]
    pub fn delivery(&self) -> Delivery {
        match self {
            Self::Sync(_) => Delivery::Reliable,
            Self::Ephemeral(_) => Delivery::BestEffort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Kept in the board's durable log.
    Reliable,
    /// At most once, never logged.
    BestEffort,
}

#[async_trait]
pub trait Medium: Send + Sync {
    /// Register a client on a board and return its inbound stream.
    async fn subscribe(&self, board_id: BoardId, client_id: ClientId) -> mpsc::Receiver<String>;

    async fn unsubscribe(&self, board_id: BoardId, client_id: ClientId);

    /// Deliver a blob to every subscriber of the board except `exclude`.
    /// Returns how many subscribers it reached. Never waits on a slow
    /// subscriber.
    async fn publish(&self, board_id: BoardId, exclude: Option<ClientId>, blob: String, delivery: Delivery) -> usize;

    /// Every reliable blob published to the board, in publish order.
    async fn history(&self, board_id: BoardId) -> Vec<String>;
}

// =============================================================================
// LOCAL HUB
// =============================================================================

#[derive(Default)]
struct Channel {
    subscribers: HashMap<ClientId, mpsc::Sender<String>>,
    log: Vec<String>,
}

/// In-process medium. Clone is cheap; clones share the same boards.
#[derive(Clone)]
pub struct LocalHub {
    boards: Arc<RwLock<HashMap<BoardId, Channel>>>,
    capacity: usize,
}

impl LocalHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { boards: Arc::new(RwLock::new(HashMap::new())), capacity: capacity.max(1) }
    }

    /// Number of clients currently subscribed to a board.
    pub async fn subscriber_count(&self, board_id: BoardId) -> usize {
        let boards = self.boards.read().await;
        boards.get(&board_id).map_or(0, |c| c.subscribers.len())
    }

    async fn drop_closed(&self, board_id: BoardId, closed: &[ClientId]) {
        if closed.is_empty() {
            return;
        }
        let mut boards = self.boards.write().await;
        if let Some(channel) = boards.get_mut(&board_id) {
            for client_id in closed {
                channel.subscribers.remove(client_id);
                debug!(%board_id, %client_id, "closed subscriber removed");
            }
        }
    }
}

#[async_trait]
impl Medium for LocalHub {
    async fn subscribe(&self, board_id: BoardId, client_id: ClientId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut boards = self.boards.write().await;
        boards.entry(board_id).or_default().subscribers.insert(client_id, tx);
        rx
    }

    async fn unsubscribe(&self, board_id: BoardId, client_id: ClientId) {
        let mut boards = self.boards.write().await;
        if let Some(channel) = boards.get_mut(&board_id) {
            channel.subscribers.remove(&client_id);
        }
    }

    async fn publish(&self, board_id: BoardId, exclude: Option<ClientId>, blob: String, delivery: Delivery) -> usize {
        let senders: Vec<(ClientId, mpsc::Sender<String>)> = {
            let mut boards = self.boards.write().await;
            let channel = boards.entry(board_id).or_default();
            if delivery == Delivery::Reliable {
                channel.log.push(blob.clone());
            }
            channel
                .subscribers
                .iter()
                .filter(|(id, _)| exclude != Some(**id))
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (client_id, tx) in senders {
            match tx.try_send(blob.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => match delivery {
                    Delivery::Reliable => warn!(%board_id, %client_id, "subscriber lagging; message left in log only"),
                    Delivery::BestEffort => debug!(%board_id, %client_id, "best-effort message dropped"),
                },
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(client_id),
            }
        }

        self.drop_closed(board_id, &closed).await;
        delivered
    }

    async fn history(&self, board_id: BoardId) -> Vec<String> {
        let boards = self.boards.read().await;
        boards.get(&board_id).map(|c| c.log.clone()).unwrap_or_default()
    }
}
