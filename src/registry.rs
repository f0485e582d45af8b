//! Board registry: which boards a user owns.
//!
//! DESIGN
//! ======
//! The registry is the persistence collaborator for board metadata: per
//! user, an ordered list of `{board_id, name, image_url}`. The core only
//! uses it to resolve the board partition a session works on; shape records
//! never pass through here. `MemoryRegistry` is the in-process
//! implementation.

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ErrorCode;
use crate::store::BoardId;

pub type UserId = String;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("board {board_id} not found for user {user_id}")]
    BoardNotFound { user_id: UserId, board_id: BoardId },
    #[error("board name must not be empty")]
    EmptyName,
}

impl ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BoardNotFound { .. } => "E_BOARD_NOT_FOUND",
            Self::EmptyName => "E_EMPTY_NAME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    pub board_id: BoardId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[async_trait]
pub trait BoardRegistry: Send + Sync {
    /// The user's boards, in the order they were added.
    async fn list(&self, user_id: &str) -> Vec<BoardEntry>;

    /// # Errors
    ///
    /// Returns `BoardNotFound` if the user has no such board.
    async fn resolve(&self, user_id: &str, board_id: BoardId) -> Result<BoardEntry, RegistryError>;

    /// Add a board, or replace the entry with the same `board_id`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyName` for a blank name.
    async fn upsert(&self, user_id: &str, entry: BoardEntry) -> Result<(), RegistryError>;

    /// # Errors
    ///
    /// Returns `EmptyName` or `BoardNotFound`.
    async fn rename(&self, user_id: &str, board_id: BoardId, name: &str) -> Result<(), RegistryError>;

    /// # Errors
    ///
    /// Returns `BoardNotFound` if the user has no such board.
    async fn set_image(&self, user_id: &str, board_id: BoardId, image_url: Option<String>) -> Result<(), RegistryError>;

    /// # Errors
    ///
    /// Returns `BoardNotFound` if the user has no such board.
    async fn remove(&self, user_id: &str, board_id: BoardId) -> Result<BoardEntry, RegistryError>;
}

/// In-memory registry. Clone is cheap; clones share state.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    users: Arc<RwLock<HashMap<UserId, Vec<BoardEntry>>>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(user_id: &str, board_id: BoardId) -> RegistryError {
    RegistryError::BoardNotFound { user_id: user_id.to_string(), board_id }
}

fn check_name(name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }
    Ok(())
}

#[async_trait]
impl BoardRegistry for MemoryRegistry {
    async fn list(&self, user_id: &str) -> Vec<BoardEntry> {
        let users = self.users.read().await;
        users.get(user_id).cloned().unwrap_or_default()
    }

    async fn resolve(&self, user_id: &str, board_id: BoardId) -> Result<BoardEntry, RegistryError> {
        let users = self.users.read().await;
        users
            .get(user_id)
            .and_then(|boards| boards.iter().find(|b| b.board_id == board_id))
            .cloned()
            .ok_or_else(|| not_found(user_id, board_id))
    }

    async fn upsert(&self, user_id: &str, entry: BoardEntry) -> Result<(), RegistryError> {
        check_name(&entry.name)?;
        let mut users = self.users.write().await;
        let boards = users.entry(user_id.to_string()).or_default();
        match boards.iter_mut().find(|b| b.board_id == entry.board_id) {
            Some(existing) => *existing = entry,
            None => boards.push(entry),
        }
        Ok(())
    }

    async fn rename(&self, user_id: &str, board_id: BoardId, name: &str) -> Result<(), RegistryError> {
        check_name(name)?;
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(user_id)
            .and_then(|boards| boards.iter_mut().find(|b| b.board_id == board_id))
            .ok_or_else(|| not_found(user_id, board_id))?;
        entry.name = name.to_string();
        Ok(())
    }

    async fn set_image(&self, user_id: &str, board_id: BoardId, image_url: Option<String>) -> Result<(), RegistryError> {
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(user_id)
            .and_then(|boards| boards.iter_mut().find(|b| b.board_id == board_id))
            .ok_or_else(|| not_found(user_id, board_id))?;
        entry.image_url = image_url;
        Ok(())
    }

    async fn remove(&self, user_id: &str, board_id: BoardId) -> Result<BoardEntry, RegistryError> {
        let mut users = self.users.write().await;
        let boards = users.get_mut(user_id).ok_or_else(|| not_found(user_id, board_id))?;
        let pos = boards
            .iter()
            .position(|b| b.board_id == board_id)
            .ok_or_else(|| not_found(user_id, board_id))?;
        Ok(boards.remove(pos))
    }
}
