//! Ephemeral channel: cursor positions and reaction bursts.
//!
//! DESIGN
//! ======
//! Presence data is purely ephemeral: broadcast best-effort, shown for a
//! short window, then forgotten. It never touches the object store, is
//! never persisted, and is never retried. Signals are keyed by
//! `(origin_client_id, timestamp)` so a reaction delivered twice animates
//! once.

#[cfg(test)]
#[path = "ephemeral_test.rs"]
mod tests;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::store::ClientId;

/// What a signal carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Presence {
    Cursor,
    Reaction { emoji: String },
    /// The origin left the board; drop its cursor.
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub origin_client_id: ClientId,
    pub x: f64,
    pub y: f64,
    /// Milliseconds since Unix epoch at emission.
    pub timestamp: i64,
    pub payload: Presence,
}

/// Animation variant for a floating reaction, derived from its timestamp so
/// every client animates the same burst the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flight {
    /// Relative glyph size, 2..=6.
    pub size_class: u8,
    /// Rise path variant, 0..=2.
    pub rise: u8,
    /// Horizontal sway variant, 0..=2.
    pub sway: u8,
}

impl Signal {
    #[must_use]
    pub fn key(&self) -> (ClientId, i64) {
        (self.origin_client_id, self.timestamp)
    }

    #[must_use]
    pub fn flight(&self) -> Flight {
        let pick = |n: i64| u8::try_from(self.timestamp.rem_euclid(n)).unwrap_or(0);
        Flight { size_class: pick(5) + 2, rise: pick(3), sway: pick(3) }
    }
}

pub struct EphemeralChannel {
    client_id: ClientId,
    reaction_window_ms: i64,
    cursor_ttl_ms: i64,
    /// Latest cursor per remote peer.
    cursors: HashMap<ClientId, Signal>,
    /// Reactions still on screen, oldest first.
    reactions: Vec<Signal>,
    seen: HashSet<(ClientId, i64)>,
}

impl EphemeralChannel {
    #[must_use]
    pub fn new(client_id: ClientId, reaction_window_ms: i64, cursor_ttl_ms: i64) -> Self {
        Self {
            client_id,
            reaction_window_ms,
            cursor_ttl_ms,
            cursors: HashMap::new(),
            reactions: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Outbound cursor position for this client.
    #[must_use]
    pub fn cursor(&self, x: f64, y: f64, now: i64) -> Signal {
        Signal { origin_client_id: self.client_id, x, y, timestamp: now, payload: Presence::Cursor }
    }

    /// Outbound reaction. Also shown locally, so the sender sees its own burst.
    pub fn react(&mut self, x: f64, y: f64, emoji: &str, now: i64) -> Signal {
        let signal = Signal {
            origin_client_id: self.client_id,
            x,
            y,
            timestamp: now,
            payload: Presence::Reaction { emoji: emoji.to_string() },
        };
        self.seen.insert(signal.key());
        self.reactions.push(signal.clone());
        signal
    }

    /// Outbound notice that this client is leaving the board.
    #[must_use]
    pub fn depart(&self, now: i64) -> Signal {
        Signal { origin_client_id: self.client_id, x: 0.0, y: 0.0, timestamp: now, payload: Presence::Leave }
    }

    /// Take in a signal from the medium. Returns `true` if it changed what
    /// should be on screen.
    pub fn receive(&mut self, signal: Signal) -> bool {
        match signal.payload {
            Presence::Cursor => {
                if signal.origin_client_id == self.client_id {
                    return false;
                }
                if let Some(current) = self.cursors.get(&signal.origin_client_id) {
                    if current.timestamp >= signal.timestamp {
                        return false;
                    }
                }
                self.cursors.insert(signal.origin_client_id, signal);
                true
            }
            Presence::Reaction { .. } => {
                if !self.seen.insert(signal.key()) {
                    return false;
                }
                self.reactions.push(signal);
                true
            }
            Presence::Leave => self.leave(signal.origin_client_id),
        }
    }

    /// Drop reactions past their display window and cursors gone quiet.
    pub fn prune(&mut self, now: i64) {
        let reaction_cutoff = now - self.reaction_window_ms;
        let cursor_cutoff = now - self.cursor_ttl_ms;
        self.reactions.retain(|r| r.timestamp > reaction_cutoff);
        self.seen.retain(|(_, ts)| *ts > reaction_cutoff);
        self.cursors.retain(|_, c| c.timestamp > cursor_cutoff);
    }

    /// Forget a peer that left the board. Returns `true` if its cursor was
    /// on screen.
    pub fn leave(&mut self, client_id: ClientId) -> bool {
        self.cursors.remove(&client_id).is_some()
    }

    pub fn cursors(&self) -> impl Iterator<Item = &Signal> {
        self.cursors.values()
    }

    #[must_use]
    pub fn reactions(&self) -> &[Signal] {
        &self.reactions
    }
}
