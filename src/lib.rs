//! Sketchboard: the data core of a collaborative drawing surface.
//!
//! Shapes are created by the factory (`shape`), kept per board in an
//! ordered `store`, changed only through the `mutation` applier, and
//! exchanged between clients by the `sync` bridge. Cursor and reaction
//! traffic goes through the separate `ephemeral` channel and never touches
//! the store. `session` wires one board to a broadcast `medium`.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod board;
pub mod config;
pub mod ephemeral;
pub mod error;
pub mod medium;
pub mod mutation;
pub mod registry;
pub mod session;
pub mod shape;
pub mod store;
pub mod sync;

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
