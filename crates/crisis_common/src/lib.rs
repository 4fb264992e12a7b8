//! Wire-level types shared by every crisis client crate.
//!
//! The backend speaks JSON both over REST and over the WebSocket. On the
//! socket every text frame is a [`Packet`]: an event name plus an untyped
//! payload. [`ServerEvent`] and [`ClientEvent`] are the closed, typed views of
//! those packets; anything the backend sends that is not in [`EventKind`] is
//! rejected at the boundary instead of leaking loosely shaped data inward.

pub mod codec;
pub mod events;
pub mod model;

pub use events::*;
pub use model::*;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// [`Packet`]s are untyped frames sent over the wire.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// The event name, see [`EventKind::name`]
    pub event: String,
    /// The JSON payload; `null` for events that carry none
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Packet {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

impl Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("event", &self.event)
            .finish()
    }
}
