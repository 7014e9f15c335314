use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::utils::{epoch_millis, random_color};

/// Opaque client identity, supplied by the client or generated on accept.
pub type ClientId = Arc<str>;

/// Opaque room identity, supplied by the client in a `join` message.
pub type RoomId = Arc<str>;

/// Presentational, per-session state mirrored in the welcome message and mutated by
/// `draw` events. `lastActive` is also the field the heartbeat scheduler reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    pub x: i64,
    pub y: i64,
    pub color: String,
    pub last_active: u64,
}

impl ClientState {
    /// A session always starts (or resumes) with fresh presentational state: default
    /// position, a newly-rolled color, and a current `lastActive` — admit() never
    /// carries the displaced session's color or cursor forward.
    pub fn fresh() -> Self {
        Self {
            x: 0,
            y: 0,
            color: random_color(),
            last_active: epoch_millis(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = epoch_millis();
    }
}

/// An arbitrary JSON event with a mandatory `type` field. The server never inspects
/// fields beyond `type`/`roomId`/`x`/`y`/`color` — everything else passes through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event(pub serde_json::Value);

impl Event {
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(|v| v.as_str())
    }
}
