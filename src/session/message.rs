//! Wire-level outbound message shapes and the mailbox messages the per-connection
//! `Session` actor answers to — the concrete realization of the "Transport Adapter"'s
//! send-text/send-ping/force-close operations.

use actix::Message;
use serde::Serialize;

use crate::model::{ClientId, ClientState, Event, RoomId};

/// Every server → client message the spec names explicitly. Relayed events are sent
/// verbatim (the raw `Event` JSON) rather than through this enum — the server never
/// re-wraps another sender's payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutgoingMessage {
    #[serde(rename_all = "camelCase")]
    Welcome {
        client_id: ClientId,
        state: ClientState,
    },
    #[serde(rename_all = "camelCase")]
    RoomHistory {
        room_id: RoomId,
        history: Vec<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    RoomUserCount { room_id: RoomId, count: usize },
    Error { message: String },
}

impl OutgoingMessage {
    pub fn room_history(room_id: RoomId, history: Vec<Event>) -> Self {
        OutgoingMessage::RoomHistory {
            room_id,
            history: history.into_iter().map(|event| event.0).collect(),
        }
    }
}

/// Deliver an already-serialized text frame to this connection. This is the message
/// `sendWithRetry` sends through `Addr<Session>` — its `Request` future is the
/// success/error completion the spec's transport adapter races against a timeout.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver(pub String);

/// Issue a transport-level ping frame (distinct from application messages).
#[derive(Message)]
#[rtype(result = "()")]
pub struct SendPing;

/// Force-close the transport. Sent to a displaced session during `admit` and to
/// every live session during shutdown. No farewell frame is sent first — see the
/// open question decisions in the design notes.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ForceClose;
