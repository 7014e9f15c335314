//! The Broadcaster: fan-out with per-recipient timeout-and-retry.
//!
//! Holds addresses to both process-wide registries but never holds either actor's
//! internal lock while a send is in flight — the registries are only ever consulted via
//! `send()` round-trips that return owned snapshots, and the actual delivery attempt
//! (`Addr<Session>::send`) happens after those round-trips complete.

use std::time::Duration;

use actix::Addr;

use crate::model::{ClientId, Event, RoomId};
use crate::room::{HistoryOf, MembersOf, RoomRegistry, RoomsOf, UserCount};
use crate::session::message::{Deliver, OutgoingMessage};
use crate::session::{Lookup, SessionDirectory};

const SEND_TIMEOUT: Duration = Duration::from_millis(5_000);
const RETRY_DELAY: Duration = Duration::from_millis(1_000);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct Broadcaster {
    rooms: Addr<RoomRegistry>,
    sessions: Addr<SessionDirectory>,
}

impl Broadcaster {
    pub fn new(rooms: Addr<RoomRegistry>, sessions: Addr<SessionDirectory>) -> Self {
        Self { rooms, sessions }
    }

    /// Fan out `event` from `sender_id` to every other member of every room the sender
    /// currently belongs to.
    pub async fn broadcast(&self, sender_id: ClientId, event: Event) {
        let rooms = match self.rooms.send(RoomsOf { client_id: sender_id.clone() }).await {
            Ok(rooms) => rooms,
            Err(err) => {
                log::error!("broadcast: room registry unreachable: {err}");
                return;
            }
        };
        if rooms.is_empty() {
            log::debug!("broadcast from {sender_id}: sender is in no room, dropped");
            return;
        }

        let payload = match serde_json::to_string(&event.0) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("broadcast: failed to serialize event: {err}");
                return;
            }
        };

        for room_id in rooms {
            self.deliver_to_room_except(room_id, &payload, Some(&sender_id)).await;
        }
    }

    /// Send `{ type: "roomUserCount", roomId, count }` to every current member.
    pub async fn send_room_user_count(&self, room_id: RoomId) {
        let count = match self.rooms.send(UserCount { room_id: room_id.clone() }).await {
            Ok(count) => count,
            Err(err) => {
                log::error!("roomUserCount: room registry unreachable: {err}");
                return;
            }
        };
        let message = OutgoingMessage::RoomUserCount { room_id: room_id.clone(), count };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("roomUserCount: failed to serialize: {err}");
                return;
            }
        };
        self.deliver_to_room_except(room_id, &payload, None).await;
    }

    /// Send `{ type: "roomHistory", roomId, history }` to a single joiner.
    pub async fn send_room_history(&self, client_id: ClientId, room_id: RoomId) {
        let history = match self.rooms.send(HistoryOf { room_id: room_id.clone() }).await {
            Ok(history) => history,
            Err(err) => {
                log::error!("roomHistory: room registry unreachable: {err}");
                return;
            }
        };
        let message = OutgoingMessage::room_history(room_id, history);
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("roomHistory: failed to serialize: {err}");
                return;
            }
        };
        self.send_with_retry(client_id, payload).await;
    }

    async fn deliver_to_room_except(&self, room_id: RoomId, payload: &str, except: Option<&ClientId>) {
        let members = match self.rooms.send(MembersOf { room_id }).await {
            Ok(members) => members,
            Err(err) => {
                log::error!("fan-out: room registry unreachable: {err}");
                return;
            }
        };
        let sends = members
            .into_iter()
            .filter(|member| except.map_or(true, |sender| member != sender))
            .map(|member| self.send_with_retry(member, payload.to_string()));
        futures::future::join_all(sends).await;
    }

    /// `sendWithRetry`: up to 3 passes, each racing the send against a 5s
    /// timeout, with a 1s delay between passes. Never aborts fan-out to other
    /// recipients; a failure here is logged and otherwise swallowed.
    async fn send_with_retry(&self, target: ClientId, payload: String) -> bool {
        let Some(addr) = self.resolve(&target).await else {
            log::debug!("sendWithRetry: no live session for {target}");
            return false;
        };

        for attempt in 1..=MAX_ATTEMPTS {
            if !addr.connected() {
                return false;
            }
            let send = addr.send(Deliver(payload.clone()));
            match tokio::time::timeout(SEND_TIMEOUT, send).await {
                Ok(Ok(())) => return true,
                Ok(Err(err)) => {
                    log::warn!("sendWithRetry: send to {target} failed on attempt {attempt}: {err}");
                }
                Err(_) => {
                    log::warn!("sendWithRetry: send to {target} timed out on attempt {attempt}");
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
        false
    }

    async fn resolve(&self, client_id: &ClientId) -> Option<Addr<crate::session::actor::Session>> {
        self.sessions
            .send(Lookup { client_id: client_id.clone() })
            .await
            .ok()
            .flatten()
    }
}
