//! The Session Directory: shared mapping from client id to its single live session,
//! and host of the process-wide Heartbeat Scheduler, since the scheduler's only job
//! is to walk the same session map this actor already owns.

pub mod actor;
pub mod message;

use std::time::Duration;

use actix::{
    Actor, Addr, AsyncContext, Context, Handler, Message, ResponseActFuture, WrapFuture,
};
use ahash::HashMap;

use crate::broadcast::Broadcaster;
use crate::model::{ClientId, ClientState, RoomId};
use crate::room::{AddMember, RemoveMember, RoomRegistry};
use crate::session::actor::Session;
use crate::session::message::{ForceClose, SendPing};
use crate::utils::{epoch_millis, new_fast_hashmap};

/// Process-wide heartbeat cadence.
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Per-connection idle-without-event disconnect timer — reused here as the extra
/// grace period added to the heartbeat interval to get the 40s absolute staleness bound.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 10_000;
const STALE_THRESHOLD_MS: u64 = HEARTBEAT_INTERVAL_MS + HEARTBEAT_TIMEOUT_MS;

/// The Client Session record, canonical copy. Mutated only by the owning
/// Connection Handler's messages (`UpdateDraw`, `TouchActivity`, `SetRoom`) and read by
/// the Heartbeat Scheduler (`state.last_active`, `addr.connected()`).
struct ClientSessionRecord {
    addr: Addr<Session>,
    state: ClientState,
    room_id: Option<RoomId>,
}

pub struct SessionDirectory {
    sessions: HashMap<ClientId, ClientSessionRecord>,
    room_registry: Addr<RoomRegistry>,
    broadcaster: Option<Broadcaster>,
}

impl SessionDirectory {
    pub fn new(room_registry: Addr<RoomRegistry>) -> Self {
        Self {
            sessions: new_fast_hashmap(1 << 10),
            room_registry,
            broadcaster: None,
        }
    }

    fn broadcaster(&self) -> Broadcaster {
        self.broadcaster
            .clone()
            .expect("broadcaster is initialized in started()")
    }

    fn tick_heartbeat(&mut self, ctx: &mut Context<Self>) {
        let now = epoch_millis();
        let mut stale = Vec::new();
        for (client_id, record) in self.sessions.iter() {
            let idle = now.saturating_sub(record.state.last_active);
            if idle > STALE_THRESHOLD_MS {
                stale.push(client_id.clone());
            } else if record.addr.connected() {
                record.addr.do_send(SendPing);
            }
        }
        for client_id in stale {
            log::info!("heartbeat: evicting stale session {client_id}");
            ctx.address().do_send(DropSession { client_id });
        }
    }
}

impl Actor for SessionDirectory {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.broadcaster = Some(Broadcaster::new(self.room_registry.clone(), ctx.address()));
        ctx.run_interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS), |act, ctx| {
            act.tick_heartbeat(ctx);
        });
    }
}

/// Outcome of `admit`: the fresh presentational state for the welcome message, and the
/// room this client resumes into, if any.
pub struct AdmitOutcome {
    pub state: ClientState,
    pub resumed_room: Option<RoomId>,
}

#[derive(Message)]
#[rtype(result = "AdmitOutcome")]
pub struct Admit {
    pub client_id: ClientId,
    pub addr: Addr<Session>,
}

impl Handler<Admit> for SessionDirectory {
    type Result = ResponseActFuture<Self, AdmitOutcome>;

    fn handle(&mut self, msg: Admit, _ctx: &mut Self::Context) -> Self::Result {
        let prior = self.sessions.remove(&msg.client_id);
        if let Some(prior) = &prior {
            // Invariant (5): the prior transport is force-closed before the new one is
            // admitted. No farewell frame is sent (design notes, open question 1).
            prior.addr.do_send(ForceClose);
        }
        let prior_room = prior.and_then(|p| p.room_id);

        let state = ClientState::fresh();
        self.sessions.insert(
            msg.client_id.clone(),
            ClientSessionRecord {
                addr: msg.addr,
                state: state.clone(),
                room_id: prior_room.clone(),
            },
        );

        let room_registry = self.room_registry.clone();
        let broadcaster = self.broadcaster();
        let client_id = msg.client_id;
        let outcome_state = state;

        let fut = async move {
            if let Some(room_id) = prior_room.clone() {
                // Session resumption re-enters the same room the prior session held,
                // so this is always a same-room rejoin: re-affirm membership with a
                // plain add (idempotent if already a member) rather than a
                // remove-then-add, which would tear down and recreate the room (and
                // its history) out from under a sole member.
                room_registry
                    .send(AddMember {
                        room_id: room_id.clone(),
                        client_id: client_id.clone(),
                    })
                    .await
                    .ok();
                broadcaster.send_room_user_count(room_id).await;
            }
            AdmitOutcome {
                state: outcome_state,
                resumed_room: prior_room,
            }
        };

        Box::pin(fut.into_actor(self))
    }
}

#[derive(Message)]
#[rtype(result = "Option<Addr<Session>>")]
pub struct Lookup {
    pub client_id: ClientId,
}

impl Handler<Lookup> for SessionDirectory {
    type Result = Option<Addr<Session>>;
    fn handle(&mut self, msg: Lookup, _: &mut Self::Context) -> Self::Result {
        self.sessions.get(&msg.client_id).map(|r| r.addr.clone())
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct DropSession {
    pub client_id: ClientId,
}

impl Handler<DropSession> for SessionDirectory {
    type Result = ();
    fn handle(&mut self, msg: DropSession, ctx: &mut Self::Context) -> Self::Result {
        let Some(record) = self.sessions.remove(&msg.client_id) else {
            return;
        };
        let Some(room_id) = record.room_id else {
            return;
        };
        let room_registry = self.room_registry.clone();
        let broadcaster = self.broadcaster();
        let client_id = msg.client_id;
        ctx.spawn(
            async move {
                room_registry
                    .send(RemoveMember {
                        room_id: room_id.clone(),
                        client_id,
                    })
                    .await
                    .ok();
                broadcaster.send_room_user_count(room_id).await;
            }
            .into_actor(self),
        );
    }
}

/// Updates the canonical room this client belongs to, kept in lockstep with the Room
/// Registry by the Connection Handler on every `join`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SetRoom {
    pub client_id: ClientId,
    pub room_id: Option<RoomId>,
}

impl Handler<SetRoom> for SessionDirectory {
    type Result = ();
    fn handle(&mut self, msg: SetRoom, _: &mut Self::Context) -> Self::Result {
        if let Some(record) = self.sessions.get_mut(&msg.client_id) {
            record.room_id = msg.room_id;
        }
    }
}

/// Applies a `draw` event's presentational fields and refreshes `lastActive`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateDraw {
    pub client_id: ClientId,
    pub x: i64,
    pub y: i64,
    pub color: Option<String>,
}

impl Handler<UpdateDraw> for SessionDirectory {
    type Result = ();
    fn handle(&mut self, msg: UpdateDraw, _: &mut Self::Context) -> Self::Result {
        if let Some(record) = self.sessions.get_mut(&msg.client_id) {
            record.state.x = msg.x;
            record.state.y = msg.y;
            if let Some(color) = msg.color {
                record.state.color = color;
            }
            record.state.touch();
        }
    }
}

/// Refreshes `lastActive` for any inbound message or pong that isn't a `draw`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct TouchActivity {
    pub client_id: ClientId,
}

impl Handler<TouchActivity> for SessionDirectory {
    type Result = ();
    fn handle(&mut self, msg: TouchActivity, _: &mut Self::Context) -> Self::Result {
        if let Some(record) = self.sessions.get_mut(&msg.client_id) {
            record.state.touch();
        }
    }
}

/// Lifecycle Controller `stop`: force-close every live session and clear the
/// directory. The heartbeat interval is cancelled implicitly when the actor stops.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

impl Handler<Shutdown> for SessionDirectory {
    type Result = ();
    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        log::info!(
            "lifecycle: stopping heartbeat scheduler and closing {} session(s)",
            self.sessions.len()
        );
        for (_, record) in self.sessions.drain() {
            record.addr.do_send(ForceClose);
        }
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomRegistry;
    use actix::Actor;

    #[actix_rt::test]
    async fn drop_of_unknown_client_is_a_no_op() {
        let room_registry = RoomRegistry::new().start();
        let directory = SessionDirectory::new(room_registry).start();
        directory
            .send(DropSession {
                client_id: std::sync::Arc::from("ghost"),
            })
            .await
            .unwrap();
    }
}
