use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;
use actix_web_actors::ws::{self, ProtocolError, WebsocketContext};

use crate::broadcast::Broadcaster;
use crate::model::{ClientId, Event, RoomId};
use crate::room::{AddMember, AppendHistory, RemoveMember, RoomRegistry};
use crate::session::message::{Deliver, ForceClose, OutgoingMessage, SendPing};
use crate::session::{Admit, DropSession, SessionDirectory, SetRoom, TouchActivity, UpdateDraw};

/// Per-connection idle-without-event disconnect timer: cancelled and
/// re-armed on every inbound frame and pong.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The Connection Handler: one actor per upgraded WebSocket connection.
/// Accepted/Joined/Closed map onto `room_id` being `None`/`Some`/the actor having
/// stopped — there's no explicit state enum, actix's actor lifecycle gives us "Closed"
/// for free, and `room_id` already distinguishes the other two.
pub struct Session {
    client_id: ClientId,
    room_id: Option<RoomId>,
    disconnect_timer: Option<SpawnHandle>,
    session_directory: Addr<SessionDirectory>,
    room_registry: Addr<RoomRegistry>,
    broadcaster: Broadcaster,
}

impl Session {
    pub fn new(
        client_id: ClientId,
        session_directory: Addr<SessionDirectory>,
        room_registry: Addr<RoomRegistry>,
    ) -> Self {
        let broadcaster = Broadcaster::new(room_registry.clone(), session_directory.clone());
        Self {
            client_id,
            room_id: None,
            disconnect_timer: None,
            session_directory,
            room_registry,
            broadcaster,
        }
    }

    fn cancel_disconnect_timer(&mut self, ctx: &mut WebsocketContext<Self>) {
        if let Some(handle) = self.disconnect_timer.take() {
            ctx.cancel_future(handle);
        }
    }

    fn arm_disconnect_timer(&mut self, ctx: &mut WebsocketContext<Self>) {
        self.cancel_disconnect_timer(ctx);
        self.disconnect_timer = Some(ctx.run_later(DISCONNECT_TIMEOUT, |act, ctx| {
            log::info!("client {}: idle past disconnect timeout, closing", act.client_id);
            ctx.stop();
        }));
    }

    fn send_error(&self, ctx: &mut WebsocketContext<Self>, message: &str) {
        let frame = OutgoingMessage::Error {
            message: message.to_string(),
        };
        if let Ok(payload) = serde_json::to_string(&frame) {
            ctx.text(payload);
        }
    }

    fn handle_text(&mut self, text: &str, ctx: &mut WebsocketContext<Self>) {
        self.cancel_disconnect_timer(ctx);
        let parsed = serde_json::from_str::<serde_json::Value>(text).ok().filter(|value| {
            value.is_object() && value.get("type").and_then(|v| v.as_str()).is_some()
        });
        match parsed {
            Some(value) => self.handle_event(value, ctx),
            None => {
                log::warn!("client {}: invalid JSON frame", self.client_id);
                self.send_error(ctx, "Invalid JSON");
            }
        }
        self.arm_disconnect_timer(ctx);
    }

    fn handle_event(&mut self, value: serde_json::Value, ctx: &mut WebsocketContext<Self>) {
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .expect("caller already validated a string `type` field")
            .to_string();

        if kind == "join" {
            self.handle_join(value, ctx);
            return;
        }

        if self.room_id.is_none() {
            log::debug!(
                "client {}: dropping {kind} event, not a member of any room",
                self.client_id
            );
            return;
        }

        if kind == "draw" {
            self.apply_draw(&value);
        } else {
            self.session_directory.do_send(TouchActivity {
                client_id: self.client_id.clone(),
            });
        }

        self.archive_and_relay(Event(value), ctx);
    }

    fn handle_join(&mut self, value: serde_json::Value, ctx: &mut WebsocketContext<Self>) {
        let Some(room_id) = value.get("roomId").and_then(|v| v.as_str()) else {
            log::warn!("client {}: join missing roomId", self.client_id);
            return;
        };
        let room_id: RoomId = Arc::from(room_id);
        // Re-joining the same room is a membership no-op but still resends history and
        // the user count. Skip the remove/add round trip entirely in that case: a
        // remove on a sole member would tear the room (and its history) down just to
        // have the following add recreate it empty.
        let previous_room = self.room_id.replace(room_id.clone());
        let rejoining_same_room = previous_room.as_ref() == Some(&room_id);

        self.session_directory.do_send(TouchActivity {
            client_id: self.client_id.clone(),
        });
        self.session_directory.do_send(SetRoom {
            client_id: self.client_id.clone(),
            room_id: Some(room_id.clone()),
        });

        let room_registry = self.room_registry.clone();
        let broadcaster = self.broadcaster.clone();
        let client_id = self.client_id.clone();

        ctx.spawn(
            async move {
                if !rejoining_same_room {
                    if let Some(prev) = previous_room {
                        room_registry
                            .send(RemoveMember {
                                room_id: prev,
                                client_id: client_id.clone(),
                            })
                            .await
                            .ok();
                    }
                    room_registry
                        .send(AddMember {
                            room_id: room_id.clone(),
                            client_id: client_id.clone(),
                        })
                        .await
                        .ok();
                }
                broadcaster
                    .send_room_history(client_id.clone(), room_id.clone())
                    .await;
                broadcaster.send_room_user_count(room_id).await;
            }
            .into_actor(self),
        );
    }

    fn apply_draw(&mut self, value: &serde_json::Value) {
        let x = value.get("x").and_then(|v| v.as_i64()).unwrap_or(0);
        let y = value.get("y").and_then(|v| v.as_i64()).unwrap_or(0);
        let color = value
            .get("color")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        self.session_directory.do_send(UpdateDraw {
            client_id: self.client_id.clone(),
            x,
            y,
            color,
        });
    }

    fn archive_and_relay(&mut self, event: Event, ctx: &mut WebsocketContext<Self>) {
        let Some(room_id) = self.room_id.clone() else {
            return;
        };
        let room_registry = self.room_registry.clone();
        let broadcaster = self.broadcaster.clone();
        let client_id = self.client_id.clone();
        ctx.spawn(
            async move {
                room_registry
                    .send(AppendHistory {
                        room_id,
                        event: event.clone(),
                    })
                    .await
                    .ok();
                broadcaster.broadcast(client_id, event).await;
            }
            .into_actor(self),
        );
    }
}

impl Actor for Session {
    type Context = WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.arm_disconnect_timer(ctx);

        let admit = self.session_directory.send(Admit {
            client_id: self.client_id.clone(),
            addr: ctx.address(),
        });

        admit
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(outcome) => {
                        act.room_id = outcome.resumed_room;
                        let welcome = OutgoingMessage::Welcome {
                            client_id: act.client_id.clone(),
                            state: outcome.state,
                        };
                        if let Ok(payload) = serde_json::to_string(&welcome) {
                            ctx.text(payload);
                        }
                    }
                    Err(err) => {
                        log::error!("admit failed for {}: {err}", act.client_id);
                        ctx.stop();
                    }
                }
                actix::fut::ready(())
            })
            .wait(ctx);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.cancel_disconnect_timer(ctx);
        self.session_directory.do_send(DropSession {
            client_id: self.client_id.clone(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ProtocolError>> for Session {
    fn handle(&mut self, item: Result<ws::Message, ProtocolError>, ctx: &mut Self::Context) {
        match item {
            Ok(ws::Message::Text(text)) => self.handle_text(&text, ctx),
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Pong(_)) => {
                self.cancel_disconnect_timer(ctx);
                self.session_directory.do_send(TouchActivity {
                    client_id: self.client_id.clone(),
                });
                self.arm_disconnect_timer(ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(err) => {
                log::error!("client {}: transport error: {err}", self.client_id);
                ctx.stop();
            }
        }
    }
}

impl Handler<Deliver> for Session {
    type Result = ();
    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

impl Handler<SendPing> for Session {
    type Result = ();
    fn handle(&mut self, _: SendPing, ctx: &mut Self::Context) -> Self::Result {
        ctx.ping(b"");
    }
}

impl Handler<ForceClose> for Session {
    type Result = ();
    fn handle(&mut self, _: ForceClose, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
