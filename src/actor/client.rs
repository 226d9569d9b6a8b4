use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use kameo::{
    actor::{Actor, ActorId, ActorRef, WeakActorRef},
    error::{ActorStopReason, Infallible},
    message::{Context as KameoContext, Message, StreamMessage},
};
use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::actor::messages::{BoardChanged, ChatSend, CursorMoved, Depart, Join, PushEvent, RequestRoom};
use crate::actor::registry::Registry;
use crate::actor::room::RoomActor;
use crate::protocol::{ClientEvent, ServerEvent};

pub struct ClientActorArgs {
    pub socket: WebSocket,
    pub registry: ActorRef<Registry>,
}

/// One actor per connection: the server-side client handle.
///
/// Holds the socket sink and the set of rooms this connection has joined.
/// Created on connect, destroyed on disconnect; a reconnect always gets a
/// fresh handle and a fresh `conn_id`.
pub struct ClientActor {
    sink: SplitSink<WebSocket, WsMessage>,
    conn_id: Uuid,
    rooms: HashMap<Arc<str>, ActorRef<RoomActor>>,
    registry: ActorRef<Registry>,
}

impl Actor for ClientActor {
    type Args = ClientActorArgs;
    type Error = Infallible;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        let (sink, stream) = args.socket.split();
        actor_ref.attach_stream(stream, (), "ws");
        Ok(Self {
            sink,
            conn_id: Uuid::new_v4(),
            rooms: HashMap::new(),
            registry: args.registry,
        })
    }

    fn on_link_died(&mut self, _: WeakActorRef<Self>, id: ActorId, _: ActorStopReason) -> impl Future<Output = Result<ControlFlow<ActorStopReason>, Self::Error>> + Send {
        self.rooms.retain(|_, room| room.id() != id);
        async { Ok(ControlFlow::Continue(())) }
    }
}

impl Message<StreamMessage<Result<WsMessage, axum::Error>, (), &'static str>> for ClientActor {
    type Reply = ();

    async fn handle(&mut self, msg: StreamMessage<Result<WsMessage, axum::Error>, (), &'static str>, ctx: &mut KameoContext<Self, Self::Reply>) {
        match msg {
            StreamMessage::Next(Ok(WsMessage::Text(text))) => {
                // A frame that doesn't parse is dropped; the connection stays up.
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => self.handle_event(event, ctx.actor_ref()).await,
                    Err(e) => debug!("dropping malformed event from {}: {}", self.conn_id, e),
                }
            }
            StreamMessage::Next(Ok(WsMessage::Ping(data))) => {
                if self.sink.send(WsMessage::Pong(data)).await.is_err() {
                    ctx.actor_ref().kill();
                }
            }
            StreamMessage::Next(Ok(WsMessage::Close(_))) | StreamMessage::Finished(_) => {
                for (_, room) in self.rooms.drain() {
                    let _ = room.tell(Depart(ctx.actor_ref().clone())).send().await;
                }
                ctx.actor_ref().kill();
            }
            StreamMessage::Next(Err(_)) => ctx.actor_ref().kill(),
            _ => {}
        }
    }
}

impl Message<PushEvent> for ClientActor {
    type Reply = ();

    async fn handle(&mut self, PushEvent(event): PushEvent, ctx: &mut KameoContext<Self, Self::Reply>) {
        self.send_event(&event, ctx.actor_ref()).await;
    }
}

impl ClientActor {
    async fn send_event(&mut self, event: &ServerEvent, me: &ActorRef<Self>) {
        let Ok(json) = serde_json::to_string(event) else { return };
        if self.sink.send(WsMessage::Text(json.into())).await.is_err() {
            me.kill();
        }
    }

    async fn handle_event(&mut self, event: ClientEvent, me: &ActorRef<Self>) {
        match event {
            ClientEvent::JoinRoom { room_id } => self.join_room(room_id.into(), me).await,
            ClientEvent::SendMessage { room_id, author, text } => {
                let Some(room) = self.rooms.get(room_id.as_str()) else {
                    debug!("send_message for unjoined room {} from {}", room_id, self.conn_id);
                    return;
                };
                let _ = room.tell(ChatSend { author, text }).send().await;
            }
            ClientEvent::UpdateBoard { room_id } => {
                let Some(room) = self.rooms.get(room_id.as_str()) else {
                    debug!("update_board for unjoined room {} from {}", room_id, self.conn_id);
                    return;
                };
                let _ = room.tell(BoardChanged { sender: me.id() }).send().await;
            }
            ClientEvent::CursorMove { x, y, user_name, color } => {
                // Scoped to the sender's rooms, mirroring the board relay.
                for room in self.rooms.values() {
                    let moved = CursorMoved {
                        sender: me.id(),
                        x,
                        y,
                        user_name: user_name.clone(),
                        color: color.clone(),
                    };
                    let _ = room.tell(moved).send().await;
                }
            }
        }
    }

    async fn join_room(&mut self, room_id: Arc<str>, me: &ActorRef<Self>) {
        if self.rooms.contains_key(&room_id) {
            debug!("{} already joined room {}", self.conn_id, room_id);
            return;
        }
        let Ok(room) = self.registry.ask(RequestRoom(Arc::clone(&room_id))).send().await else {
            return;
        };
        let join = Join { client: me.clone(), conn_id: self.conn_id };
        let Ok(history) = room.ask(join).send().await else { return };

        // History goes to the joiner only, never broadcast.
        let event = ServerEvent::LoadMessages { room_id: room_id.to_string(), messages: history };
        self.send_event(&event, me).await;
        self.rooms.insert(room_id, room);
    }
}
