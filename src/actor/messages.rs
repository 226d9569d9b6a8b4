use axum::extract::ws::WebSocket;
use kameo::actor::{ActorId, ActorRef};
use std::sync::Arc;
use uuid::Uuid;

use crate::actor::client::ClientActor;
use crate::protocol::ServerEvent;

pub struct CreateClient {
    pub socket: WebSocket,
}

pub struct RequestRoom(pub Arc<str>);

/// Add a client to a room's member set. Replies with the room's chat history.
pub struct Join {
    pub client: ActorRef<ClientActor>,
    pub conn_id: Uuid,
}

/// Explicit leave or socket close. Always succeeds.
pub struct Depart(pub ActorRef<ClientActor>);

pub struct ChatSend {
    pub author: String,
    pub text: String,
}

pub struct BoardChanged {
    pub sender: ActorId,
}

pub struct CursorMoved {
    pub sender: ActorId,
    pub x: f64,
    pub y: f64,
    pub user_name: String,
    pub color: String,
}

/// Push one event down a client's socket.
pub struct PushEvent(pub ServerEvent);

/// Fan an event out to a room's members, optionally excluding one.
pub struct RoomBroadcast {
    pub event: ServerEvent,
    pub exclude: Option<ActorId>,
}

pub struct BroadcastToRoom {
    pub room_id: Arc<str>,
    pub event: ServerEvent,
    pub exclude: Option<ActorId>,
}

pub struct MemberCount;

pub struct RoomMemberCount(pub Arc<str>);

pub struct IdleShutdown;
