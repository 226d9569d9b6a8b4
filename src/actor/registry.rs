use kameo::{
    actor::{Actor, ActorId, ActorRef, Spawn, WeakActorRef},
    error::{ActorStopReason, Infallible},
    message::{Context, Message},
};
use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::actor::client::{ClientActor, ClientActorArgs};
use crate::actor::messages::{
    BroadcastToRoom, CreateClient, MemberCount, RequestRoom, RoomBroadcast, RoomMemberCount,
};
use crate::actor::room::{RoomActor, RoomActorArgs};
use crate::store::Store;

/// Root actor: tracks live connections and routes them to rooms.
///
/// Rooms exist implicitly as "the set of client handles that joined them":
/// one is spawned on first join and dies shortly after its last member leaves.
/// All membership mutations flow through actor mailboxes, so concurrent
/// connects and disconnects can never corrupt the maps.
pub struct Registry {
    store: Arc<dyn Store>,
    rooms: HashMap<Arc<str>, ActorRef<RoomActor>>,
    clients: HashMap<ActorId, ActorRef<ClientActor>>,
}

impl Registry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, rooms: HashMap::new(), clients: HashMap::new() }
    }
}

impl Actor for Registry {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(state)
    }

    fn on_link_died(&mut self, _: WeakActorRef<Self>, id: ActorId, _reason: ActorStopReason) -> impl Future<Output = Result<ControlFlow<ActorStopReason>, Self::Error>> + Send {
        let room_id = self.rooms.iter().find(|(_, a)| a.id() == id).map(|(r, _)| Arc::clone(r));
        if let Some(room_id) = room_id {
            self.rooms.remove(&room_id);
        }
        self.clients.remove(&id);
        async { Ok(ControlFlow::Continue(())) }
    }
}

impl Message<CreateClient> for Registry {
    type Reply = ActorRef<ClientActor>;

    async fn handle(&mut self, msg: CreateClient, ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let args = ClientActorArgs { socket: msg.socket, registry: ctx.actor_ref().clone() };
        let client = ClientActor::spawn_link(ctx.actor_ref(), args).await;
        self.clients.insert(client.id(), client.clone());
        client
    }
}

impl Message<RequestRoom> for Registry {
    type Reply = ActorRef<RoomActor>;

    async fn handle(&mut self, RequestRoom(room_id): RequestRoom, ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if let Some(room) = self.rooms.get(&room_id) {
            return room.clone();
        }
        let args = RoomActorArgs { room_id: Arc::clone(&room_id), store: Arc::clone(&self.store) };
        let room = RoomActor::spawn_link(ctx.actor_ref(), args).await;
        self.rooms.insert(room_id, room.clone());
        room
    }
}

impl Message<BroadcastToRoom> for Registry {
    type Reply = bool;

    async fn handle(&mut self, msg: BroadcastToRoom, _: &mut Context<Self, Self::Reply>) -> bool {
        if let Some(room) = self.rooms.get(&msg.room_id) {
            room.tell(RoomBroadcast { event: msg.event, exclude: msg.exclude }).send().await.is_ok()
        } else {
            false
        }
    }
}

impl Message<RoomMemberCount> for Registry {
    type Reply = usize;

    async fn handle(&mut self, RoomMemberCount(room_id): RoomMemberCount, _: &mut Context<Self, Self::Reply>) -> usize {
        if let Some(room) = self.rooms.get(&room_id) {
            room.ask(MemberCount).send().await.unwrap_or(0)
        } else {
            0
        }
    }
}
