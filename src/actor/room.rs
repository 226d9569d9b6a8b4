use kameo::{
    actor::{Actor, ActorId, ActorRef, WeakActorRef},
    error::{ActorStopReason, Infallible},
    message::{Context as KameoContext, Message},
};
use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::actor::client::ClientActor;
use crate::actor::messages::{
    BoardChanged, ChatSend, CursorMoved, Depart, IdleShutdown, Join, MemberCount, PushEvent,
    RoomBroadcast,
};
use crate::protocol::ServerEvent;
use crate::store::{ChatMessage, Store};

/// Grace period before an empty room shuts down.
const IDLE_TOLERANCE: Duration = Duration::from_secs(10);

struct RoomMember {
    conn_id: Uuid,
    client: ActorRef<ClientActor>,
}

/// One actor per room: the member set plus the single-writer dispatch path for
/// everything scoped to that room. Chat persistence happens inside this
/// actor's mailbox, so broadcast order always equals persistence order.
pub struct RoomActor {
    room_id: Arc<str>,
    store: Arc<dyn Store>,
    members: HashMap<ActorId, RoomMember>,
}

pub struct RoomActorArgs {
    pub room_id: Arc<str>,
    pub store: Arc<dyn Store>,
}

impl RoomActor {
    fn remove_member(&mut self, client_id: ActorId) -> Option<Uuid> {
        self.members.remove(&client_id).map(|m| m.conn_id)
    }

    /// Best-effort fan-out. Deliveries are awaited in member order so that any
    /// one client sees room events in the order this actor processed them; a
    /// member that died mid-broadcast is simply skipped.
    async fn broadcast(&self, event: &ServerEvent, exclude: Option<ActorId>) {
        for (id, member) in &self.members {
            if exclude.map_or(true, |exc| *id != exc) {
                let _ = member.client.tell(PushEvent(event.clone())).send().await;
            }
        }
    }

    fn schedule_shutdown(actor: ActorRef<Self>) {
        tokio::spawn(async move {
            sleep(IDLE_TOLERANCE).await;
            let _ = actor.tell(IdleShutdown).send().await;
        });
    }
}

impl Actor for RoomActor {
    type Args = RoomActorArgs;
    type Error = Infallible;

    async fn on_start(args: Self::Args, _: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(Self { room_id: args.room_id, store: args.store, members: HashMap::new() })
    }

    fn on_link_died(&mut self, actor_ref: WeakActorRef<Self>, id: ActorId, _: ActorStopReason) -> impl Future<Output = Result<ControlFlow<ActorStopReason>, Self::Error>> + Send {
        let departed = self.remove_member(id);
        let remaining: Vec<ActorRef<ClientActor>> =
            self.members.values().map(|m| m.client.clone()).collect();
        let empty = self.members.is_empty();
        async move {
            if let Some(conn_id) = departed {
                let event = ServerEvent::UserDisconnected { sender_id: conn_id };
                for client in remaining {
                    let _ = client.tell(PushEvent(event.clone())).send().await;
                }
            }
            if empty {
                if let Some(actor) = actor_ref.upgrade() {
                    Self::schedule_shutdown(actor);
                }
            }
            Ok(ControlFlow::Continue(()))
        }
    }
}

impl Message<Join> for RoomActor {
    type Reply = Vec<ChatMessage>;

    async fn handle(&mut self, msg: Join, ctx: &mut KameoContext<Self, Self::Reply>) -> Self::Reply {
        ctx.actor_ref().link(&msg.client).await;
        let client_id = msg.client.id();
        self.members.insert(client_id, RoomMember { conn_id: msg.conn_id, client: msg.client });

        // History replay never fails the join: a store error degrades to an
        // empty list and the client catches up through live broadcasts.
        match self.store.chat_history(&self.room_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!("chat history unavailable for room {}: {}", self.room_id, e);
                Vec::new()
            }
        }
    }
}

impl Message<Depart> for RoomActor {
    type Reply = ();

    async fn handle(&mut self, Depart(client): Depart, ctx: &mut KameoContext<Self, Self::Reply>) {
        ctx.actor_ref().unlink(&client).await;
        if let Some(conn_id) = self.remove_member(client.id()) {
            self.broadcast(&ServerEvent::UserDisconnected { sender_id: conn_id }, None).await;
        }
        if self.members.is_empty() {
            Self::schedule_shutdown(ctx.actor_ref().clone());
        }
    }
}

impl Message<ChatSend> for RoomActor {
    type Reply = ();

    async fn handle(&mut self, msg: ChatSend, _: &mut KameoContext<Self, Self::Reply>) {
        // Persist first; receivers only ever see durable messages. The echo
        // goes to everyone including the author, which is the author's sole
        // confirmation that the message landed.
        match self.store.append_message(&self.room_id, &msg.author, &msg.text).await {
            Ok(message) => {
                self.broadcast(&ServerEvent::ReceiveMessage { message }, None).await;
            }
            Err(e) => {
                warn!("dropping chat message for room {}: {}", self.room_id, e);
            }
        }
    }
}

impl Message<BoardChanged> for RoomActor {
    type Reply = ();

    async fn handle(&mut self, msg: BoardChanged, _: &mut KameoContext<Self, Self::Reply>) {
        let event = ServerEvent::BoardUpdated { room_id: self.room_id.to_string() };
        self.broadcast(&event, Some(msg.sender)).await;
    }
}

impl Message<CursorMoved> for RoomActor {
    type Reply = ();

    async fn handle(&mut self, msg: CursorMoved, _: &mut KameoContext<Self, Self::Reply>) {
        let Some(member) = self.members.get(&msg.sender) else {
            debug!("cursor move from non-member in room {}", self.room_id);
            return;
        };
        let event = ServerEvent::CursorUpdate {
            sender_id: member.conn_id,
            user_name: msg.user_name,
            color: msg.color,
            x: msg.x,
            y: msg.y,
        };
        self.broadcast(&event, Some(msg.sender)).await;
    }
}

impl Message<RoomBroadcast> for RoomActor {
    type Reply = ();

    async fn handle(&mut self, msg: RoomBroadcast, _: &mut KameoContext<Self, Self::Reply>) {
        self.broadcast(&msg.event, msg.exclude).await;
    }
}

impl Message<MemberCount> for RoomActor {
    type Reply = usize;

    async fn handle(&mut self, _: MemberCount, _: &mut KameoContext<Self, Self::Reply>) -> Self::Reply {
        self.members.len()
    }
}

impl Message<IdleShutdown> for RoomActor {
    type Reply = ();

    async fn handle(&mut self, _: IdleShutdown, ctx: &mut KameoContext<Self, Self::Reply>) {
        if self.members.is_empty() {
            ctx.actor_ref().kill();
        }
    }
}
