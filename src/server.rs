use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};
use kameo::actor::{ActorId, ActorRef, Spawn};
use std::io;
use std::sync::Arc;

use crate::actor::{BroadcastToRoom, CreateClient, Registry, RoomMemberCount};
use crate::protocol::ServerEvent;
use crate::store::Store;

/// Waggle sync server
///
/// # Flexible mounting
/// ```no_run
/// use waggle::{MemoryStore, Server};
/// use axum::Router;
///
/// // Option 1: Default router with /ws
/// let app = Server::new(MemoryStore::new()).into_router();
///
/// // Option 2: Custom path
/// let app = Server::new(MemoryStore::new()).into_router_at("/sync/ws");
///
/// // Option 3: Compose with other routes
/// let server = Server::new(MemoryStore::new());
/// let handle = server.handle();
/// let app = Router::new()
///     .merge(server.into_router_at("/collab"))
///     .route("/api/peers/{room}", axum::routing::get(move |path: axum::extract::Path<String>| {
///         let h = handle.clone();
///         async move { h.member_count(&path).await.to_string() }
///     }));
/// ```
#[derive(Clone)]
pub struct Server {
    registry: ActorRef<Registry>,
}

/// Handle for interacting with the server from HTTP handlers
#[derive(Clone)]
pub struct Handle {
    registry: ActorRef<Registry>,
}

impl Handle {
    /// Broadcast an event to every member of a room, optionally excluding one
    /// connection. Returns false if the room is not active.
    ///
    /// Use this when a mutation comes in through an HTTP route instead of the
    /// socket, e.g. to emit `board_updated` after a REST write.
    pub async fn broadcast(&self, room_id: &str, event: ServerEvent, exclude: Option<ActorId>) -> bool {
        let room_id: Arc<str> = room_id.into();
        self.registry.ask(BroadcastToRoom { room_id, event, exclude }).send().await.unwrap_or(false)
    }

    /// Emit a board invalidation pulse to every member of a room.
    pub async fn board_updated(&self, room_id: &str) -> bool {
        let event = ServerEvent::BoardUpdated { room_id: room_id.to_string() };
        self.broadcast(room_id, event, None).await
    }

    /// Get the number of connections currently joined to a room.
    pub async fn member_count(&self, room_id: &str) -> usize {
        let room_id: Arc<str> = room_id.into();
        self.registry.ask(RoomMemberCount(room_id)).send().await.unwrap_or(0)
    }
}

impl Server {
    /// Create a server backed by the given document store.
    pub fn new(store: impl Store + 'static) -> Self {
        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let registry = Registry::spawn(Registry::new(store));
        Self { registry }
    }

    /// Get a handle for use in other HTTP handlers
    pub fn handle(&self) -> Handle {
        Handle { registry: self.registry.clone() }
    }

    /// Get router with WebSocket endpoint at `/ws`
    pub fn into_router(self) -> Router {
        self.into_router_at("/ws")
    }

    /// Get router with WebSocket endpoint at a custom path
    pub fn into_router_at(self, path: &str) -> Router {
        Router::new()
            .route(path, get(ws_handler))
            .with_state(self.registry)
    }

    /// Start the server on the given address with default `/ws` path
    pub async fn serve(self, addr: &str) -> io::Result<()> {
        let app = self.into_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(registry): State<ActorRef<Registry>>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let _ = registry.ask(CreateClient { socket }).send().await;
    })
}
