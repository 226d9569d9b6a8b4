//! # Waggle
//!
//! Realtime sync core for a small-team collaborative workspace: a room-scoped
//! connection registry, a chat append-log with live fan-out, a stateless board
//! invalidation relay and ephemeral cursor presence, over one WebSocket per
//! client.
//!
//! Board edits are not merged: a client persists its change against the
//! authoritative store, emits `update_board`, and every other room member
//! re-fetches the whole document. Concurrent writers race and the last write
//! wins, by design.
//!
//! ## Quick Start
//!
//! ```no_run
//! use waggle::{MemoryStore, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::new(MemoryStore::new())
//!         .serve("0.0.0.0:8080")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## With Your Own Store
//!
//! ```no_run
//! use waggle::{async_trait, ChatMessage, ProjectDoc, Server, Store, StoreResult};
//!
//! struct MyStorage;
//!
//! #[async_trait]
//! impl Store for MyStorage {
//!     async fn load_project(&self, project_id: &str) -> StoreResult<Option<ProjectDoc>> {
//!         Ok(None) // Load from your storage
//!     }
//!
//!     async fn replace_project(&self, doc: ProjectDoc) -> StoreResult<()> {
//!         Ok(()) // Replace wholesale, no version check
//!     }
//!
//!     async fn chat_history(&self, room_id: &str) -> StoreResult<Vec<ChatMessage>> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn append_message(&self, room_id: &str, author: &str, text: &str) -> StoreResult<ChatMessage> {
//!         unimplemented!("append to your storage; assign id and timestamp")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::new(MyStorage).serve("0.0.0.0:8080").await.unwrap();
//! }
//! ```
//!
//! ## Composing with Axum
//!
//! ```no_run
//! use waggle::{MemoryStore, Server};
//! use axum::{Router, routing::get};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(MemoryStore::new());
//!     let handle = server.handle();
//!
//!     let app = Router::new()
//!         .merge(server.into_router_at("/collab"))
//!         .route("/health", get(|| async { "ok" }));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Client Side
//!
//! [`Replica`] is the reconciliation layer a client runs per room: feed it the
//! server events in arrival order and it maintains the local board, chat log
//! and cursor map, coalescing redundant re-fetches. [`CursorThrottle`] bounds
//! the rate of outgoing `cursor-move` events.

mod actor;
mod protocol;
mod replica;
mod server;
mod store;

// Public API
pub use protocol::{ClientEvent, CursorState, ServerEvent};
pub use replica::{BoardFetcher, CursorThrottle, Replica};
pub use server::{Handle, Server};
pub use store::{
    ChatMessage, Column, Member, MemoryStore, ProjectDoc, Store, StoreError, StoreResult, Task,
};

pub use async_trait::async_trait;
pub use axum;
pub use kameo::actor::ActorId;
