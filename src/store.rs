use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Mutex;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;
pub type StoreError = Box<dyn Error + Send + Sync>;

/// One chat message in a room's append-only log.
///
/// Immutable once created. The store assigns `id` and `created_at`; the total
/// order within a room is `created_at` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A role column on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: Uuid,
    pub title: String,
}

/// A team member, assigned to one role column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub column_id: Uuid,
}

/// A sub-task, optionally assigned to a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub member_id: Option<Uuid>,
}

/// The authoritative project document.
///
/// Always read and written wholesale: there is no partial patch and no version
/// check at this boundary. Concurrent writers race and the last write wins;
/// peers converge to the surviving document on their next fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDoc {
    pub id: String,
    pub columns: Vec<Column>,
    pub members: Vec<Member>,
    pub tasks: Vec<Task>,
}

impl ProjectDoc {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), columns: Vec::new(), members: Vec::new(), tasks: Vec::new() }
    }
}

/// The authoritative document store behind the sync core.
///
/// This is the only persistence contract the core depends on. Implementations
/// decide where data lives; the core never retries a failed call.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a project document by id. `None` if the project does not exist.
    async fn load_project(&self, project_id: &str) -> StoreResult<Option<ProjectDoc>>;

    /// Replace a project document wholesale. No version check: last write wins.
    async fn replace_project(&self, doc: ProjectDoc) -> StoreResult<()>;

    /// Full chat history for a room, ordered by `created_at` ascending.
    async fn chat_history(&self, room_id: &str) -> StoreResult<Vec<ChatMessage>>;

    /// Append one message to a room's log. Assigns id and timestamp.
    async fn append_message(&self, room_id: &str, author: &str, text: &str) -> StoreResult<ChatMessage>;
}

/// In-process [`Store`] for tests, examples and single-node deployments.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    projects: HashMap<String, ProjectDoc>,
    chat: HashMap<String, Vec<ChatMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_project(&self, project_id: &str) -> StoreResult<Option<ProjectDoc>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.projects.get(project_id).cloned())
    }

    async fn replace_project(&self, doc: ProjectDoc) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.projects.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn chat_history(&self, room_id: &str) -> StoreResult<Vec<ChatMessage>> {
        let inner = self.inner.lock().unwrap();
        let mut log = inner.chat.get(room_id).cloned().unwrap_or_default();
        log.sort_by_key(|m| m.created_at);
        Ok(log)
    }

    async fn append_message(&self, room_id: &str, author: &str, text: &str) -> StoreResult<ChatMessage> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            room_id: room_id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        let mut inner = self.inner.lock().unwrap();
        inner.chat.entry(room_id.to_string()).or_default().push(message.clone());
        Ok(message)
    }
}
