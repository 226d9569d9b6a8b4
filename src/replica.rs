use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::{CursorState, ServerEvent};
use crate::store::{ChatMessage, ProjectDoc, Store, StoreResult};

/// The read half of the store boundary, as seen from a client.
///
/// Every [`Store`] is a `BoardFetcher`; a remote client would implement this
/// over its HTTP API instead.
#[async_trait]
pub trait BoardFetcher: Send + Sync {
    async fn fetch_board(&self, project_id: &str) -> StoreResult<Option<ProjectDoc>>;
}

#[async_trait]
impl<T: Store + ?Sized> BoardFetcher for T {
    async fn fetch_board(&self, project_id: &str) -> StoreResult<Option<ProjectDoc>> {
        self.load_project(project_id).await
    }
}

/// Client-side reconciliation state for one room.
///
/// Owns the local board document (replaced wholesale on invalidation, never
/// patched), the ordered chat log and the live cursor map. All mutations go
/// through [`apply`](Replica::apply) on a single consumer, in strict arrival
/// order; no locking is involved.
///
/// A replica starts stale: drive it with [`run`](Replica::run) *after* wiring
/// the event channel to the transport, so an invalidation arriving during the
/// initial fetch is never lost.
pub struct Replica {
    room_id: String,
    fetcher: Arc<dyn BoardFetcher>,
    board: Option<ProjectDoc>,
    chat_log: Vec<ChatMessage>,
    cursors: HashMap<Uuid, CursorState>,
    board_stale: bool,
}

impl Replica {
    pub fn new(room_id: impl Into<String>, fetcher: Arc<dyn BoardFetcher>) -> Self {
        Self {
            room_id: room_id.into(),
            fetcher,
            board: None,
            chat_log: Vec::new(),
            cursors: HashMap::new(),
            board_stale: true,
        }
    }

    pub fn board(&self) -> Option<&ProjectDoc> {
        self.board.as_ref()
    }

    pub fn chat_log(&self) -> &[ChatMessage] {
        &self.chat_log
    }

    pub fn cursors(&self) -> &HashMap<Uuid, CursorState> {
        &self.cursors
    }

    /// Apply one server event. Synchronous: only marks the board stale, the
    /// actual re-fetch happens in [`sync_if_stale`](Replica::sync_if_stale).
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::LoadMessages { room_id, messages } => {
                if *room_id == self.room_id {
                    self.chat_log = messages.clone();
                }
            }
            ServerEvent::ReceiveMessage { message } => {
                if message.room_id == self.room_id {
                    self.chat_log.push(message.clone());
                }
            }
            ServerEvent::BoardUpdated { room_id } => {
                if *room_id == self.room_id {
                    self.board_stale = true;
                }
            }
            ServerEvent::CursorUpdate { sender_id, user_name, color, x, y } => {
                let state = CursorState {
                    sender_id: *sender_id,
                    display_name: user_name.clone(),
                    x: *x,
                    y: *y,
                    color: color.clone(),
                };
                self.cursors.insert(*sender_id, state);
            }
            ServerEvent::UserDisconnected { sender_id } => {
                self.cursors.remove(sender_id);
            }
        }
    }

    /// Re-fetch the authoritative document if an invalidation was seen.
    ///
    /// A failed fetch keeps the previous board and clears the stale flag: the
    /// replica degrades to "stale until the next signal" rather than retrying.
    pub async fn sync_if_stale(&mut self) {
        if !self.board_stale {
            return;
        }
        self.board_stale = false;
        match self.fetcher.fetch_board(&self.room_id).await {
            Ok(doc) => self.board = doc,
            Err(e) => warn!("board fetch failed for room {}: {}", self.room_id, e),
        }
    }

    /// Consume events until the channel closes.
    ///
    /// Performs the initial fetch first (the channel already exists, so
    /// nothing can be lost in the gap), then processes events in arrival
    /// order. Bursts of queued events are drained before fetching, so N rapid
    /// invalidations fold into a single re-fetch.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<ServerEvent>) {
        self.sync_if_stale().await;
        while let Some(event) = events.recv().await {
            self.apply(&event);
            while let Ok(event) = events.try_recv() {
                self.apply(&event);
            }
            self.sync_if_stale().await;
        }
    }
}

/// Sender-side throttle for cursor emissions.
///
/// Mouse-move events fire far faster than peers need to see them; this bounds
/// fan-out to one emission per interval, coalescing intermediate positions
/// (last one wins).
pub struct CursorThrottle {
    min_interval: Duration,
    last_sent: Option<Instant>,
    pending: Option<(f64, f64)>,
}

impl CursorThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_sent: None, pending: None }
    }

    /// Offer a position. Returns it if it should be sent now, otherwise
    /// stores it as pending.
    pub fn offer(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.offer_at(x, y, Instant::now())
    }

    /// Take the pending position if the interval has elapsed. Call this
    /// periodically so the final position of a gesture is not swallowed.
    pub fn flush(&mut self) -> Option<(f64, f64)> {
        self.flush_at(Instant::now())
    }

    pub fn offer_at(&mut self, x: f64, y: f64, now: Instant) -> Option<(f64, f64)> {
        if self.due(now) {
            self.last_sent = Some(now);
            self.pending = None;
            Some((x, y))
        } else {
            self.pending = Some((x, y));
            None
        }
    }

    pub fn flush_at(&mut self, now: Instant) -> Option<(f64, f64)> {
        if self.pending.is_some() && self.due(now) {
            self.last_sent = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.last_sent.map_or(true, |last| now.duration_since(last) >= self.min_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Column, StoreError};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockFetcher {
        doc: Mutex<Option<ProjectDoc>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn serving(doc: ProjectDoc) -> Arc<Self> {
            Arc::new(Self { doc: Mutex::new(Some(doc)), calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BoardFetcher for MockFetcher {
        async fn fetch_board(&self, _: &str) -> StoreResult<Option<ProjectDoc>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.doc.lock().unwrap().clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl BoardFetcher for FailingFetcher {
        async fn fetch_board(&self, _: &str) -> StoreResult<Option<ProjectDoc>> {
            Err(StoreError::from("store unreachable"))
        }
    }

    fn doc_with_column(title: &str) -> ProjectDoc {
        let mut doc = ProjectDoc::new("p1");
        doc.columns.push(Column { id: Uuid::new_v4(), title: title.into() });
        doc
    }

    fn chat(room: &str, text: &str) -> ServerEvent {
        ServerEvent::ReceiveMessage {
            message: ChatMessage {
                id: Uuid::new_v4(),
                room_id: room.into(),
                author: "alice".into(),
                text: text.into(),
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn burst_of_invalidations_folds_into_one_fetch() {
        let fetcher = MockFetcher::serving(doc_with_column("Backend"));
        let mut replica = Replica::new("p1", fetcher.clone());

        let (tx, mut rx) = mpsc::channel(16);
        for _ in 0..5 {
            tx.send(ServerEvent::BoardUpdated { room_id: "p1".into() }).await.unwrap();
        }
        drop(tx);
        replica.run(&mut rx).await;

        // One initial fetch plus one for the drained burst.
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(replica.board().unwrap().columns[0].title, "Backend");
    }

    #[tokio::test]
    async fn board_is_replaced_wholesale_on_invalidation() {
        let fetcher = MockFetcher::serving(doc_with_column("Backend"));
        let mut replica = Replica::new("p1", fetcher.clone());
        replica.sync_if_stale().await;
        assert_eq!(replica.board().unwrap().columns[0].title, "Backend");

        *fetcher.doc.lock().unwrap() = Some(doc_with_column("Frontend"));
        replica.apply(&ServerEvent::BoardUpdated { room_id: "p1".into() });
        replica.sync_if_stale().await;
        assert_eq!(replica.board().unwrap().columns[0].title, "Frontend");
    }

    #[tokio::test]
    async fn events_for_other_rooms_are_ignored() {
        let fetcher = MockFetcher::serving(doc_with_column("Backend"));
        let mut replica = Replica::new("p1", fetcher.clone());
        replica.sync_if_stale().await;
        let before = fetcher.calls();

        replica.apply(&ServerEvent::BoardUpdated { room_id: "p2".into() });
        replica.sync_if_stale().await;
        assert_eq!(fetcher.calls(), before);

        replica.apply(&chat("p2", "not for us"));
        assert!(replica.chat_log().is_empty());
    }

    #[tokio::test]
    async fn chat_log_preserves_arrival_order() {
        let fetcher = MockFetcher::serving(ProjectDoc::new("p1"));
        let mut replica = Replica::new("p1", fetcher);

        replica.apply(&chat("p1", "one"));
        replica.apply(&chat("p1", "two"));
        replica.apply(&chat("p1", "three"));

        let texts: Vec<_> = replica.chat_log().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn cursor_map_upserts_then_evicts_on_disconnect() {
        let fetcher = MockFetcher::serving(ProjectDoc::new("p1"));
        let mut replica = Replica::new("p1", fetcher);
        let sender = Uuid::new_v4();

        for (x, y) in [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)] {
            replica.apply(&ServerEvent::CursorUpdate {
                sender_id: sender,
                user_name: "alice".into(),
                color: "#f00".into(),
                x,
                y,
            });
        }
        assert_eq!(replica.cursors().len(), 1);
        assert_eq!(replica.cursors()[&sender].x, 3.0);

        replica.apply(&ServerEvent::UserDisconnected { sender_id: sender });
        assert!(replica.cursors().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_board_without_retry() {
        let mut replica = Replica::new("p1", Arc::new(FailingFetcher));
        replica.sync_if_stale().await;
        assert!(replica.board().is_none());

        // Stale flag was cleared: no fetch loop until the next signal.
        replica.sync_if_stale().await;
        assert!(replica.board().is_none());
    }

    #[test]
    fn throttle_coalesces_to_the_last_position() {
        let start = Instant::now();
        let mut throttle = CursorThrottle::new(Duration::from_millis(50));

        assert_eq!(throttle.offer_at(1.0, 1.0, start), Some((1.0, 1.0)));
        assert_eq!(throttle.offer_at(2.0, 2.0, start + Duration::from_millis(10)), None);
        assert_eq!(throttle.offer_at(3.0, 3.0, start + Duration::from_millis(20)), None);

        // Nothing due before the interval elapses.
        assert_eq!(throttle.flush_at(start + Duration::from_millis(30)), None);
        assert_eq!(throttle.flush_at(start + Duration::from_millis(60)), Some((3.0, 3.0)));
        assert_eq!(throttle.flush_at(start + Duration::from_millis(70)), None);
    }
}
