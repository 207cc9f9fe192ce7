//! Boundary to the durable store.
//!
//! The backend owns persistence guarantees and retries; the engine's
//! contract is just "save this committed stroke" and "load this session".
//! Stroke saves are fired and forgotten in the manner of the realtime
//! relay: a failed save is logged, never blocks the canvas.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use board::Page;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;
use wire::{Capabilities, ParticipantRef, StrokeData};

#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// What `load_session` hands back.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub pages: Vec<Page>,
    pub permissions: HashMap<ParticipantRef, Capabilities>,
    pub participants: Vec<ParticipantRef>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_stroke(&self, page_id: Uuid, stroke: &StrokeData) -> Result<(), StoreError>;

    async fn load_session(&self, session_id: &str) -> Result<SessionSnapshot, StoreError>;
}

/// Spawn a fire-and-forget task to persist a committed stroke.
pub(crate) fn persist_fire_and_forget(store: Arc<dyn SessionStore>, page_id: Uuid, stroke: StrokeData) {
    tokio::spawn(async move {
        if let Err(e) = store.save_stroke(page_id, &stroke).await {
            warn!(%page_id, error = %e, "stroke persist failed");
        }
    });
}

/// In-memory store used by tests and headless clients.
#[derive(Default)]
pub struct InMemoryStore {
    strokes: Mutex<HashMap<Uuid, Vec<StrokeData>>>,
    sessions: Mutex<HashMap<String, SessionSnapshot>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a session snapshot for `load_session` to find.
    pub async fn put_session(&self, session_id: impl Into<String>, snapshot: SessionSnapshot) {
        self.sessions.lock().await.insert(session_id.into(), snapshot);
    }

    /// Number of strokes saved against one page.
    pub async fn saved_count(&self, page_id: Uuid) -> usize {
        self.strokes.lock().await.get(&page_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn save_stroke(&self, page_id: Uuid, stroke: &StrokeData) -> Result<(), StoreError> {
        self.strokes.lock().await.entry(page_id).or_default().push(stroke.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<SessionSnapshot, StoreError> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(session_id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wire::StrokeKind;

    fn stroke() -> StrokeData {
        StrokeData {
            id: Uuid::new_v4(),
            kind: StrokeKind::Freehand,
            color: "#000".into(),
            width: 1.0,
            points: Vec::new(),
            text: None,
            font_size: None,
        }
    }

    #[tokio::test]
    async fn save_and_count() {
        let store = InMemoryStore::new();
        let page = Uuid::new_v4();
        store.save_stroke(page, &stroke()).await.unwrap();
        store.save_stroke(page, &stroke()).await.unwrap();
        assert_eq!(store.saved_count(page).await, 2);
        assert_eq!(store.saved_count(Uuid::new_v4()).await, 0);
    }

    #[tokio::test]
    async fn load_missing_session_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(store.load_session("nope").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn load_seeded_session() {
        let store = InMemoryStore::new();
        store
            .put_session("s1", SessionSnapshot { participants: vec![ParticipantRef::student(1)], ..Default::default() })
            .await;
        let snap = store.load_session("s1").await.unwrap();
        assert_eq!(snap.participants.len(), 1);
    }
}
