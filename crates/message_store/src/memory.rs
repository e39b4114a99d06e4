//! In-memory node store

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::ChatSession;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::record::SessionRecord;
use crate::store::NodeStore;

/// In-memory store keyed by session id.
///
/// Each session lives behind its own `Mutex`, which is the per-session
/// mutual-exclusion scope: mutations on one session are linearizable while
/// different sessions proceed in parallel.
#[derive(Default)]
pub struct MemoryNodeStore {
    sessions: DashMap<Uuid, Arc<Mutex<SessionRecord>>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the session's slot without holding the map shard across an
    /// await point.
    fn slot(&self, session_id: Uuid) -> Result<Arc<Mutex<SessionRecord>>> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::SessionNotFound(session_id))
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn create_session(&self, title: Option<String>) -> Result<ChatSession> {
        let session = ChatSession::new(title);
        tracing::debug!(session_id = %session.id, "MemoryNodeStore: creating session");
        self.sessions.insert(
            session.id,
            Arc::new(Mutex::new(SessionRecord::new(session.clone()))),
        );
        Ok(session)
    }

    async fn read_session(&self, session_id: Uuid) -> Result<SessionRecord> {
        let slot = self.slot(session_id)?;
        let record = slot.lock().await;
        Ok(record.clone())
    }

    async fn update_session<T, F>(&self, session_id: Uuid, apply: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionRecord) -> Result<T> + Send + 'static,
    {
        let slot = self.slot(session_id)?;
        let mut record = slot.lock().await;

        // The session may have been deleted while we waited for the lock.
        if !self.sessions.contains_key(&session_id) {
            return Err(StoreError::SessionNotFound(session_id));
        }

        let mut scratch = record.clone();
        let value = apply(&mut scratch)?;
        scratch.session.touch();
        *record = scratch;
        Ok(value)
    }

    async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let slots: Vec<Arc<Mutex<SessionRecord>>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut sessions = Vec::with_capacity(slots.len());
        for slot in slots {
            sessions.push(slot.lock().await.session.clone());
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn locate_node(&self, node_id: Uuid) -> Result<Uuid> {
        let slots: Vec<(Uuid, Arc<Mutex<SessionRecord>>)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (session_id, slot) in slots {
            if slot.lock().await.nodes.contains_key(&node_id) {
                return Ok(session_id);
            }
        }
        Err(StoreError::NodeNotFound(node_id))
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.sessions.remove(&session_id);
        Ok(())
    }
}
