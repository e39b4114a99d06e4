//! File-backed node store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::ChatSession;
use dashmap::DashMap;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::record::SessionRecord;
use crate::store::NodeStore;

/// Stores each session's record as one JSON file under a base directory.
///
/// Writers are serialized through an in-process per-session lock table, so
/// the load-apply-store cycle of `update_session` is atomic with respect to
/// other calls on the same store.
#[derive(Clone)]
pub struct FileNodeStore {
    base_path: PathBuf,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl FileNodeStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            locks: Arc::new(DashMap::new()),
        }
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", session_id))
    }

    fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_record(&self, session_id: Uuid) -> Result<SessionRecord> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Err(StoreError::SessionNotFound(session_id));
        }
        let contents = fs::read_to_string(&path).await?;
        let record: SessionRecord = serde_json::from_str(&contents)?;
        Ok(record)
    }

    async fn store_record(&self, record: &SessionRecord) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        let path = self.session_path(record.session.id);
        let contents = serde_json::to_string_pretty(record)?;
        fs::write(&path, contents).await?;
        Ok(())
    }

    /// Session ids present on disk, in directory order.
    async fn session_ids(&self) -> Result<Vec<Uuid>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if let Ok(id) = Uuid::parse_str(stem) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl NodeStore for FileNodeStore {
    async fn create_session(&self, title: Option<String>) -> Result<ChatSession> {
        let session = ChatSession::new(title);
        tracing::debug!(session_id = %session.id, path = %self.base_path.display(), "FileNodeStore: creating session");
        let record = SessionRecord::new(session.clone());
        let lock = self.lock_for(session.id);
        let _held = lock.lock().await;
        self.store_record(&record).await?;
        Ok(session)
    }

    async fn read_session(&self, session_id: Uuid) -> Result<SessionRecord> {
        let lock = self.lock_for(session_id);
        let _held = lock.lock().await;
        self.load_record(session_id).await
    }

    async fn update_session<T, F>(&self, session_id: Uuid, apply: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionRecord) -> Result<T> + Send + 'static,
    {
        let lock = self.lock_for(session_id);
        let _held = lock.lock().await;

        let mut record = self.load_record(session_id).await?;
        let value = apply(&mut record)?;
        record.session.touch();
        self.store_record(&record).await?;
        Ok(value)
    }

    async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let mut sessions = Vec::new();
        for id in self.session_ids().await? {
            match self.load_record(id).await {
                Ok(record) => sessions.push(record.session),
                // A file disappearing between listing and loading is not
                // an error for the listing as a whole.
                Err(StoreError::SessionNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn locate_node(&self, node_id: Uuid) -> Result<Uuid> {
        for id in self.session_ids().await? {
            let record = match self.load_record(id).await {
                Ok(record) => record,
                Err(StoreError::SessionNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            if record.nodes.contains_key(&node_id) {
                return Ok(id);
            }
        }
        Err(StoreError::NodeNotFound(node_id))
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let lock = self.lock_for(session_id);
        let _held = lock.lock().await;

        let path = self.session_path(session_id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        self.locks.remove(&session_id);
        Ok(())
    }
}
