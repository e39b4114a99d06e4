//! Node store trait

use async_trait::async_trait;
use chat_core::ChatSession;
use uuid::Uuid;

use crate::error::Result;
use crate::record::SessionRecord;

/// Persistence boundary for conversation trees.
///
/// Implementations must serialize writers per session: two concurrent
/// `update_session` calls on the same session never observe each other's
/// intermediate state, so sibling counters derived inside the closure are
/// race-free. Reads return a single consistent snapshot.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Create an empty session.
    async fn create_session(&self, title: Option<String>) -> Result<ChatSession>;

    /// Snapshot one session's record.
    async fn read_session(&self, session_id: Uuid) -> Result<SessionRecord>;

    /// Run `apply` against a scratch copy of the record under the
    /// session's exclusive lock. On `Ok` the copy replaces the stored
    /// record and the session's `updated_at` advances; on `Err` nothing is
    /// persisted.
    async fn update_session<T, F>(&self, session_id: Uuid, apply: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionRecord) -> Result<T> + Send + 'static;

    /// All sessions, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<ChatSession>>;

    /// Which session a node belongs to. `NodeNotFound` if it exists
    /// nowhere; used to tell a cross-session reference apart from a
    /// missing node.
    async fn locate_node(&self, node_id: Uuid) -> Result<Uuid>;

    /// Drop a session and its whole tree.
    async fn delete_session(&self, session_id: Uuid) -> Result<()>;
}
