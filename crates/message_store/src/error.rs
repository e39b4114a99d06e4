//! Node store error types

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Message not found: {0}")]
    NodeNotFound(Uuid),

    #[error("Message {node_id} does not belong to session {session_id}")]
    CrossSessionReference { node_id: Uuid, session_id: Uuid },

    /// The active-child pointer of `node_id` does not reference one of its
    /// own children. Never constructible through the service mutations;
    /// checked defensively on traversal.
    #[error("Active child {child_id} is not a child of {node_id}")]
    InvalidActiveChild { node_id: Uuid, child_id: Uuid },

    /// A concurrent writer touched the session. Bubbled up so the caller
    /// can re-read and retry the whole atomic unit.
    #[error("Concurrent write to session {0}")]
    Conflict(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
