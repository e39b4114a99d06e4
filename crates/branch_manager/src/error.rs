//! Branch service error types

use message_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BranchError {
    /// Provided message content was empty after trimming whitespace.
    #[error("message content cannot be empty")]
    EmptyMessageContent,

    /// A store-level write race survived the bounded retry loop.
    #[error("Concurrent modification of session {0}")]
    ConcurrentModification(Uuid),

    /// The model collaborator failed or was cancelled mid-stream. Tree
    /// state stays consistent; the partial node is marked interrupted.
    #[error("Upstream generation failed: {0}")]
    UpstreamGenerationFailure(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BranchError {
    /// Whether the error names a missing or foreign node/session, i.e. a
    /// request-level failure rather than an engine fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BranchError::Store(StoreError::SessionNotFound(_))
                | BranchError::Store(StoreError::NodeNotFound(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, BranchError>;
