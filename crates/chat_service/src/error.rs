//! Service error types

use branch_manager::BranchError;
use message_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// A public identifier failed to decode.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The request shape is wrong (missing parent for regeneration,
    /// regenerating a user message, and the like).
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Branch(#[from] BranchError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Branch(BranchError::Store(err))
    }
}

impl ServiceError {
    /// Whether the failure maps to a missing session or message, for
    /// callers translating into request-level status codes.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Branch(err) if err.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
