//! Errors raised by the repository and the storage backends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// A referenced document does not exist or belongs to another user.
    #[error("{0}")]
    InvalidReference(String),
    /// The named document does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The document exists but the caller may not perform this operation on it.
    #[error("{0}")]
    Forbidden(String),
    /// The request conflicts with the current state of a document.
    #[error("{0}")]
    Conflict(String),
    #[error("Export not ready for download")]
    NotReady,
    /// A unique constraint was violated.
    #[error("duplicate value for {0}")]
    Duplicate(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
