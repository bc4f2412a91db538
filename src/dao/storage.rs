use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by question store backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored question cannot be served (e.g. its correct option is not one of its options).
    #[error("invalid question record `{id}`: {reason}")]
    InvalidRecord { id: String, reason: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct an invalid-record error for the question identified by `id`.
    pub fn invalid_record(id: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::InvalidRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
