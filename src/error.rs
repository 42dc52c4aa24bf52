//! Error types for storage backends, accessor paths and the store itself.

use thiserror::Error;

/// Failure reported by a storage backend or cookie store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    #[error("backend rejected the operation: {0}")]
    Rejected(String),
}

/// Failure to parse or apply an accessor path such as `user.tags[0]`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("accessor path is empty")]
    Empty,

    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("unterminated index expression")]
    UnterminatedIndex,

    #[error("array index {index} exceeds the assignable maximum")]
    IndexTooLarge { index: usize },

    #[error("cannot descend into non-container value at {segment}")]
    NotAContainer { segment: String },
}

/// Error returned by [`KeyValueStore`](crate::KeyValueStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("primary storage backend is not available")]
    Unsupported,
}

/// Result alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
