//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A namespace or key was rejected before reaching the backend.
    #[error("invalid {kind} {name:?}: {reason}")]
    InvalidName {
        /// `"namespace"` or `"key"`.
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The state file could not be read or written.
    #[error("state file unavailable: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document or value was not valid JSON for its type.
    #[error("malformed stored data: {0}")]
    Serialization(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
