use thiserror::Error;

use crate::path::PathViolation;

/// Virtual filesystem errors.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path rejected by the path guard.
    #[error("Path resolves outside sandbox boundaries: {0}")]
    SandboxViolation(String),

    /// Native IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing directory or file.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A directory was required but something else was found.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A file was required but a directory was found.
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Non-recursive removal of a directory that still has children.
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Insufficient permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// File exceeds the in-memory read limit.
    #[error("File too large: {path} ({size} bytes)")]
    FileTooLarge {
        /// Offending path.
        path: String,
        /// Size reported by the filesystem.
        size: u64,
    },

    /// The backing handle does not implement the requested capability.
    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

impl From<PathViolation> for VfsError {
    fn from(violation: PathViolation) -> Self {
        Self::SandboxViolation(violation.to_string())
    }
}

impl VfsError {
    /// True for the "does not exist" family of errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convenience result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;
