//! Error types for the sync engine.

use thiserror::Error;
use viagent_storage::StorageError;
use viagent_vfs::{PathViolation, PermissionState, VfsError};

/// Failure reading from the bound local directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileSystemError {
    /// No such file or directory.
    #[error("file not found: {path}")]
    NotFound {
        /// Relative path that was requested.
        path: String,
    },

    /// The handle exists but could not be read.
    #[error("failed to read {path}: {message}")]
    ReadFailed {
        /// Relative path that was requested.
        path: String,
        /// Underlying failure.
        message: String,
    },

    /// The path failed validation before any handle was touched.
    #[error("invalid path '{path}': {violation}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        violation: PathViolation,
    },

    /// A parent segment is a file.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Relative path of the offending segment.
        path: String,
    },

    /// A text read hit bytes that are not UTF-8.
    #[error("file is not valid UTF-8: {path}")]
    InvalidUtf8 {
        /// Relative path that was requested.
        path: String,
    },

    /// The adapter has no directory bound.
    #[error("no local directory selected")]
    NoDirectory,
}

impl FileSystemError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ReadFailed { .. } => "READ_FAILED",
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::NotADirectory { .. } => "NOT_A_DIRECTORY",
            Self::InvalidUtf8 { .. } => "INVALID_UTF8",
            Self::NoDirectory => "NO_DIRECTORY",
        }
    }

    /// Path the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path }
            | Self::ReadFailed { path, .. }
            | Self::InvalidPath { path, .. }
            | Self::NotADirectory { path }
            | Self::InvalidUtf8 { path } => Some(path),
            Self::NoDirectory => None,
        }
    }

    /// Map a handle-level error for `path` into a read error.
    pub(crate) fn from_vfs(path: &str, err: &VfsError) -> Self {
        match err {
            e if e.is_not_found() => Self::NotFound {
                path: path.to_owned(),
            },
            VfsError::NotADirectory(_) => Self::NotADirectory {
                path: path.to_owned(),
            },
            other => Self::ReadFailed {
                path: path.to_owned(),
                message: other.to_string(),
            },
        }
    }
}

/// Structural failure of a sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The container filesystem is not available yet.
    #[error("container not booted")]
    NotBooted,

    /// No local directory has been bound.
    #[error("no local directory selected")]
    NoDirectory,

    /// The local directory is not readable.
    #[error("permission {state} for directory '{directory}'")]
    PermissionDenied {
        /// Name of the directory.
        directory: String,
        /// State reported by the permission query.
        state: PermissionState,
    },

    /// The pass was cancelled.
    #[error("sync cancelled after {synced} items")]
    Cancelled {
        /// Items applied before cancellation.
        synced: usize,
    },

    /// An exclusion pattern failed validation.
    #[error("invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Container filesystem or handle failure.
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// Local read failure outside a plan.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Workspace state could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotBooted => "NOT_BOOTED",
            Self::NoDirectory => "NO_DIRECTORY",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",
            Self::Vfs(_) => "VFS_ERROR",
            Self::FileSystem(e) => e.code(),
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Result type for sync operations.
pub type SyncOutcome<T> = Result<T, SyncError>;
