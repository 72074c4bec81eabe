//! Via-gent virtual filesystem layer.
//!
//! Two sides of a sync pass meet here:
//!
//! - The **container filesystem** ([`ContainerFs`]): the virtual filesystem of
//!   the in-browser runtime, reached only through the [`ContainerContext`]
//!   once the runtime has booted. [`MemoryFs`] and [`HostFs`] implement it.
//! - The **local handle tree** ([`DirectoryHandle`], [`FileHandle`]): the
//!   permission-scoped handles a user grants on their own disk.
//!   [`HostDirHandle`] implements it over the host filesystem.
//!
//! Every relative path crossing either boundary goes through the guards in
//! [`path`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Container runtime context.
pub mod context;
/// Virtual filesystem error types.
pub mod error;
/// Host-directory container filesystem.
pub mod host;
/// Local directory and file handles.
pub mod local;
/// In-memory container filesystem.
pub mod memory;
/// Path validation and normalization.
pub mod path;

pub use context::ContainerContext;
pub use error::{VfsError, VfsResult};
pub use host::HostFs;
pub use local::{
    DirectoryHandle, DirectoryPicker, EntryHandle, FileHandle, FixedPathPicker, HandleEntry,
    HandleKind, HandleReference, HostDirHandle, HostFileHandle, PermissionMode, PermissionState,
};
pub use memory::MemoryFs;
pub use path::{PathViolation, is_traversal_attempt, normalize_path, validate_path};

use async_trait::async_trait;

/// Directory entry returned by readdir.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VfsDirEntry {
    /// Name of the entry.
    pub name: String,
    /// True if the entry is a directory.
    pub is_dir: bool,
}

/// Filesystem of the in-browser container runtime.
///
/// Paths are relative and `/`-separated; `""` is the container root.
#[async_trait]
pub trait ContainerFs: Send + Sync {
    /// Write `content` to a file, creating or truncating it. The parent
    /// directory must exist.
    async fn write_file(&self, path: &str, content: &[u8]) -> VfsResult<()>;

    /// Read a whole file.
    async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>>;

    /// Create a directory. With `recursive`, missing parents are created and
    /// an existing directory is not an error.
    async fn mkdir(&self, path: &str, recursive: bool) -> VfsResult<()>;

    /// Remove a file or directory. Non-empty directories need `recursive`.
    async fn rm(&self, path: &str, recursive: bool) -> VfsResult<()>;

    /// List the direct children of a directory.
    async fn readdir(&self, path: &str) -> VfsResult<Vec<VfsDirEntry>>;

    /// Check whether a path exists.
    async fn exists(&self, path: &str) -> VfsResult<bool>;
}
