use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{VfsError, VfsResult};

/// Largest file read into memory in one go (50 MiB).
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Kind of a local handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Access mode a permission is queried or requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Read-only access.
    Read,
    /// Read and write access.
    ReadWrite,
}

/// Permission state of a local handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Not queried yet.
    #[default]
    Unknown,
    /// Access granted.
    Granted,
    /// Access must be requested from the user.
    Prompt,
    /// Access refused.
    Denied,
}

impl PermissionState {
    /// True only for [`PermissionState::Granted`].
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Granted => write!(f, "granted"),
            Self::Prompt => write!(f, "prompt"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// Serializable reference to a directory handle, persisted so a handle can
/// be restored without asking the user again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleReference {
    /// Backend that produced the handle (`"host"`).
    pub kind: String,
    /// Display name of the directory.
    pub name: String,
    /// Backend-specific location.
    pub location: String,
}

/// A handle on a local file.
#[async_trait]
pub trait FileHandle: Send + Sync + fmt::Debug {
    /// File name.
    fn name(&self) -> &str;

    /// Read the whole file.
    async fn read(&self) -> VfsResult<Vec<u8>>;
}

/// A handle on a local directory.
///
/// The permission methods default to [`VfsError::Unsupported`], which is how
/// a backend without a permission API presents itself.
#[async_trait]
pub trait DirectoryHandle: Send + Sync + fmt::Debug {
    /// Directory name.
    fn name(&self) -> &str;

    /// Direct children of this directory.
    async fn entries(&self) -> VfsResult<Vec<HandleEntry>>;

    /// Child directory by name.
    async fn get_directory(&self, name: &str) -> VfsResult<Arc<dyn DirectoryHandle>>;

    /// Child file by name.
    async fn get_file(&self, name: &str) -> VfsResult<Arc<dyn FileHandle>>;

    /// Current permission for `mode`, without prompting.
    async fn query_permission(&self, mode: PermissionMode) -> VfsResult<PermissionState> {
        let _ = mode;
        Err(VfsError::Unsupported("queryPermission".into()))
    }

    /// Ask for permission for `mode`, possibly prompting the user.
    async fn request_permission(&self, mode: PermissionMode) -> VfsResult<PermissionState> {
        let _ = mode;
        Err(VfsError::Unsupported("requestPermission".into()))
    }

    /// Persistable reference to this handle, if the backend supports one.
    fn reference(&self) -> Option<HandleReference> {
        None
    }
}

/// Handle held by a directory entry.
#[derive(Debug, Clone)]
pub enum EntryHandle {
    /// File handle.
    File(Arc<dyn FileHandle>),
    /// Directory handle.
    Directory(Arc<dyn DirectoryHandle>),
}

impl EntryHandle {
    /// Kind of the underlying handle.
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        match self {
            Self::File(_) => HandleKind::File,
            Self::Directory(_) => HandleKind::Directory,
        }
    }
}

/// One child of a directory handle.
#[derive(Debug, Clone)]
pub struct HandleEntry {
    /// Entry name.
    pub name: String,
    /// Entry handle.
    pub handle: EntryHandle,
}

impl HandleEntry {
    /// Kind of the entry.
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        self.handle.kind()
    }
}

/// Something that can ask the user for a directory, such as a native picker.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    /// Pick a directory. `Ok(None)` means the user cancelled.
    async fn pick(&self) -> VfsResult<Option<Arc<dyn DirectoryHandle>>>;
}

/// Picker that always returns the same host path (or cancels when empty).
#[derive(Debug, Clone, Default)]
pub struct FixedPathPicker {
    path: Option<PathBuf>,
}

impl FixedPathPicker {
    /// Picker that returns `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Picker that behaves like a cancelled dialog.
    #[must_use]
    pub fn cancelled() -> Self {
        Self { path: None }
    }
}

#[async_trait]
impl DirectoryPicker for FixedPathPicker {
    async fn pick(&self) -> VfsResult<Option<Arc<dyn DirectoryHandle>>> {
        match &self.path {
            Some(path) => {
                let handle = HostDirHandle::open(path).await?;
                Ok(Some(Arc::new(handle)))
            },
            None => Ok(None),
        }
    }
}

fn check_child_name(name: &str) -> VfsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(VfsError::SandboxViolation(format!(
            "invalid entry name '{name}'"
        )));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().to_string(),
    )
}

/// Directory handle on the host filesystem.
#[derive(Debug, Clone)]
pub struct HostDirHandle {
    name: String,
    path: PathBuf,
}

impl HostDirHandle {
    /// Open a host directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or is not a directory.
    pub async fn open(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VfsError::NotFound(path.display().to_string())
            } else {
                VfsError::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(VfsError::NotADirectory(path.display().to_string()));
        }
        Ok(Self {
            name: display_name(path),
            path: path.to_path_buf(),
        })
    }

    /// Restore a handle from a persisted reference.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::Unsupported`] for references produced by another
    /// backend, or an error if the directory is gone.
    pub async fn from_reference(reference: &HandleReference) -> VfsResult<Self> {
        if reference.kind != "host" {
            return Err(VfsError::Unsupported(format!(
                "handle reference kind '{}'",
                reference.kind
            )));
        }
        Self::open(&reference.location).await
    }

    /// Host path of this directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectoryHandle for HostDirHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> VfsResult<Vec<HandleEntry>> {
        let mut read_dir = tokio::fs::read_dir(&self.path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                    continue;
                },
            };
            let handle = if meta.is_symlink() {
                debug!(path = %path.display(), "skipping symlink");
                continue;
            } else if meta.is_dir() {
                EntryHandle::Directory(Arc::new(Self {
                    name: name.clone(),
                    path,
                }))
            } else {
                EntryHandle::File(Arc::new(HostFileHandle {
                    name: name.clone(),
                    path,
                }))
            };
            entries.push(HandleEntry { name, handle });
        }

        Ok(entries)
    }

    async fn get_directory(&self, name: &str) -> VfsResult<Arc<dyn DirectoryHandle>> {
        check_child_name(name)?;
        let path = self.path.join(name);
        let meta = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|_| VfsError::NotFound(name.to_owned()))?;
        if !meta.is_dir() {
            return Err(VfsError::NotADirectory(name.to_owned()));
        }
        Ok(Arc::new(Self {
            name: name.to_owned(),
            path,
        }))
    }

    async fn get_file(&self, name: &str) -> VfsResult<Arc<dyn FileHandle>> {
        check_child_name(name)?;
        let path = self.path.join(name);
        let meta = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|_| VfsError::NotFound(name.to_owned()))?;
        if meta.is_dir() {
            return Err(VfsError::IsADirectory(name.to_owned()));
        }
        if meta.is_symlink() {
            return Err(VfsError::SandboxViolation(format!(
                "'{name}' is a symlink"
            )));
        }
        Ok(Arc::new(HostFileHandle {
            name: name.to_owned(),
            path,
        }))
    }

    async fn query_permission(&self, mode: PermissionMode) -> VfsResult<PermissionState> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(PermissionState::Denied);
            },
            Err(e) => return Err(VfsError::Io(e)),
        };
        if tokio::fs::read_dir(&self.path).await.is_err() {
            return Ok(PermissionState::Denied);
        }
        match mode {
            PermissionMode::Read => Ok(PermissionState::Granted),
            PermissionMode::ReadWrite if meta.permissions().readonly() => {
                Ok(PermissionState::Denied)
            },
            PermissionMode::ReadWrite => Ok(PermissionState::Granted),
        }
    }

    async fn request_permission(&self, mode: PermissionMode) -> VfsResult<PermissionState> {
        // The host has no prompt; the answer is whatever the OS says now.
        self.query_permission(mode).await
    }

    fn reference(&self) -> Option<HandleReference> {
        Some(HandleReference {
            kind: "host".into(),
            name: self.name.clone(),
            location: self.path.to_string_lossy().to_string(),
        })
    }
}

/// File handle on the host filesystem.
#[derive(Debug, Clone)]
pub struct HostFileHandle {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl FileHandle for HostFileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> VfsResult<Vec<u8>> {
        let meta = tokio::fs::metadata(&self.path).await?;
        if meta.len() > MAX_FILE_SIZE {
            return Err(VfsError::FileTooLarge {
                path: self.path.display().to_string(),
                size: meta.len(),
            });
        }
        Ok(tokio::fs::read(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Bare;

    #[async_trait]
    impl DirectoryHandle for Bare {
        fn name(&self) -> &str {
            "bare"
        }
        async fn entries(&self) -> VfsResult<Vec<HandleEntry>> {
            Ok(Vec::new())
        }
        async fn get_directory(&self, name: &str) -> VfsResult<Arc<dyn DirectoryHandle>> {
            Err(VfsError::NotFound(name.into()))
        }
        async fn get_file(&self, name: &str) -> VfsResult<Arc<dyn FileHandle>> {
            Err(VfsError::NotFound(name.into()))
        }
    }

    #[tokio::test]
    async fn test_permission_defaults_unsupported() {
        let handle = Bare;
        assert!(matches!(
            handle.query_permission(PermissionMode::Read).await,
            Err(VfsError::Unsupported(_))
        ));
        assert!(matches!(
            handle.request_permission(PermissionMode::ReadWrite).await,
            Err(VfsError::Unsupported(_))
        ));
        assert!(handle.reference().is_none());
    }

    #[tokio::test]
    async fn test_host_handle_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();

        let root = HostDirHandle::open(dir.path()).await.unwrap();
        let mut entries = root.entries().await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let kinds: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.kind())).collect();
        assert_eq!(
            kinds,
            vec![("README.md", HandleKind::File), ("src", HandleKind::Directory)]
        );

        let src = root.get_directory("src").await.unwrap();
        let main = src.get_file("main.rs").await.unwrap();
        assert_eq!(main.read().await.unwrap(), b"fn main() {}");

        assert!(root.get_file("src").await.is_err());
        assert!(root.get_directory("README.md").await.is_err());
        assert!(root.get_directory("..").await.is_err());
    }

    #[tokio::test]
    async fn test_host_permission_and_reference() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostDirHandle::open(dir.path()).await.unwrap();
        assert_eq!(
            root.query_permission(PermissionMode::Read).await.unwrap(),
            PermissionState::Granted
        );

        let reference = root.reference().unwrap();
        assert_eq!(reference.kind, "host");
        let restored = HostDirHandle::from_reference(&reference).await.unwrap();
        assert_eq!(restored.path(), root.path());

        let foreign = HandleReference {
            kind: "browser".into(),
            name: "x".into(),
            location: "opaque".into(),
        };
        assert!(matches!(
            HostDirHandle::from_reference(&foreign).await,
            Err(VfsError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_picker() {
        let dir = tempfile::tempdir().unwrap();
        let picked = FixedPathPicker::new(dir.path()).pick().await.unwrap();
        assert!(picked.is_some());
        let cancelled = FixedPathPicker::cancelled().pick().await.unwrap();
        assert!(cancelled.is_none());
    }

    #[test]
    fn test_permission_state_serde() {
        let json = serde_json::to_string(&PermissionState::Prompt).unwrap();
        assert_eq!(json, "\"prompt\"");
    }
}
