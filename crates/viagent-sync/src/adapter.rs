//! Access to the user's local directory through a bound handle.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};
use viagent_vfs::path::{file_name, validate_path};
use viagent_vfs::{
    DirectoryHandle, DirectoryPicker, FileHandle, HandleEntry, PermissionMode, PermissionState,
};

use crate::error::{FileSystemError, SyncError, SyncOutcome};
use crate::permission::get_permission_state;

/// Extensions (lowercase, no dot) read as raw bytes instead of text.
pub const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "avif", "tiff", "tif", "heic", "psd",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar",
    // audio and video
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4", "webm", "mov", "avi", "mkv",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // compiled
    "wasm", "exe", "dll", "so", "dylib", "bin", "class", "pyc", "node",
    // data
    "sqlite", "db",
];

/// Reads files from a local directory the user granted access to.
///
/// The adapter holds a reference to the directory handle; it does not own
/// the grant. Binding a new handle resets the cached permission state.
#[derive(Debug)]
pub struct LocalFsAdapter {
    root: RwLock<Option<Arc<dyn DirectoryHandle>>>,
    permission: RwLock<PermissionState>,
    binary_extensions: HashSet<String>,
}

impl Default for LocalFsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFsAdapter {
    /// Adapter with no directory bound and the default binary extensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RwLock::new(None),
            permission: RwLock::new(PermissionState::Unknown),
            binary_extensions: BINARY_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
        }
    }

    /// Adapter that also treats `extra` extensions as binary.
    #[must_use]
    pub fn with_binary_extensions<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut adapter = Self::new();
        adapter.binary_extensions.extend(
            extra
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty()),
        );
        adapter
    }

    /// Whether local directory access is available on this platform.
    #[must_use]
    pub fn is_supported() -> bool {
        cfg!(any(unix, windows))
    }

    /// Ask `picker` for a directory and bind it.
    ///
    /// Returns `Ok(None)` if the user cancelled; the current binding is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Vfs`] if the picker itself fails.
    pub async fn request_directory_access(
        &self,
        picker: &dyn DirectoryPicker,
    ) -> SyncOutcome<Option<Arc<dyn DirectoryHandle>>> {
        let Some(handle) = picker.pick().await? else {
            debug!("directory picker cancelled");
            return Ok(None);
        };
        self.set_directory_handle(Arc::clone(&handle));
        Ok(Some(handle))
    }

    /// Bind an existing handle (for example one restored from storage)
    /// without prompting.
    pub fn set_directory_handle(&self, handle: Arc<dyn DirectoryHandle>) {
        info!(directory = %handle.name(), "bound local directory");
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        *self.permission.write().unwrap_or_else(PoisonError::into_inner) =
            PermissionState::Unknown;
    }

    /// The bound handle, if any.
    #[must_use]
    pub fn directory_handle(&self) -> Option<Arc<dyn DirectoryHandle>> {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if a directory is bound.
    #[must_use]
    pub fn has_directory(&self) -> bool {
        self.directory_handle().is_some()
    }

    /// Release the bound handle.
    pub fn clear(&self) {
        if self
            .root
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("released local directory");
        }
        *self.permission.write().unwrap_or_else(PoisonError::into_inner) =
            PermissionState::Unknown;
    }

    /// Last known permission state of the bound directory.
    #[must_use]
    pub fn permission_state(&self) -> PermissionState {
        *self.permission.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-query the permission of the bound directory and cache it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoDirectory`] if nothing is bound.
    pub async fn refresh_permission(&self, mode: PermissionMode) -> SyncOutcome<PermissionState> {
        let root = self.directory_handle().ok_or(SyncError::NoDirectory)?;
        let state = get_permission_state(root.as_ref(), mode).await;
        *self.permission.write().unwrap_or_else(PoisonError::into_inner) = state;
        Ok(state)
    }

    /// Whether `path` has a binary extension. Extension-based only.
    #[must_use]
    pub fn is_binary_file(&self, path: &str) -> bool {
        file_name(path)
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| {
                !stem.is_empty() && self.binary_extensions.contains(&ext.to_lowercase())
            })
    }

    /// Read a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns a [`FileSystemError`] if the path is invalid, missing,
    /// unreadable, or not UTF-8.
    pub async fn read_file(&self, path: &str) -> Result<String, FileSystemError> {
        let bytes = self.read_file_binary(path).await?;
        String::from_utf8(bytes).map_err(|_| FileSystemError::InvalidUtf8 {
            path: path.to_owned(),
        })
    }

    /// Read a file as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`FileSystemError`] if the path is invalid, missing, or
    /// unreadable.
    pub async fn read_file_binary(&self, path: &str) -> Result<Vec<u8>, FileSystemError> {
        let file = self.resolve_file(path).await?;
        file.read()
            .await
            .map_err(|e| FileSystemError::from_vfs(path, &e))
    }

    /// Read a file the way a sync pass copies it. Bytes are copied as read;
    /// text that is not valid UTF-8 is logged and copied unchanged, since
    /// the container stores raw bytes.
    ///
    /// # Errors
    ///
    /// See [`read_file_binary`](Self::read_file_binary).
    pub async fn read_for_sync(&self, path: &str) -> Result<Vec<u8>, FileSystemError> {
        let bytes = self.read_file_binary(path).await?;
        if !self.is_binary_file(path) && std::str::from_utf8(&bytes).is_err() {
            debug!(path, len = bytes.len(), "text file is not UTF-8, copying raw bytes");
        }
        Ok(bytes)
    }

    /// Direct children of a sub-directory (`""` for the root).
    ///
    /// # Errors
    ///
    /// Returns a [`FileSystemError`] if the path is invalid or not a
    /// readable directory.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<HandleEntry>, FileSystemError> {
        let dir = if path.is_empty() {
            self.directory_handle().ok_or(FileSystemError::NoDirectory)?
        } else {
            self.resolve_dir(path).await?
        };
        let mut entries = dir
            .entries()
            .await
            .map_err(|e| FileSystemError::from_vfs(path, &e))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn checked_root(&self, path: &str) -> Result<Arc<dyn DirectoryHandle>, FileSystemError> {
        validate_path(path).map_err(|violation| FileSystemError::InvalidPath {
            path: path.to_owned(),
            violation,
        })?;
        self.directory_handle().ok_or(FileSystemError::NoDirectory)
    }

    async fn descend(
        &self,
        root: Arc<dyn DirectoryHandle>,
        path: &str,
        segments: &[&str],
    ) -> Result<Arc<dyn DirectoryHandle>, FileSystemError> {
        let mut dir = root;
        for segment in segments {
            dir = dir
                .get_directory(segment)
                .await
                .map_err(|e| FileSystemError::from_vfs(path, &e))?;
        }
        Ok(dir)
    }

    async fn resolve_dir(&self, path: &str) -> Result<Arc<dyn DirectoryHandle>, FileSystemError> {
        let root = self.checked_root(path)?;
        let normalized = path.replace('\\', "/");
        let segments: Vec<&str> = normalized.split('/').collect();
        self.descend(root, path, &segments).await
    }

    async fn resolve_file(&self, path: &str) -> Result<Arc<dyn FileHandle>, FileSystemError> {
        let root = self.checked_root(path)?;
        let normalized = path.replace('\\', "/");
        let segments: Vec<&str> = normalized.split('/').collect();
        let Some((name, parents)) = segments.split_last() else {
            return Err(FileSystemError::NotFound {
                path: path.to_owned(),
            });
        };
        let dir = self.descend(root, path, parents).await?;
        dir.get_file(name)
            .await
            .map_err(|e| FileSystemError::from_vfs(path, &e))
    }
}
