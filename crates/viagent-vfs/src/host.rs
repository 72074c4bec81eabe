use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::path::resolve_path;
use crate::{ContainerFs, VfsDirEntry, VfsError, VfsResult};

/// A `ContainerFs` backed by a directory on the host.
///
/// Used when the "container" is a plain directory, e.g. by the CLI. All
/// paths are resolved lexically under the root and symlinks are refused.
#[derive(Debug, Clone)]
pub struct HostFs {
    root: PathBuf,
}

fn map_io(e: std::io::Error, path: &str) -> VfsError {
    match e.kind() {
        std::io::ErrorKind::NotFound => VfsError::NotFound(path.to_owned()),
        std::io::ErrorKind::AlreadyExists => VfsError::AlreadyExists(path.to_owned()),
        std::io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(path.to_owned()),
        _ => VfsError::Io(e),
    }
}

impl HostFs {
    /// Wrap an existing directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Wrap a directory, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn create(root: impl Into<PathBuf>) -> VfsResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory on the host.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        let resolved = resolve_path(&self.root, path)?;

        // Refuse any existing symlink between the root and the target.
        let mut current = resolved.as_path();
        while current.starts_with(&self.root) && current != self.root {
            if let Ok(meta) = tokio::fs::symlink_metadata(current).await
                && meta.is_symlink()
            {
                return Err(VfsError::SandboxViolation(
                    "Symlinks are not followed inside the container".into(),
                ));
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(resolved)
    }
}

#[async_trait]
impl ContainerFs for HostFs {
    async fn write_file(&self, path: &str, content: &[u8]) -> VfsResult<()> {
        let target = self.resolve(path).await?;
        if target == self.root {
            return Err(VfsError::IsADirectory(path.to_owned()));
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| map_io(e, path))
    }

    async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let target = self.resolve(path).await?;
        tokio::fs::read(&target).await.map_err(|e| map_io(e, path))
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let target = self.resolve(path).await?;
        if recursive {
            tokio::fs::create_dir_all(&target)
                .await
                .map_err(|e| map_io(e, path))
        } else {
            tokio::fs::create_dir(&target)
                .await
                .map_err(|e| map_io(e, path))
        }
    }

    async fn rm(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let target = self.resolve(path).await?;
        if target == self.root {
            return Err(VfsError::PermissionDenied(
                "Cannot remove the container root".into(),
            ));
        }
        let meta = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|e| map_io(e, path))?;
        let result = if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&target).await
            } else {
                tokio::fs::remove_dir(&target).await
            }
        } else {
            tokio::fs::remove_file(&target).await
        };
        debug!(path, recursive, "removed container entry");
        result.map_err(|e| map_io(e, path))
    }

    async fn readdir(&self, path: &str) -> VfsResult<Vec<VfsDirEntry>> {
        let target = self.resolve(path).await?;
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| map_io(e, path))?;

        while let Some(entry) = read_dir.next_entry().await? {
            let is_dir = match tokio::fs::symlink_metadata(entry.path()).await {
                Ok(meta) => meta.is_dir(),
                Err(_) => false,
            };
            entries.push(VfsDirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let target = self.resolve(path).await?;
        Ok(tokio::fs::try_exists(&target).await.unwrap_or(false))
    }
}
