//! JSON-file backed key-value store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;

type Namespaces = BTreeMap<String, BTreeMap<String, String>>;

/// Key-value store persisted as one JSON document.
///
/// The document maps namespace to key to base64 value. The whole file is
/// rewritten (via a temporary sibling and a rename) on every mutation, which
/// suits the handful of records a workspace keeps.
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    data: Mutex<Namespaces>,
}

impl JsonFileKvStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file not found, starting empty");
                Namespaces::new()
            },
            Err(e) => return Err(StorageError::Io(e)),
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &Namespaces) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes =
            serde_json::to_vec_pretty(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let data = self.data.lock().await;
        data.get(namespace)
            .and_then(|ns| ns.get(key))
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.lock().await;
        data.entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), STANDARD.encode(value));
        self.persist(&data).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().await;
        let removed = data
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some());
        if removed {
            self.persist(&data).await?;
        }
        Ok(removed)
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let data = self.data.lock().await;
        Ok(data.get(namespace).is_some_and(|ns| ns.contains_key(key)))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let data = self.data.lock().await;
        Ok(data
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        let mut data = self.data.lock().await;
        let removed = data.remove(namespace).map_or(0, |ns| ns.len());
        if removed > 0 {
            self.persist(&data).await?;
        }
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}
