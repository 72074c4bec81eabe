//! Raw key-value store trait and the in-memory implementation.
//!
//! All operations are scoped to a namespace. Use [`ScopedKvStore`] to
//! pre-bind one; it also offers typed [`get_json`](ScopedKvStore::get_json) /
//! [`set_json`](ScopedKvStore::set_json) helpers.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Reject empty names and names carrying a NUL byte.
pub(crate) fn check_name(kind: &'static str, name: &str) -> StorageResult<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.contains('\0') {
        "must not contain NUL"
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidName {
        kind,
        name: name.to_owned(),
        reason,
    })
}

/// Raw key-value store trait.
///
/// Provides namespaced byte-level storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by namespace and key. `None` if absent.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Check if a key exists.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Delete all keys in a namespace, returning how many were removed.
    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64>;
}

/// In-memory key-value store for tests and ephemeral sessions.
///
/// Same shape as the JSON document of [`JsonFileKvStore`](crate::JsonFileKvStore):
/// namespace to sorted keys. A poisoned lock is recovered, since every
/// mutation leaves the map consistent.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    namespaces: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(
        &self,
        namespace: &str,
        f: impl FnOnce(&BTreeMap<String, Vec<u8>>) -> T,
    ) -> Option<T> {
        let guard = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(namespace).map(f)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read(namespace, |keys| keys.get(key).cloned()).flatten())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut guard = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let mut guard = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let Some(keys) = guard.get_mut(namespace) else {
            return Ok(false);
        };
        let removed = keys.remove(key).is_some();
        if keys.is_empty() {
            guard.remove(namespace);
        }
        Ok(removed)
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .read(namespace, |keys| keys.contains_key(key))
            .unwrap_or(false))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .read(namespace, |keys| keys.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        let mut guard = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let removed = guard.remove(namespace).map_or(0, |keys| keys.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

/// A [`KvStore`] view bound to one namespace.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Create a scoped view into `store` for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the namespace is empty
    /// or contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        check_name("namespace", &namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The namespace this store is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a raw byte value by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the key is empty or invalid.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_name("key", key)?;
        self.inner.get(&self.namespace, key).await
    }

    /// Set a raw byte value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the key is empty or invalid.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_name("key", key)?;
        self.inner.set(&self.namespace, key, value).await
    }

    /// Delete a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the key is empty or invalid.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        check_name("key", key)?;
        self.inner.delete(&self.namespace, key).await
    }

    /// List all keys in this namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }

    /// Deserialize a JSON value from the store. `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if deserialization fails.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let bytes = self.get(key).await?;
        bytes
            .map(|b| {
                serde_json::from_slice(&b).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Serialize a value as JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(key, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_set_overwrite() {
        let store = MemoryKvStore::new();
        store.set("ns1", "k", b"v1".to_vec()).await.unwrap();
        store.set("ns1", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("ns1", "k").await.unwrap(), Some(b"v2".to_vec()));
        assert!(store.get("ns1", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_delete_and_exists() {
        let store = MemoryKvStore::new();
        store.set("ns1", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists("ns1", "k").await.unwrap());
        assert!(store.delete("ns1", "k").await.unwrap());
        assert!(!store.delete("ns1", "k").await.unwrap());
        assert!(!store.exists("ns1", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation() {
        let store = MemoryKvStore::new();
        store.set("ns1", "a", b"1".to_vec()).await.unwrap();
        store.set("ns1", "b", b"2".to_vec()).await.unwrap();
        store.set("ns2", "a", b"3".to_vec()).await.unwrap();

        assert_eq!(store.list_keys("ns1").await.unwrap(), vec!["a", "b"]);

        assert_eq!(store.clear_namespace("ns1").await.unwrap(), 2);
        assert!(store.list_keys("ns1").await.unwrap().is_empty());
        assert_eq!(store.get("ns2", "a").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_scoped_json() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Meta {
            patterns: Vec<String>,
        }

        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let scoped = ScopedKvStore::new(store, "projects").unwrap();
        let meta = Meta {
            patterns: vec!["*.log".into()],
        };
        scoped.set_json("p1", &meta).await.unwrap();
        assert_eq!(scoped.get_json::<Meta>("p1").await.unwrap(), Some(meta));
        assert!(scoped.get_json::<Meta>("p2").await.unwrap().is_none());

        scoped.set("bad", b"not json".to_vec()).await.unwrap();
        assert!(matches!(
            scoped.get_json::<Meta>("bad").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_scoped_rejects_bad_keys() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        assert!(ScopedKvStore::new(Arc::clone(&store), "").is_err());
        let scoped = ScopedKvStore::new(store, "ns").unwrap();
        assert!(matches!(
            scoped.get("").await,
            Err(StorageError::InvalidName { kind: "key", .. })
        ));
        assert!(matches!(
            scoped.set("a\0b", vec![]).await,
            Err(StorageError::InvalidName { kind: "key", .. })
        ));
    }
}
