use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::path::{normalize_path, parent_path};
use crate::{ContainerFs, VfsDirEntry, VfsError, VfsResult};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// In-memory container filesystem.
///
/// Nodes are keyed by normalized path in a `BTreeMap`, so the descendants of
/// a directory form one contiguous key range. The root (`""`) always exists.
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<String, Node>>,
}

fn lock_err<E: std::fmt::Display>(e: E) -> VfsError {
    VfsError::Io(std::io::Error::other(e.to_string()))
}

fn is_dir(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
    path.is_empty() || matches!(nodes.get(path), Some(Node::Dir))
}

fn child_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    }
}

impl MemoryFs {
    /// Create an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All paths currently present, in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.nodes
            .read()
            .map(|nodes| nodes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of files (directories excluded).
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.nodes
            .read()
            .map(|nodes| {
                nodes
                    .values()
                    .filter(|n| matches!(n, Node::File(_)))
                    .count()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContainerFs for MemoryFs {
    async fn write_file(&self, path: &str, content: &[u8]) -> VfsResult<()> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(VfsError::IsADirectory(path.to_owned()));
        }
        let mut nodes = self.nodes.write().map_err(lock_err)?;
        let parent = parent_path(&key);
        if !is_dir(&nodes, parent) {
            return Err(VfsError::NotFound(parent.to_owned()));
        }
        if matches!(nodes.get(&key), Some(Node::Dir)) {
            return Err(VfsError::IsADirectory(key));
        }
        nodes.insert(key, Node::File(content.to_vec()));
        Ok(())
    }

    async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let key = normalize_path(path);
        let nodes = self.nodes.read().map_err(lock_err)?;
        match nodes.get(&key) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(VfsError::IsADirectory(key)),
            None if key.is_empty() => Err(VfsError::IsADirectory(key)),
            None => Err(VfsError::NotFound(key)),
        }
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let key = normalize_path(path);
        let mut nodes = self.nodes.write().map_err(lock_err)?;
        if is_dir(&nodes, &key) {
            return if recursive {
                Ok(())
            } else {
                Err(VfsError::AlreadyExists(key))
            };
        }
        if nodes.contains_key(&key) {
            return Err(VfsError::AlreadyExists(key));
        }

        if recursive {
            let mut current = String::new();
            for segment in key.split('/') {
                current = crate::path::join_path(&current, segment);
                match nodes.get(&current) {
                    Some(Node::Dir) => {},
                    Some(Node::File(_)) => return Err(VfsError::NotADirectory(current)),
                    None => {
                        nodes.insert(current.clone(), Node::Dir);
                    },
                }
            }
        } else {
            let parent = parent_path(&key);
            if !is_dir(&nodes, parent) {
                return Err(VfsError::NotFound(parent.to_owned()));
            }
            nodes.insert(key, Node::Dir);
        }
        Ok(())
    }

    async fn rm(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(VfsError::PermissionDenied(
                "Cannot remove the container root".into(),
            ));
        }
        let mut nodes = self.nodes.write().map_err(lock_err)?;
        match nodes.get(&key) {
            None => Err(VfsError::NotFound(key)),
            Some(Node::File(_)) => {
                nodes.remove(&key);
                Ok(())
            },
            Some(Node::Dir) => {
                let prefix = child_prefix(&key);
                let descendants: Vec<String> = nodes
                    .range(prefix.clone()..)
                    .take_while(|(k, _)| k.starts_with(&prefix))
                    .map(|(k, _)| k.clone())
                    .collect();
                if !descendants.is_empty() && !recursive {
                    return Err(VfsError::DirectoryNotEmpty(key));
                }
                for descendant in descendants {
                    nodes.remove(&descendant);
                }
                nodes.remove(&key);
                Ok(())
            },
        }
    }

    async fn readdir(&self, path: &str) -> VfsResult<Vec<VfsDirEntry>> {
        let key = normalize_path(path);
        let nodes = self.nodes.read().map_err(lock_err)?;
        if !is_dir(&nodes, &key) {
            return if nodes.contains_key(&key) {
                Err(VfsError::NotADirectory(key))
            } else {
                Err(VfsError::NotFound(key))
            };
        }
        let prefix = child_prefix(&key);
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, node)| {
                let rest = &k[prefix.len()..];
                (!rest.contains('/')).then(|| VfsDirEntry {
                    name: rest.to_owned(),
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect())
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let key = normalize_path(path);
        let nodes = self.nodes.read().map_err(lock_err)?;
        Ok(key.is_empty() || nodes.contains_key(&key))
    }
}
