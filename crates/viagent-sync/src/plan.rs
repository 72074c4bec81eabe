//! Ordered list of container operations for one sync pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use viagent_vfs::path::join_path;
use viagent_vfs::{ContainerFs, HandleKind, VfsResult};

use crate::exclusion::ExclusionMatcher;
use crate::walker::DirectoryEntry;

/// What to do with one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Create or overwrite in the container.
    Add,
    /// Remove from the container.
    Delete,
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlanItem {
    /// Relative path.
    pub path: String,
    /// File or directory.
    pub kind: HandleKind,
    /// Operation to apply.
    pub operation: SyncOperation,
}

/// Counts of the `Add` items in a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Files to copy.
    pub total_files: usize,
    /// Directories to create.
    pub total_directories: usize,
}

/// Operations for one pass, in execution order.
///
/// Directory adds come before file adds so every parent exists before its
/// children are written. Deletes that clear a path whose kind changed come
/// first; other deletes come last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Name of the local root.
    pub source_root: String,
    /// Items in execution order.
    pub items: Vec<SyncPlanItem>,
    /// Add counts.
    pub stats: SyncStats,
}

/// An entry found in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Relative path.
    pub path: String,
    /// File or directory.
    pub kind: HandleKind,
}

impl SyncPlan {
    /// Build an add-only plan from walked entries.
    #[must_use]
    pub fn from_entries(source_root: impl Into<String>, entries: &[DirectoryEntry]) -> Self {
        let add = |e: &DirectoryEntry| SyncPlanItem {
            path: e.path.clone(),
            kind: e.kind,
            operation: SyncOperation::Add,
        };
        let dirs: Vec<SyncPlanItem> = entries
            .iter()
            .filter(|e| e.kind == HandleKind::Directory)
            .map(add)
            .collect();
        let files: Vec<SyncPlanItem> = entries
            .iter()
            .filter(|e| e.kind == HandleKind::File)
            .map(add)
            .collect();

        let stats = SyncStats {
            total_files: files.len(),
            total_directories: dirs.len(),
        };
        let mut items = dirs;
        items.extend(files);

        Self {
            source_root: source_root.into(),
            items,
            stats,
        }
    }

    /// Add deletes for container entries with no local counterpart.
    ///
    /// An entry whose kind differs from the local one (a file where a
    /// directory now is, or the reverse) counts as absent, and its delete
    /// is placed before every add so the path is free when recreated.
    /// Other deletes are appended. Excluded paths are left alone. A
    /// directory delete is recursive, so nothing under an already-deleted
    /// directory gets its own item.
    #[must_use]
    pub fn with_deletions(mut self, container: &[ContainerEntry], matcher: &ExclusionMatcher) -> Self {
        let local: HashMap<&str, HandleKind> = self
            .items
            .iter()
            .filter(|i| i.operation == SyncOperation::Add)
            .map(|i| (i.path.as_str(), i.kind))
            .collect();

        let mut sorted: Vec<&ContainerEntry> = container.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut deleted_dirs: Vec<String> = Vec::new();
        let mut conflicts = Vec::new();
        let mut deletes = Vec::new();
        for entry in sorted {
            let local_kind = local.get(entry.path.as_str()).copied();
            if local_kind == Some(entry.kind) || matcher.is_excluded(&entry.path) {
                continue;
            }
            if deleted_dirs.iter().any(|d| entry.path.starts_with(d.as_str())) {
                continue;
            }
            if entry.kind == HandleKind::Directory {
                deleted_dirs.push(format!("{}/", entry.path));
            }
            let item = SyncPlanItem {
                path: entry.path.clone(),
                kind: entry.kind,
                operation: SyncOperation::Delete,
            };
            if local_kind.is_some() {
                conflicts.push(item);
            } else {
                deletes.push(item);
            }
        }

        debug!(
            deletes = deletes.len(),
            kind_changes = conflicts.len(),
            "planned container deletions"
        );
        if !conflicts.is_empty() {
            conflicts.append(&mut self.items);
            self.items = conflicts;
        }
        self.items.extend(deletes);
        self
    }

    /// Total number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of delete items.
    #[must_use]
    pub fn deletions(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.operation == SyncOperation::Delete)
            .count()
    }
}

/// Recursively list the container, not entering excluded directories.
///
/// # Errors
///
/// Returns the first readdir failure.
pub async fn list_container_tree(
    fs: &dyn ContainerFs,
    matcher: &ExclusionMatcher,
) -> VfsResult<Vec<ContainerEntry>> {
    let mut out = Vec::new();
    let mut pending = vec![String::new()];

    while let Some(dir) = pending.pop() {
        for child in fs.readdir(&dir).await? {
            let path = join_path(&dir, &child.name);
            if matcher.is_excluded(&path) {
                continue;
            }
            if child.is_dir {
                pending.push(path.clone());
            }
            out.push(ContainerEntry {
                path,
                kind: if child.is_dir {
                    HandleKind::Directory
                } else {
                    HandleKind::File
                },
            });
        }
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use viagent_vfs::{EntryHandle, HostDirHandle, MemoryFs};

    async fn entry(dir: &tempfile::TempDir, path: &str, kind: HandleKind) -> DirectoryEntry {
        let handle = HostDirHandle::open(dir.path()).await.unwrap();
        DirectoryEntry {
            path: path.into(),
            kind,
            handle: EntryHandle::Directory(Arc::new(handle)),
        }
    }

    fn container(entries: &[(&str, HandleKind)]) -> Vec<ContainerEntry> {
        entries
            .iter()
            .map(|(p, k)| ContainerEntry {
                path: (*p).into(),
                kind: *k,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_directories_before_files() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            entry(&dir, "package.json", HandleKind::File).await,
            entry(&dir, "src", HandleKind::Directory).await,
            entry(&dir, "src/main.ts", HandleKind::File).await,
            entry(&dir, "src/lib", HandleKind::Directory).await,
        ];
        let plan = SyncPlan::from_entries("project", &entries);
        let paths: Vec<_> = plan.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["src", "src/lib", "package.json", "src/main.ts"]);
        assert_eq!(plan.stats.total_directories, 2);
        assert_eq!(plan.stats.total_files, 2);
        assert_eq!(plan.source_root, "project");
        assert_eq!(plan.deletions(), 0);
    }

    #[tokio::test]
    async fn test_deletions_skip_local_excluded_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            entry(&dir, "src", HandleKind::Directory).await,
            entry(&dir, "src/main.ts", HandleKind::File).await,
        ];
        let existing = container(&[
            ("src", HandleKind::Directory),
            ("src/main.ts", HandleKind::File),
            ("src/old.ts", HandleKind::File),
            ("stale", HandleKind::Directory),
            ("stale/a.ts", HandleKind::File),
            ("stale/deep", HandleKind::Directory),
            ("stale-file.txt", HandleKind::File),
            ("node_modules", HandleKind::Directory),
        ]);
        let matcher = ExclusionMatcher::new(&["node_modules"]);
        let plan = SyncPlan::from_entries("p", &entries).with_deletions(&existing, &matcher);

        let deletes: Vec<_> = plan
            .items
            .iter()
            .filter(|i| i.operation == SyncOperation::Delete)
            .map(|i| i.path.as_str())
            .collect();
        assert_eq!(deletes, vec!["src/old.ts", "stale", "stale-file.txt"]);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.stats.total_files, 1);
    }

    #[tokio::test]
    async fn test_kind_change_is_deleted_before_adds() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            entry(&dir, "lib", HandleKind::Directory).await,
            entry(&dir, "lib/a.ts", HandleKind::File).await,
            entry(&dir, "dist", HandleKind::File).await,
        ];
        let existing = container(&[
            ("dist", HandleKind::Directory),
            ("dist/bundle.js", HandleKind::File),
            ("lib", HandleKind::File),
            ("old.ts", HandleKind::File),
        ]);
        let matcher = ExclusionMatcher::new::<&str>(&[]);
        let plan = SyncPlan::from_entries("p", &entries).with_deletions(&existing, &matcher);

        let steps: Vec<_> = plan
            .items
            .iter()
            .map(|i| (i.operation, i.kind, i.path.as_str()))
            .collect();
        assert_eq!(
            steps,
            vec![
                (SyncOperation::Delete, HandleKind::Directory, "dist"),
                (SyncOperation::Delete, HandleKind::File, "lib"),
                (SyncOperation::Add, HandleKind::Directory, "lib"),
                (SyncOperation::Add, HandleKind::File, "lib/a.ts"),
                (SyncOperation::Add, HandleKind::File, "dist"),
                (SyncOperation::Delete, HandleKind::File, "old.ts"),
            ]
        );
        assert_eq!(plan.deletions(), 3);
    }

    #[tokio::test]
    async fn test_list_container_tree() {
        let fs = MemoryFs::new();
        fs.mkdir("src/lib", true).await.unwrap();
        fs.mkdir("node_modules/x", true).await.unwrap();
        fs.write_file("src/lib/a.ts", b"a").await.unwrap();
        fs.write_file("README.md", b"r").await.unwrap();

        let matcher = ExclusionMatcher::new(&["node_modules"]);
        let tree = list_container_tree(&fs, &matcher).await.unwrap();
        let paths: Vec<_> = tree.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src", "src/lib", "src/lib/a.ts"]);
        assert_eq!(tree[1].kind, HandleKind::Directory);
        assert_eq!(tree[0].kind, HandleKind::File);
    }
}
