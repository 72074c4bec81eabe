//! Lazy depth-first enumeration of a local handle tree.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tracing::{trace, warn};
use viagent_vfs::path::join_path;
use viagent_vfs::{DirectoryHandle, EntryHandle, HandleEntry, HandleKind};

use crate::exclusion::ExclusionMatcher;

/// One file or directory found by a walk.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Path relative to the walk root, `/`-separated.
    pub path: String,
    /// File or directory.
    pub kind: HandleKind,
    /// Handle on the entry.
    pub handle: EntryHandle,
}

/// Stream of entries produced by [`walk_directory`].
pub type EntryStream = BoxStream<'static, DirectoryEntry>;

struct Frame {
    prefix: String,
    dir: Arc<dyn DirectoryHandle>,
    pending: Option<std::vec::IntoIter<HandleEntry>>,
}

struct WalkState {
    matcher: ExclusionMatcher,
    stack: Vec<Frame>,
}

/// Walk `root`, skipping anything matched by `patterns`.
///
/// The patterns are compiled once up front, so the walk is unaffected by
/// later pattern changes.
#[must_use]
pub fn walk_directory<S: AsRef<str>>(root: Arc<dyn DirectoryHandle>, patterns: &[S]) -> EntryStream {
    walk_with_matcher(root, ExclusionMatcher::new(patterns))
}

/// Walk `root` with a pre-compiled matcher.
///
/// Pre-order: a directory is yielded before its contents, and its children
/// are only listed when the walk reaches them. Siblings come in name order.
/// Excluded directories are never listed. A directory that cannot be listed
/// is logged and treated as empty. Every call re-reads the tree.
#[must_use]
pub fn walk_with_matcher(root: Arc<dyn DirectoryHandle>, matcher: ExclusionMatcher) -> EntryStream {
    let state = WalkState {
        matcher,
        stack: vec![Frame {
            prefix: String::new(),
            dir: root,
            pending: None,
        }],
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let frame = state.stack.last_mut()?;

            if frame.pending.is_none() {
                let mut entries = match frame.dir.entries().await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(
                            path = %frame.prefix,
                            error = %e,
                            "failed to list directory, skipping its contents"
                        );
                        Vec::new()
                    },
                };
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                frame.pending = Some(entries.into_iter());
            }

            let Some(entry) = frame.pending.as_mut().and_then(Iterator::next) else {
                state.stack.pop();
                continue;
            };

            let path = join_path(&frame.prefix, &entry.name);
            if state.matcher.is_excluded(&path) {
                trace!(path = %path, "excluded");
                continue;
            }

            if let EntryHandle::Directory(dir) = &entry.handle {
                state.stack.push(Frame {
                    prefix: path.clone(),
                    dir: Arc::clone(dir),
                    pending: None,
                });
            }

            let found = DirectoryEntry {
                path,
                kind: entry.kind(),
                handle: entry.handle,
            };
            return Some((found, state));
        }
    })
    .boxed()
}

/// Run a whole walk and collect the entries.
pub async fn collect_entries<S: AsRef<str>>(
    root: Arc<dyn DirectoryHandle>,
    patterns: &[S],
) -> Vec<DirectoryEntry> {
    walk_directory(root, patterns).collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use viagent_vfs::HostDirHandle;

    async fn host_tree() -> (tempfile::TempDir, Arc<dyn DirectoryHandle>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/components")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/react")).unwrap();
        std::fs::write(root.join("package.json"), "{}").unwrap();
        std::fs::write(root.join("src/main.ts"), "main").unwrap();
        std::fs::write(root.join("src/components/App.tsx"), "app").unwrap();
        std::fs::write(root.join("node_modules/react/index.js"), "react").unwrap();
        std::fs::write(root.join("debug.log"), "log").unwrap();
        let handle: Arc<dyn DirectoryHandle> = Arc::new(HostDirHandle::open(root).await.unwrap());
        (dir, handle)
    }

    #[tokio::test]
    async fn test_walk_is_preorder_sorted_and_filtered() {
        let (_dir, root) = host_tree().await;
        let entries = collect_entries(root, &["node_modules", "*.log"]).await;
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "package.json",
                "src",
                "src/components",
                "src/components/App.tsx",
                "src/main.ts",
            ]
        );
        assert_eq!(entries[1].kind, HandleKind::Directory);
        assert_eq!(entries[0].kind, HandleKind::File);
    }

    #[tokio::test]
    async fn test_walk_without_patterns_sees_everything() {
        let (_dir, root) = host_tree().await;
        let none: [&str; 0] = [];
        let entries = collect_entries(root, &none).await;
        assert_eq!(entries.len(), 9);
        assert!(entries.iter().any(|e| e.path == "node_modules/react/index.js"));
    }

    #[tokio::test]
    async fn test_walk_restarts_and_sees_new_files() {
        let (dir, root) = host_tree().await;
        let none: [&str; 0] = [];
        let first = collect_entries(Arc::clone(&root), &none).await.len();
        std::fs::write(dir.path().join("src/extra.ts"), "x").unwrap();
        let second = collect_entries(root, &none).await.len();
        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn test_walk_is_lazy() {
        let (_dir, root) = host_tree().await;
        let mut stream = walk_directory(root, &["node_modules"]);
        let first = stream.next().await.unwrap();
        assert_eq!(first.path, "debug.log");
    }
}
