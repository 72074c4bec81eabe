//! Mock implementations for testing.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use viagent_events::{EventSink, SyncEvent, SyncProgress};
use viagent_vfs::{
    ContainerFs, DirectoryHandle, EntryHandle, FileHandle, HandleEntry, HandleReference,
    MemoryFs, PermissionMode, PermissionState, VfsDirEntry, VfsError, VfsResult,
};

/// How a [`MemoryDirHandle`] answers permission calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionBehavior {
    /// The permission API does not exist.
    Unsupported,
    /// The call fails with this message.
    Error(String),
    /// The call answers this state.
    State(PermissionState),
}

/// In-memory file handle.
#[derive(Debug)]
pub struct MemoryFileHandle {
    name: String,
    content: Vec<u8>,
    failure: Option<String>,
}

impl MemoryFileHandle {
    /// File with `content`.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            failure: None,
        }
    }

    /// File whose every read fails with `message`.
    #[must_use]
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl FileHandle for MemoryFileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> VfsResult<Vec<u8>> {
        match &self.failure {
            Some(message) => Err(VfsError::PermissionDenied(message.clone())),
            None => Ok(self.content.clone()),
        }
    }
}

#[derive(Debug, Clone)]
enum Child {
    File(Arc<MemoryFileHandle>),
    Dir(Arc<MemoryDirHandle>),
}

/// In-memory directory handle tree with failure injection and scripted
/// permission answers.
///
/// Builder methods take a `/`-separated path relative to this directory and
/// create missing intermediate directories.
#[derive(Debug)]
pub struct MemoryDirHandle {
    name: String,
    children: Mutex<BTreeMap<String, Child>>,
    list_fails: AtomicBool,
    query: Mutex<PermissionBehavior>,
    request: Mutex<PermissionBehavior>,
    query_calls: AtomicUsize,
    request_calls: AtomicUsize,
    lookups: AtomicUsize,
}

impl MemoryDirHandle {
    /// Empty directory that grants every permission.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Mutex::new(BTreeMap::new()),
            list_fails: AtomicBool::new(false),
            query: Mutex::new(PermissionBehavior::State(PermissionState::Granted)),
            request: Mutex::new(PermissionBehavior::State(PermissionState::Granted)),
            query_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Add a file.
    #[must_use]
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Add a file whose reads fail.
    #[must_use]
    pub fn with_failing_file(self, path: &str, message: impl Into<String>) -> Self {
        self.add_failing_file(path, message);
        self
    }

    /// Add an empty directory.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        self.add_dir(path);
        self
    }

    /// Script the permission query and request answers.
    #[must_use]
    pub fn with_permission(self, query: PermissionBehavior, request: PermissionBehavior) -> Self {
        self.set_query_permission(query);
        self.set_request_permission(request);
        self
    }

    /// Add or replace a file.
    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let (parent, name) = self.parent_of(path);
        parent.insert(
            name,
            Child::File(Arc::new(MemoryFileHandle::new(name, content))),
        );
    }

    /// Add or replace a file whose reads fail with `message`.
    pub fn add_failing_file(&self, path: &str, message: impl Into<String>) {
        let (parent, name) = self.parent_of(path);
        parent.insert(
            name,
            Child::File(Arc::new(MemoryFileHandle::failing(name, message))),
        );
    }

    /// Add a directory (and its parents).
    pub fn add_dir(&self, path: &str) {
        let mut dir = self.root_ref();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            dir = dir.child_dir(segment);
        }
    }

    /// Remove an entry. Returns true if it existed.
    pub fn remove(&self, path: &str) -> bool {
        let (parent, name) = self.parent_of(path);
        parent
            .handle()
            .children
            .lock()
            .map(|mut c| c.remove(name).is_some())
            .unwrap_or(false)
    }

    /// Make listing this directory fail (or succeed again).
    pub fn set_list_fails(&self, fails: bool) {
        self.list_fails.store(fails, Ordering::SeqCst);
    }

    /// Change the permission query answer.
    pub fn set_query_permission(&self, behavior: PermissionBehavior) {
        if let Ok(mut guard) = self.query.lock() {
            *guard = behavior;
        }
    }

    /// Change the permission request answer.
    pub fn set_request_permission(&self, behavior: PermissionBehavior) {
        if let Ok(mut guard) = self.request.lock() {
            *guard = behavior;
        }
    }

    /// Number of permission queries so far.
    #[must_use]
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Number of permission requests so far.
    #[must_use]
    pub fn request_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    /// Number of `entries`, `get_directory` and `get_file` calls on this
    /// directory (children count separately).
    #[must_use]
    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Sub-directory at `path`, if present.
    #[must_use]
    pub fn dir(&self, path: &str) -> Option<Arc<MemoryDirHandle>> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut dir = match self.children.lock().ok()?.get(first)? {
            Child::Dir(d) => Arc::clone(d),
            Child::File(_) => return None,
        };
        for segment in segments {
            let next = match dir.children.lock().ok()?.get(segment)? {
                Child::Dir(d) => Arc::clone(d),
                Child::File(_) => return None,
            };
            dir = next;
        }
        Some(dir)
    }

    fn root_ref(&self) -> DirRef<'_> {
        DirRef::Root(self)
    }

    fn parent_of<'p>(&self, path: &'p str) -> (DirRef<'_>, &'p str) {
        let trimmed = path.trim_matches('/');
        let (parents, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        let mut dir = self.root_ref();
        for segment in parents.split('/').filter(|s| !s.is_empty()) {
            dir = dir.child_dir(segment);
        }
        (dir, name)
    }

    fn answer(behavior: &Mutex<PermissionBehavior>) -> VfsResult<PermissionState> {
        let behavior = behavior
            .lock()
            .map(|b| b.clone())
            .unwrap_or(PermissionBehavior::Unsupported);
        match behavior {
            PermissionBehavior::Unsupported => {
                Err(VfsError::Unsupported("permission API".into()))
            },
            PermissionBehavior::Error(message) => {
                Err(VfsError::Io(std::io::Error::other(message)))
            },
            PermissionBehavior::State(state) => Ok(state),
        }
    }
}

/// Either the root (borrowed) or a nested directory (shared).
enum DirRef<'a> {
    Root(&'a MemoryDirHandle),
    Nested(Arc<MemoryDirHandle>),
}

impl DirRef<'_> {
    fn handle(&self) -> &MemoryDirHandle {
        match self {
            Self::Root(d) => d,
            Self::Nested(d) => d.as_ref(),
        }
    }

    fn child_dir(self, name: &str) -> Self {
        let mut children = self
            .handle()
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let dir = match children.get(name) {
            Some(Child::Dir(d)) => Arc::clone(d),
            _ => {
                let d = Arc::new(MemoryDirHandle::new(name));
                children.insert(name.to_owned(), Child::Dir(Arc::clone(&d)));
                d
            },
        };
        drop(children);
        DirRef::Nested(dir)
    }

    fn insert(&self, name: &str, child: Child) {
        self.handle()
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), child);
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> VfsResult<Vec<HandleEntry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(VfsError::PermissionDenied(format!(
                "cannot list '{}'",
                self.name
            )));
        }
        let children = self
            .children
            .lock()
            .map_err(|e| VfsError::Io(std::io::Error::other(e.to_string())))?;
        Ok(children
            .iter()
            .map(|(name, child)| HandleEntry {
                name: name.clone(),
                handle: match child {
                    Child::File(f) => EntryHandle::File(Arc::clone(f) as Arc<dyn FileHandle>),
                    Child::Dir(d) => EntryHandle::Directory(Arc::clone(d) as Arc<dyn DirectoryHandle>),
                },
            })
            .collect())
    }

    async fn get_directory(&self, name: &str) -> VfsResult<Arc<dyn DirectoryHandle>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let children = self
            .children
            .lock()
            .map_err(|e| VfsError::Io(std::io::Error::other(e.to_string())))?;
        match children.get(name) {
            Some(Child::Dir(d)) => Ok(Arc::clone(d) as Arc<dyn DirectoryHandle>),
            Some(Child::File(_)) => Err(VfsError::NotADirectory(name.to_owned())),
            None => Err(VfsError::NotFound(name.to_owned())),
        }
    }

    async fn get_file(&self, name: &str) -> VfsResult<Arc<dyn FileHandle>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let children = self
            .children
            .lock()
            .map_err(|e| VfsError::Io(std::io::Error::other(e.to_string())))?;
        match children.get(name) {
            Some(Child::File(f)) => Ok(Arc::clone(f) as Arc<dyn FileHandle>),
            Some(Child::Dir(_)) => Err(VfsError::IsADirectory(name.to_owned())),
            None => Err(VfsError::NotFound(name.to_owned())),
        }
    }

    async fn query_permission(&self, _mode: PermissionMode) -> VfsResult<PermissionState> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.query)
    }

    async fn request_permission(&self, _mode: PermissionMode) -> VfsResult<PermissionState> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.request)
    }

    fn reference(&self) -> Option<HandleReference> {
        Some(HandleReference {
            kind: "memory".into(),
            name: self.name.clone(),
            location: format!("memory://{}", self.name),
        })
    }
}

/// Container filesystem that records writes and can fail chosen paths.
///
/// Backed by a [`MemoryFs`], so every other call behaves normally.
#[derive(Debug, Default)]
pub struct RecordingContainerFs {
    inner: MemoryFs,
    writes: Mutex<Vec<String>>,
    removals: Mutex<Vec<String>>,
    failing_writes: Mutex<HashSet<String>>,
}

impl RecordingContainerFs {
    /// Empty recording filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing filesystem.
    #[must_use]
    pub fn inner(&self) -> &MemoryFs {
        &self.inner
    }

    /// Make writes to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<String>) {
        if let Ok(mut guard) = self.failing_writes.lock() {
            guard.insert(path.into());
        }
    }

    /// Number of `write_file` calls, failed ones included.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or_default()
    }

    /// Paths passed to `write_file`, in call order.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Paths passed to `rm`, in call order.
    #[must_use]
    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContainerFs for RecordingContainerFs {
    async fn write_file(&self, path: &str, content: &[u8]) -> VfsResult<()> {
        if let Ok(mut guard) = self.writes.lock() {
            guard.push(path.to_owned());
        }
        let fails = self
            .failing_writes
            .lock()
            .map(|f| f.contains(path))
            .unwrap_or(false);
        if fails {
            return Err(VfsError::Io(std::io::Error::other(format!(
                "injected write failure: {path}"
            ))));
        }
        self.inner.write_file(path, content).await
    }

    async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        self.inner.read_file(path).await
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> VfsResult<()> {
        self.inner.mkdir(path, recursive).await
    }

    async fn rm(&self, path: &str, recursive: bool) -> VfsResult<()> {
        if let Ok(mut guard) = self.removals.lock() {
            guard.push(path.to_owned());
        }
        self.inner.rm(path, recursive).await
    }

    async fn readdir(&self, path: &str) -> VfsResult<Vec<VfsDirEntry>> {
        self.inner.readdir(path).await
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        self.inner.exists(path).await
    }
}

/// Event sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct CapturingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl CapturingSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Wire names of all events, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(SyncEvent::event_type)
            .collect()
    }

    /// Progress payloads, in emission order.
    #[must_use]
    pub fn progress(&self) -> Vec<SyncProgress> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SyncEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// `(error, file)` pairs of error events, in emission order.
    #[must_use]
    pub fn errors(&self) -> Vec<(String, Option<String>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SyncEvent::Error { error, file } => Some((error, file)),
                _ => None,
            })
            .collect()
    }

    /// Number of events with wire name `event_type`.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.event_types()
            .into_iter()
            .filter(|t| *t == event_type)
            .count()
    }

    /// Forget captured events.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

impl EventSink for CapturingSink {
    fn emit(&self, event: SyncEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_tree_builder() {
        let root = MemoryDirHandle::new("project")
            .with_file("src/main.ts", "main")
            .with_dir("empty/inner")
            .with_failing_file("src/bad.ts", "boom");

        let names: Vec<_> = root.entries().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["empty", "src"]);

        let src = root.get_directory("src").await.unwrap();
        let main = src.get_file("main.ts").await.unwrap();
        assert_eq!(main.read().await.unwrap(), b"main");
        let bad = src.get_file("bad.ts").await.unwrap();
        assert!(bad.read().await.is_err());

        assert!(root.dir("empty/inner").is_some());
        assert!(root.remove("src/bad.ts"));
        assert!(!root.remove("src/bad.ts"));
    }

    #[tokio::test]
    async fn test_permission_script() {
        let root = MemoryDirHandle::new("p").with_permission(
            PermissionBehavior::State(PermissionState::Prompt),
            PermissionBehavior::Error("denied by user".into()),
        );
        assert_eq!(
            root.query_permission(PermissionMode::Read).await.unwrap(),
            PermissionState::Prompt
        );
        assert!(root.request_permission(PermissionMode::Read).await.is_err());
        assert_eq!(root.query_calls(), 1);
        assert_eq!(root.request_calls(), 1);

        root.set_query_permission(PermissionBehavior::Unsupported);
        assert!(matches!(
            root.query_permission(PermissionMode::Read).await,
            Err(VfsError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_recording_fs_counts_and_fails_writes() {
        let fs = RecordingContainerFs::new();
        fs.fail_writes_to("bad.ts");
        fs.write_file("ok.ts", b"ok").await.unwrap();
        assert!(fs.write_file("bad.ts", b"x").await.is_err());
        assert_eq!(fs.write_count(), 2);
        assert_eq!(fs.inner().file_count(), 1);
    }

    #[test]
    fn test_capturing_sink() {
        let sink = CapturingSink::new();
        sink.emit(SyncEvent::FileModified { path: "a".into() });
        sink.emit(SyncEvent::Error {
            error: "x".into(),
            file: None,
        });
        assert_eq!(sink.event_types(), vec!["file:modified", "sync:error"]);
        assert_eq!(sink.count("sync:error"), 1);
        assert_eq!(sink.errors(), vec![("x".to_owned(), None)]);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
