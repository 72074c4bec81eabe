//! Shared helpers for sync integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use viagent_events::SyncEvent;
use viagent_sync::{LocalFsAdapter, SyncManager, SyncOptions};
use viagent_test::{CapturingSink, MemoryDirHandle, RecordingContainerFs, booted_container};
use viagent_vfs::{
    ContainerContext, DirectoryHandle, FileHandle, HandleEntry, PermissionMode, PermissionState,
    VfsResult,
};

/// Directory whose first listing blocks until [`GatedDir::open`] is called.
///
/// Lets a test hold a pass in flight at a known point.
#[derive(Debug)]
pub struct GatedDir {
    inner: Arc<MemoryDirHandle>,
    gate: Semaphore,
    entered: Notify,
}

impl GatedDir {
    pub fn new(inner: MemoryDirHandle) -> Self {
        Self {
            inner: Arc::new(inner),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Wait until a walk is blocked on this directory.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let every pending and future listing through.
    pub fn open(&self) {
        self.gate.add_permits(1024);
    }
}

#[async_trait]
impl DirectoryHandle for GatedDir {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn entries(&self) -> VfsResult<Vec<HandleEntry>> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await;
        self.inner.entries().await
    }

    async fn get_directory(&self, name: &str) -> VfsResult<Arc<dyn DirectoryHandle>> {
        self.inner.get_directory(name).await
    }

    async fn get_file(&self, name: &str) -> VfsResult<Arc<dyn FileHandle>> {
        self.inner.get_file(name).await
    }

    async fn query_permission(&self, mode: PermissionMode) -> VfsResult<PermissionState> {
        self.inner.query_permission(mode).await
    }

    async fn request_permission(&self, mode: PermissionMode) -> VfsResult<PermissionState> {
        self.inner.request_permission(mode).await
    }
}

/// A manager over a booted recording container.
pub struct ManagerHarness {
    pub manager: Arc<SyncManager>,
    pub adapter: Arc<LocalFsAdapter>,
    pub container: Arc<ContainerContext>,
    pub fs: Arc<RecordingContainerFs>,
    pub sink: Arc<CapturingSink>,
}

impl ManagerHarness {
    pub fn new(options: &SyncOptions) -> Self {
        let (container, fs) = booted_container();
        let adapter = Arc::new(LocalFsAdapter::new());
        let sink = Arc::new(CapturingSink::new());
        let manager = Arc::new(SyncManager::new(
            Arc::clone(&container),
            Arc::clone(&adapter),
            sink.clone(),
            options,
        ));
        Self {
            manager,
            adapter,
            container,
            fs,
            sink,
        }
    }

    /// Bind `root` as the local directory.
    pub fn bind(&self, root: Arc<dyn DirectoryHandle>) {
        self.adapter.set_directory_handle(root);
    }
}

/// Position of the first event with wire name `event_type`.
pub fn position(events: &[SyncEvent], event_type: &str) -> Option<usize> {
    events.iter().position(|e| e.event_type() == event_type)
}
