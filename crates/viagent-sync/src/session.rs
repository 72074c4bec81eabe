//! One open project: container, local directory, manager and saved state.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use viagent_events::{EventSink, SyncStatus};
use viagent_storage::{KvStore, ScopedKvStore};
use viagent_vfs::{ContainerContext, ContainerFs, DirectoryHandle, PermissionState};

use crate::adapter::LocalFsAdapter;
use crate::error::{SyncError, SyncOutcome};
use crate::exclusion::{merge_exclusion_patterns, parse_pattern_input, validate_patterns};
use crate::manager::{SyncAttempt, SyncManager, SyncOptions};
use crate::permission::{
    ensure_read_write_permission, restore_directory_handle, save_directory_handle_reference,
};

/// Storage namespace for project metadata.
pub const PROJECTS_NAMESPACE: &str = "projects";

/// Saved per-project state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Project id, also the key of its saved directory handle.
    pub id: String,
    /// Display name.
    pub name: String,
    /// User exclusion patterns for this project.
    #[serde(default)]
    pub exclusion_patterns: Vec<String>,
    /// When the last pass completed.
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl ProjectMetadata {
    /// Fresh metadata with no patterns and no sync yet.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            exclusion_patterns: Vec::new(),
            last_sync_time: None,
        }
    }
}

/// Wires a project's container, local directory and sync manager together
/// and keeps its metadata in storage.
pub struct WorkspaceSession {
    project: RwLock<ProjectMetadata>,
    projects: ScopedKvStore,
    store: Arc<dyn KvStore>,
    container: Arc<ContainerContext>,
    adapter: Arc<LocalFsAdapter>,
    manager: SyncManager,
    options: SyncOptions,
}

impl std::fmt::Debug for WorkspaceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSession")
            .field("project", &self.project_id())
            .field("booted", &self.container.is_booted())
            .field("directory", &self.adapter.has_directory())
            .finish_non_exhaustive()
    }
}

impl WorkspaceSession {
    /// Open a project, loading its metadata (or creating it) and restoring
    /// its saved directory handle when it still resolves.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the metadata cannot be read or
    /// written.
    pub async fn open(
        project_id: &str,
        name: &str,
        store: Arc<dyn KvStore>,
        sink: Arc<dyn EventSink>,
        options: SyncOptions,
    ) -> SyncOutcome<Self> {
        let projects = ScopedKvStore::new(Arc::clone(&store), PROJECTS_NAMESPACE)?;
        let project = match projects.get_json::<ProjectMetadata>(project_id).await? {
            Some(project) => {
                debug!(project = %project_id, "loaded project metadata");
                project
            },
            None => {
                let project = ProjectMetadata::new(project_id, name);
                projects.set_json(project_id, &project).await?;
                info!(project = %project_id, "created project metadata");
                project
            },
        };

        let container = Arc::new(ContainerContext::new());
        let adapter = Arc::new(LocalFsAdapter::with_binary_extensions(
            &options.binary_extensions,
        ));
        if let Some(handle) = restore_directory_handle(&store, Some(project_id)).await {
            adapter.set_directory_handle(handle);
        }

        let manager = SyncManager::new(
            Arc::clone(&container),
            Arc::clone(&adapter),
            sink,
            &options,
        );
        let session = Self {
            project: RwLock::new(project),
            projects,
            store,
            container,
            adapter,
            manager,
            options,
        };
        session.apply_patterns();
        Ok(session)
    }

    fn apply_patterns(&self) {
        let custom: Vec<String> = self
            .options
            .exclude_patterns
            .iter()
            .chain(self.project().exclusion_patterns.iter())
            .cloned()
            .collect();
        self.manager.set_exclude_patterns(merge_exclusion_patterns(
            &custom,
            self.options.include_extended_defaults,
        ));
    }

    async fn save_project(&self) -> SyncOutcome<()> {
        let project = self.project();
        self.projects.set_json(&project.id, &project).await?;
        Ok(())
    }

    /// Snapshot of the project metadata.
    #[must_use]
    pub fn project(&self) -> ProjectMetadata {
        self.project
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn project_id(&self) -> String {
        self.project
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .id
            .clone()
    }

    /// The container context of this session.
    #[must_use]
    pub fn container(&self) -> &Arc<ContainerContext> {
        &self.container
    }

    /// The local file system adapter.
    #[must_use]
    pub fn adapter(&self) -> &Arc<LocalFsAdapter> {
        &self.adapter
    }

    /// The sync manager.
    #[must_use]
    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }

    /// Current sync status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.manager.status()
    }

    /// Mark the container as booted and, if configured and a directory is
    /// bound, run the initial sync.
    ///
    /// Returns `None` when no initial sync was attempted.
    ///
    /// # Errors
    ///
    /// Propagates the error of the initial sync.
    pub async fn on_container_booted(
        &self,
        fs: Arc<dyn ContainerFs>,
    ) -> SyncOutcome<Option<SyncAttempt>> {
        self.container.boot(fs);
        if !self.options.auto_sync_on_boot {
            debug!("auto sync on boot disabled");
            return Ok(None);
        }
        if !self.adapter.has_directory() {
            debug!("no directory bound, skipping initial sync");
            return Ok(None);
        }
        info!(project = %self.project_id(), "running initial sync");
        self.sync().await.map(Some)
    }

    /// Bind `handle` as the project directory once read-write access is
    /// granted, and remember it for the next session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PermissionDenied`] if access is not granted; the
    /// previous binding is kept.
    pub async fn attach_directory(
        &self,
        handle: Arc<dyn DirectoryHandle>,
    ) -> SyncOutcome<PermissionState> {
        let state = ensure_read_write_permission(handle.as_ref()).await;
        if !state.is_granted() {
            return Err(SyncError::PermissionDenied {
                directory: handle.name().to_owned(),
                state,
            });
        }

        let id = self.project_id();
        if !save_directory_handle_reference(&self.store, handle.as_ref(), Some(&id)).await {
            warn!(project = %id, "directory handle will not survive this session");
        }
        self.adapter.set_directory_handle(handle);
        Ok(state)
    }

    /// Run a pass and record its completion time in the project metadata.
    ///
    /// # Errors
    ///
    /// See [`SyncManager::sync_to_container`]; also fails if the metadata
    /// cannot be saved.
    pub async fn sync(&self) -> SyncOutcome<SyncAttempt> {
        let attempt = self.manager.sync_to_container(None).await?;
        if matches!(attempt, SyncAttempt::Completed(_)) {
            let completed = self.manager.last_sync_time();
            self.project
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .last_sync_time = completed;
            self.save_project().await?;
        }
        Ok(attempt)
    }

    /// Replace the project's exclusion patterns from free-form input
    /// (comma or newline separated). Returns the new active list.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] for the first bad pattern; in
    /// that case nothing changes.
    pub async fn update_exclusions(&self, text: &str) -> SyncOutcome<Vec<String>> {
        let patterns = parse_pattern_input(text);
        validate_patterns(&patterns)?;
        self.project
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .exclusion_patterns = patterns;
        self.save_project().await?;
        self.apply_patterns();
        Ok(self.manager.exclude_patterns())
    }

    /// Tear down the container and release the local directory. The saved
    /// handle reference is kept for the next session.
    pub fn close(&self) {
        if self.manager.cancel() {
            debug!("cancelled in-flight sync on close");
        }
        self.container.teardown();
        self.adapter.clear();
        info!(project = %self.project_id(), "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viagent_storage::MemoryKvStore;
    use viagent_test::{CapturingSink, MemoryDirHandle, PermissionBehavior, RecordingContainerFs};
    use viagent_vfs::HostDirHandle;

    fn store() -> Arc<dyn KvStore> {
        Arc::new(MemoryKvStore::new())
    }

    #[tokio::test]
    async fn test_open_creates_and_reloads_metadata() {
        let store = store();
        let session = WorkspaceSession::open(
            "proj",
            "Project",
            Arc::clone(&store),
            Arc::new(CapturingSink::new()),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(session.project(), ProjectMetadata::new("proj", "Project"));
        session.update_exclusions("*.tmp, coverage\nvendor").await.unwrap();

        let reopened = WorkspaceSession::open(
            "proj",
            "Ignored",
            store,
            Arc::new(CapturingSink::new()),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(reopened.project().name, "Project");
        assert_eq!(
            reopened.project().exclusion_patterns,
            vec!["*.tmp", "coverage", "vendor"]
        );
        assert!(reopened.manager().exclude_patterns().contains(&"vendor".to_owned()));
    }

    #[tokio::test]
    async fn test_invalid_exclusions_change_nothing() {
        let session = WorkspaceSession::open(
            "p",
            "P",
            store(),
            Arc::new(CapturingSink::new()),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        let before = session.manager().exclude_patterns();
        assert!(matches!(
            session.update_exclusions("ok, bad|pattern").await,
            Err(SyncError::InvalidPattern { .. })
        ));
        assert_eq!(session.manager().exclude_patterns(), before);
        assert!(session.project().exclusion_patterns.is_empty());
    }

    #[tokio::test]
    async fn test_attach_requires_grant() {
        let session = WorkspaceSession::open(
            "p",
            "P",
            store(),
            Arc::new(CapturingSink::new()),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        let denied = Arc::new(MemoryDirHandle::new("d").with_permission(
            PermissionBehavior::State(PermissionState::Prompt),
            PermissionBehavior::State(PermissionState::Denied),
        ));
        let err = session.attach_directory(denied).await.unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied { .. }));
        assert!(!session.adapter().has_directory());
    }

    #[tokio::test]
    async fn test_boot_then_initial_sync_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.ts"), "main").unwrap();
        let store = store();

        let session = WorkspaceSession::open(
            "p",
            "P",
            Arc::clone(&store),
            Arc::new(CapturingSink::new()),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        let handle = Arc::new(HostDirHandle::open(dir.path()).await.unwrap());
        assert_eq!(
            session.attach_directory(handle).await.unwrap(),
            PermissionState::Granted
        );

        let fs = Arc::new(RecordingContainerFs::new());
        let attempt = session.on_container_booted(fs.clone()).await.unwrap();
        assert!(matches!(attempt, Some(SyncAttempt::Completed(_))));
        assert_eq!(fs.writes(), vec!["src/main.ts"]);
        assert!(session.project().last_sync_time.is_some());

        session.close();
        assert!(!session.container().is_booted());
        assert!(!session.adapter().has_directory());

        let reopened = WorkspaceSession::open(
            "p",
            "P",
            store,
            Arc::new(CapturingSink::new()),
            SyncOptions::default(),
        )
        .await
        .unwrap();
        assert!(reopened.adapter().has_directory());
        assert!(reopened.project().last_sync_time.is_some());
    }

    #[tokio::test]
    async fn test_boot_without_auto_sync() {
        let session = WorkspaceSession::open(
            "p",
            "P",
            store(),
            Arc::new(CapturingSink::new()),
            SyncOptions {
                auto_sync_on_boot: false,
                ..SyncOptions::default()
            },
        )
        .await
        .unwrap();
        session
            .attach_directory(Arc::new(MemoryDirHandle::new("d").with_file("a.ts", "a")))
            .await
            .unwrap();
        let attempt = session
            .on_container_booted(Arc::new(RecordingContainerFs::new()))
            .await
            .unwrap();
        assert!(attempt.is_none());
        assert!(session.container().is_booted());
    }
}
