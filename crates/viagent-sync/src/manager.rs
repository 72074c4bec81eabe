//! Orchestrates sync passes: one at a time, with status and events.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use viagent_config::SyncSection;
use viagent_events::{EventSink, SyncEvent, SyncMode, SyncResult, SyncStatus};
use viagent_vfs::path::parent_path;
use viagent_vfs::{ContainerContext, DirectoryHandle, PermissionMode, validate_path};

use crate::adapter::LocalFsAdapter;
use crate::error::{FileSystemError, SyncError, SyncOutcome};
use crate::exclusion::{ExclusionMatcher, merge_exclusion_patterns, validate_patterns};
use crate::executor::{ExecutorOptions, execute_sync_plan};
use crate::plan::{SyncPlan, list_container_tree};
use crate::walker::walk_with_matcher;

const IDLE: u8 = 0;
const SYNCING: u8 = 1;
const ERROR: u8 = 2;

fn status_from(raw: u8) -> SyncStatus {
    match raw {
        SYNCING => SyncStatus::Syncing,
        ERROR => SyncStatus::Error,
        _ => SyncStatus::Idle,
    }
}

fn status_to(status: SyncStatus) -> u8 {
    match status {
        SyncStatus::Idle => IDLE,
        SyncStatus::Syncing => SYNCING,
        SyncStatus::Error => ERROR,
    }
}

/// Engine options, usually derived from the `[sync]` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Default pass mode.
    pub mode: SyncMode,
    /// User patterns, merged after the defaults.
    pub exclude_patterns: Vec<String>,
    /// Start from the extended default list.
    pub include_extended_defaults: bool,
    /// File copies in flight.
    pub concurrency: usize,
    /// Sync as soon as the container boots.
    pub auto_sync_on_boot: bool,
    /// Extra binary extensions.
    pub binary_extensions: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Incremental,
            exclude_patterns: Vec::new(),
            include_extended_defaults: false,
            concurrency: 1,
            auto_sync_on_boot: true,
            binary_extensions: Vec::new(),
        }
    }
}

impl SyncOptions {
    /// Build options from the `[sync]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] for the first bad pattern.
    pub fn from_section(section: &SyncSection) -> SyncOutcome<Self> {
        validate_patterns(&section.exclude_patterns)?;
        let mode = section.mode.parse::<SyncMode>().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to incremental sync");
            SyncMode::Incremental
        });
        Ok(Self {
            mode,
            exclude_patterns: section.exclude_patterns.clone(),
            include_extended_defaults: section.include_extended_defaults,
            concurrency: section.concurrency.max(1),
            auto_sync_on_boot: section.auto_sync_on_boot,
            binary_extensions: section.binary_extensions.clone(),
        })
    }

    /// Defaults merged with the user patterns.
    #[must_use]
    pub fn active_patterns(&self) -> Vec<String> {
        merge_exclusion_patterns(&self.exclude_patterns, self.include_extended_defaults)
    }
}

/// Outcome of a call to [`SyncManager::sync_to_container`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAttempt {
    /// The pass ran.
    Completed(SyncResult),
    /// Another pass was in flight; nothing was done.
    AlreadyRunning,
}

/// Holds the status gate and cancel slot for one pass. Dropping it
/// without [`finish`](Self::finish) quietly restores the previous status.
/// Either way the cancel slot is emptied, so an abandoned pass never
/// leaves a live token behind.
struct PassGuard<'a> {
    manager: &'a SyncManager,
    previous: u8,
    settled: bool,
}

impl PassGuard<'_> {
    fn arm(&self, token: CancellationToken) {
        *self.manager.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn disarm(&self) {
        self.manager
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn finish(mut self, status: SyncStatus) {
        self.disarm();
        self.settled = true;
        self.manager.set_status(status);
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.disarm();
            self.manager.status.store(self.previous, Ordering::SeqCst);
        }
    }
}

/// Runs sync passes from the bound local directory into the container.
///
/// At most one pass is in flight; a second request while one runs returns
/// [`SyncAttempt::AlreadyRunning`] without queueing.
pub struct SyncManager {
    container: Arc<ContainerContext>,
    adapter: Arc<LocalFsAdapter>,
    sink: Arc<dyn EventSink>,
    mode: SyncMode,
    concurrency: usize,
    patterns: RwLock<Vec<String>>,
    status: AtomicU8,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("mode", &self.mode)
            .field("status", &self.status())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl SyncManager {
    /// Create a manager. Patterns start as `options.active_patterns()`.
    #[must_use]
    pub fn new(
        container: Arc<ContainerContext>,
        adapter: Arc<LocalFsAdapter>,
        sink: Arc<dyn EventSink>,
        options: &SyncOptions,
    ) -> Self {
        Self {
            container,
            adapter,
            sink,
            mode: options.mode,
            concurrency: options.concurrency.max(1),
            patterns: RwLock::new(options.active_patterns()),
            status: AtomicU8::new(IDLE),
            last_sync: RwLock::new(None),
            cancel: Mutex::new(None),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        status_from(self.status.load(Ordering::SeqCst))
    }

    /// Default mode of this manager.
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// When the last pass completed.
    #[must_use]
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active exclusion patterns.
    #[must_use]
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the active exclusion patterns. A pass already running keeps
    /// the patterns it started with.
    pub fn set_exclude_patterns(&self, patterns: Vec<String>) {
        debug!(count = patterns.len(), "exclusion patterns updated");
        *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = patterns;
    }

    /// Cancel the pass in flight. Returns false if none is running.
    pub fn cancel(&self) -> bool {
        let token = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => {
                info!("cancelling sync");
                token.cancel();
                true
            },
            None => false,
        }
    }

    fn set_status(&self, status: SyncStatus) {
        let previous = self.status.swap(status_to(status), Ordering::SeqCst);
        if previous != status_to(status) {
            self.sink.emit(SyncEvent::StatusChanged { status });
        }
    }

    fn begin(&self) -> Option<PassGuard<'_>> {
        [IDLE, ERROR].into_iter().find_map(|from| {
            self.status
                .compare_exchange(from, SYNCING, Ordering::SeqCst, Ordering::SeqCst)
                .ok()
                .map(|previous| PassGuard {
                    manager: self,
                    previous,
                    settled: false,
                })
        })
    }

    /// Run one pass, in `mode` or the manager's default.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotBooted`] / [`SyncError::NoDirectory`]: nothing
    ///   emitted, status unchanged.
    /// - [`SyncError::PermissionDenied`]: status becomes `Error`.
    /// - [`SyncError::Cancelled`]: status returns to `Idle`.
    /// - Any other structural failure: status becomes `Error` and a
    ///   [`SyncEvent::Error`] without a file is emitted.
    pub async fn sync_to_container(&self, mode: Option<SyncMode>) -> SyncOutcome<SyncAttempt> {
        let Some(guard) = self.begin() else {
            debug!("sync already in progress, ignoring request");
            return Ok(SyncAttempt::AlreadyRunning);
        };

        if !self.container.is_booted() {
            debug!("container not booted, skipping sync");
            return Err(SyncError::NotBooted);
        }
        let root = self.adapter.directory_handle().ok_or(SyncError::NoDirectory)?;

        let state = self.adapter.refresh_permission(PermissionMode::Read).await?;
        if !state.is_granted() {
            let err = SyncError::PermissionDenied {
                directory: root.name().to_owned(),
                state,
            };
            warn!(directory = %root.name(), %state, "local directory not readable");
            self.sink.emit(SyncEvent::Error {
                error: err.to_string(),
                file: None,
            });
            guard.finish(SyncStatus::Error);
            return Err(err);
        }

        let mode = mode.unwrap_or(self.mode);
        self.sink.emit(SyncEvent::StatusChanged {
            status: SyncStatus::Syncing,
        });
        self.sink.emit(SyncEvent::Started {
            source_root: root.name().to_owned(),
            mode,
        });
        info!(directory = %root.name(), %mode, "sync started");

        let token = CancellationToken::new();
        guard.arm(token.clone());
        let outcome = self.run_pass(root, mode, token).await;

        match outcome {
            Ok(result) => {
                *self.last_sync.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
                self.sink.emit(SyncEvent::Completed(result.clone()));
                guard.finish(SyncStatus::Idle);
                Ok(SyncAttempt::Completed(result))
            },
            Err(e @ SyncError::Cancelled { .. }) => {
                guard.finish(SyncStatus::Idle);
                Err(e)
            },
            Err(e) => {
                error!(error = %e, "sync failed");
                self.sink.emit(SyncEvent::Error {
                    error: e.to_string(),
                    file: None,
                });
                guard.finish(SyncStatus::Error);
                Err(e)
            },
        }
    }

    async fn run_pass(
        &self,
        root: Arc<dyn DirectoryHandle>,
        mode: SyncMode,
        token: CancellationToken,
    ) -> SyncOutcome<SyncResult> {
        let matcher = ExclusionMatcher::new(&self.exclude_patterns());
        let entries: Vec<_> = walk_with_matcher(Arc::clone(&root), matcher.clone())
            .take_until(token.clone().cancelled_owned())
            .collect()
            .await;
        if token.is_cancelled() {
            info!("sync cancelled while walking");
            return Err(SyncError::Cancelled { synced: 0 });
        }

        let mut plan = SyncPlan::from_entries(root.name(), &entries);
        if mode == SyncMode::Full {
            let fs = self.container.file_system().ok_or(SyncError::NotBooted)?;
            let existing = list_container_tree(fs.as_ref(), &matcher).await?;
            plan = plan.with_deletions(&existing, &matcher);
        }
        debug!(
            files = plan.stats.total_files,
            directories = plan.stats.total_directories,
            deletions = plan.deletions(),
            "sync plan built"
        );

        let options = ExecutorOptions::default()
            .with_concurrency(self.concurrency)
            .with_cancel(token);
        execute_sync_plan(
            &plan,
            &self.adapter,
            &self.container,
            self.sink.as_ref(),
            &options,
        )
        .await
    }

    fn check_single_path(&self, path: &str) -> SyncOutcome<bool> {
        validate_path(path).map_err(|violation| FileSystemError::InvalidPath {
            path: path.to_owned(),
            violation,
        })?;
        if ExclusionMatcher::new(&self.exclude_patterns()).is_excluded(path) {
            debug!(path = %path, "path excluded, skipping");
            return Ok(false);
        }
        Ok(true)
    }

    /// Push one local file into the container, creating its parent
    /// directories. Returns false if the path is excluded.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid path, an unbooted container, or a
    /// failed read or write.
    pub async fn sync_file(&self, path: &str) -> SyncOutcome<bool> {
        if !self.check_single_path(path)? {
            return Ok(false);
        }
        let fs = self.container.file_system().ok_or(SyncError::NotBooted)?;
        let content = self.adapter.read_for_sync(path).await?;
        let parent = parent_path(path);
        if !parent.is_empty() {
            fs.mkdir(parent, true).await?;
        }
        fs.write_file(path, &content).await?;
        debug!(path = %path, bytes = content.len(), "file synced");
        self.sink.emit(SyncEvent::FileModified {
            path: path.to_owned(),
        });
        Ok(true)
    }

    /// Remove one path from the container. Returns false if it is excluded
    /// or not there.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid path, an unbooted container, or a
    /// failed removal.
    pub async fn delete_from_container(&self, path: &str) -> SyncOutcome<bool> {
        if !self.check_single_path(path)? {
            return Ok(false);
        }
        let fs = self.container.file_system().ok_or(SyncError::NotBooted)?;
        if !fs.exists(path).await? {
            return Ok(false);
        }
        fs.rm(path, true).await?;
        debug!(path = %path, "removed from container");
        self.sink.emit(SyncEvent::FileDeleted {
            path: path.to_owned(),
        });
        Ok(true)
    }
}
