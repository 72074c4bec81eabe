//! Applies a [`SyncPlan`] to the container filesystem.

use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use viagent_events::{EventSink, SyncEvent, SyncProgress, SyncResult};
use viagent_vfs::{ContainerContext, ContainerFs, HandleKind, PathViolation, VfsError, validate_path};

use crate::adapter::LocalFsAdapter;
use crate::error::{FileSystemError, SyncError, SyncOutcome};
use crate::plan::{SyncOperation, SyncPlan, SyncPlanItem};

/// Knobs for one execution.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Files copied at once within a run of consecutive file adds.
    pub concurrency: usize,
    /// Stops the pass before the next item once cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            cancel: None,
        }
    }
}

impl ExecutorOptions {
    /// Set the file copy concurrency (clamped to at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

#[derive(Debug, Error)]
enum ItemError {
    #[error("invalid path: {0}")]
    Path(#[from] PathViolation),

    #[error(transparent)]
    Read(#[from] FileSystemError),

    #[error("container operation failed: {0}")]
    Container(#[from] VfsError),
}

struct Tally<'a> {
    sink: &'a dyn EventSink,
    total: usize,
    processed: usize,
    synced: usize,
    failed: Vec<String>,
}

impl Tally<'_> {
    fn record(&mut self, item: &SyncPlanItem, outcome: Result<(), ItemError>) {
        self.processed = self.processed.saturating_add(1);
        match outcome {
            Ok(()) => {
                self.synced = self.synced.saturating_add(1);
                debug!(path = %item.path, op = ?item.operation, "applied");
                self.sink.emit(SyncEvent::Progress(
                    SyncProgress::new(self.total, self.synced, item.path.as_str())
                        .with_processed(self.processed),
                ));
            },
            Err(e) => {
                warn!(path = %item.path, op = ?item.operation, error = %e, "sync item failed");
                self.failed.push(item.path.clone());
                self.sink.emit(SyncEvent::Error {
                    error: e.to_string(),
                    file: Some(item.path.clone()),
                });
            },
        }
    }
}

fn is_file_add(item: &SyncPlanItem) -> bool {
    item.operation == SyncOperation::Add && item.kind == HandleKind::File
}

async fn apply_item(
    item: &SyncPlanItem,
    adapter: &LocalFsAdapter,
    fs: &dyn ContainerFs,
) -> Result<(), ItemError> {
    validate_path(&item.path)?;
    match (item.operation, item.kind) {
        (SyncOperation::Add, HandleKind::Directory) => fs.mkdir(&item.path, true).await?,
        (SyncOperation::Add, HandleKind::File) => {
            let content = adapter.read_for_sync(&item.path).await?;
            fs.write_file(&item.path, &content).await?;
        },
        (SyncOperation::Delete, HandleKind::File) => fs.rm(&item.path, false).await?,
        (SyncOperation::Delete, HandleKind::Directory) => fs.rm(&item.path, true).await?,
    }
    Ok(())
}

/// Apply every item of `plan`, in order, to the container.
///
/// A failing item is recorded in `failed_files`, reported as a
/// [`SyncEvent::Error`] naming the file, and the pass moves on. Each
/// success emits a [`SyncEvent::Progress`].
///
/// # Errors
///
/// Returns [`SyncError::NotBooted`] before reading anything if the
/// container has no filesystem, and [`SyncError::Cancelled`] if the
/// cancellation token fires mid-pass.
pub async fn execute_sync_plan(
    plan: &SyncPlan,
    adapter: &LocalFsAdapter,
    container: &ContainerContext,
    sink: &dyn EventSink,
    options: &ExecutorOptions,
) -> SyncOutcome<SyncResult> {
    let fs = container.file_system().ok_or(SyncError::NotBooted)?;
    let fs: &dyn ContainerFs = fs.as_ref();
    let started = Instant::now();
    let concurrency = options.concurrency.max(1);

    let mut tally = Tally {
        sink,
        total: plan.items.len(),
        processed: 0,
        synced: 0,
        failed: Vec::new(),
    };

    let mut items = plan.items.iter().peekable();
    while let Some(item) = items.next() {
        if options.is_cancelled() {
            info!(synced = tally.synced, "sync cancelled");
            return Err(SyncError::Cancelled {
                synced: tally.synced,
            });
        }

        if concurrency > 1 && is_file_add(item) {
            let mut run = vec![item.clone()];
            while let Some(next) = items.next_if(|i| is_file_add(i)) {
                run.push(next.clone());
            }
            // Owned items keep the pass future `Send + 'static`.
            let copies: Vec<_> = run
                .into_iter()
                .map(|item| async move {
                    let outcome = apply_item(&item, adapter, fs).await;
                    (item, outcome)
                })
                .collect();
            let mut results = stream::iter(copies).buffered(concurrency);
            while let Some((item, outcome)) = results.next().await {
                if options.is_cancelled() {
                    info!(synced = tally.synced, "sync cancelled");
                    return Err(SyncError::Cancelled {
                        synced: tally.synced,
                    });
                }
                tally.record(&item, outcome);
            }
        } else {
            let outcome = apply_item(item, adapter, fs).await;
            tally.record(item, outcome);
        }
    }

    let result = SyncResult {
        success: true,
        synced_files: tally.synced,
        failed_files: tally.failed,
        duration: started.elapsed(),
    };
    info!(
        synced = result.synced_files,
        failed = result.failed_files.len(),
        duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
        "sync plan executed"
    );
    Ok(result)
}
