//! Via-gent Sync - copies a user's local project directory into the
//! in-browser container filesystem.
//!
//! A pass walks the bound local directory ([`walker`]), skips excluded
//! paths ([`exclusion`]), turns what it found into an ordered
//! [`SyncPlan`], and applies the plan to the container
//! ([`execute_sync_plan`]). [`SyncManager`] guards passes so only one runs
//! at a time and reports progress through an [`EventSink`].
//! [`WorkspaceSession`] ties a manager to a project's saved state.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use viagent_events::EventBus;
//! use viagent_sync::{LocalFsAdapter, SyncManager, SyncOptions};
//! use viagent_vfs::{ContainerContext, HostDirHandle, MemoryFs};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let container = Arc::new(ContainerContext::booted(Arc::new(MemoryFs::new())));
//! let adapter = Arc::new(LocalFsAdapter::new());
//! adapter.set_directory_handle(Arc::new(HostDirHandle::open("./my-app").await?));
//!
//! let manager = SyncManager::new(
//!     container,
//!     adapter,
//!     Arc::new(EventBus::new()),
//!     &SyncOptions::default(),
//! );
//! manager.sync_to_container(None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`EventSink`]: viagent_events::EventSink

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapter;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod manager;
pub mod permission;
pub mod plan;
pub mod session;
pub mod walker;

pub use adapter::{BINARY_EXTENSIONS, LocalFsAdapter};
pub use error::{FileSystemError, SyncError, SyncOutcome};
pub use exclusion::{
    DEFAULT_EXCLUSION_PATTERNS, EXTENDED_DEFAULT_PATTERNS, ExclusionMatcher, PatternValidation,
    format_patterns_for_display, is_path_excluded, merge_exclusion_patterns, parse_pattern_input,
    validate_exclusion_pattern, validate_patterns,
};
pub use executor::{ExecutorOptions, execute_sync_plan};
pub use manager::{SyncAttempt, SyncManager, SyncOptions};
pub use permission::{
    clear_directory_handle_reference, ensure_read_write_permission, get_permission_state,
    is_persistent_permission_supported, load_directory_handle_reference,
    restore_directory_handle, save_directory_handle_reference,
};
pub use plan::{
    ContainerEntry, SyncOperation, SyncPlan, SyncPlanItem, SyncStats, list_container_tree,
};
pub use session::{ProjectMetadata, WorkspaceSession};
pub use walker::{DirectoryEntry, EntryStream, collect_entries, walk_directory, walk_with_matcher};
