//! Permission checks and persisted directory handle references.

use std::sync::Arc;

use tracing::{debug, warn};
use viagent_storage::{KvStore, ScopedKvStore};
use viagent_vfs::{
    DirectoryHandle, HandleReference, HostDirHandle, PermissionMode, PermissionState, VfsError,
};

/// Storage namespace for handle references.
pub const HANDLES_NAMESPACE: &str = "handles";

/// Key used when no workspace id is given.
pub const DEFAULT_WORKSPACE_KEY: &str = "default";

fn workspace_key(workspace_id: Option<&str>) -> &str {
    match workspace_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => DEFAULT_WORKSPACE_KEY,
    }
}

/// Current permission of `handle` for `mode`, without prompting.
///
/// Never fails: a backend without a permission API, or one that errors,
/// reads as [`PermissionState::Denied`]. An unqueried state reads as
/// [`PermissionState::Prompt`].
pub async fn get_permission_state(
    handle: &dyn DirectoryHandle,
    mode: PermissionMode,
) -> PermissionState {
    match handle.query_permission(mode).await {
        Ok(PermissionState::Unknown) => PermissionState::Prompt,
        Ok(state) => state,
        Err(VfsError::Unsupported(what)) => {
            debug!(directory = %handle.name(), %what, "permission query unsupported");
            PermissionState::Denied
        },
        Err(e) => {
            warn!(directory = %handle.name(), error = %e, "permission query failed");
            PermissionState::Denied
        },
    }
}

/// Make sure `handle` is readable and writable, prompting if needed.
///
/// Returns `Granted` without prompting when access is already granted.
/// Anything short of a grant comes back as `Denied`.
pub async fn ensure_read_write_permission(handle: &dyn DirectoryHandle) -> PermissionState {
    if get_permission_state(handle, PermissionMode::ReadWrite)
        .await
        .is_granted()
    {
        return PermissionState::Granted;
    }

    match handle.request_permission(PermissionMode::ReadWrite).await {
        Ok(PermissionState::Granted) => PermissionState::Granted,
        Ok(state) => {
            debug!(directory = %handle.name(), %state, "read-write permission not granted");
            PermissionState::Denied
        },
        Err(e) => {
            warn!(directory = %handle.name(), error = %e, "permission request failed");
            PermissionState::Denied
        },
    }
}

/// Whether `handle` supports querying its permission at all.
pub async fn is_persistent_permission_supported(handle: &dyn DirectoryHandle) -> bool {
    handle.query_permission(PermissionMode::Read).await.is_ok()
}

fn handles_store(store: &Arc<dyn KvStore>) -> Option<ScopedKvStore> {
    match ScopedKvStore::new(Arc::clone(store), HANDLES_NAMESPACE) {
        Ok(scoped) => Some(scoped),
        Err(e) => {
            warn!(error = %e, "handle storage unavailable");
            None
        },
    }
}

/// Persist a reference to `handle` under `workspace_id`.
///
/// Returns false if the handle cannot be referenced or the write failed.
pub async fn save_directory_handle_reference(
    store: &Arc<dyn KvStore>,
    handle: &dyn DirectoryHandle,
    workspace_id: Option<&str>,
) -> bool {
    let key = workspace_key(workspace_id);
    let Some(reference) = handle.reference() else {
        debug!(directory = %handle.name(), "handle cannot be persisted");
        return false;
    };
    let Some(scoped) = handles_store(store) else {
        return false;
    };
    match scoped.set_json(key, &reference).await {
        Ok(()) => {
            debug!(workspace = %key, directory = %reference.name, "saved handle reference");
            true
        },
        Err(e) => {
            warn!(workspace = %key, error = %e, "failed to save handle reference");
            false
        },
    }
}

/// Load the reference saved under `workspace_id`.
pub async fn load_directory_handle_reference(
    store: &Arc<dyn KvStore>,
    workspace_id: Option<&str>,
) -> Option<HandleReference> {
    let key = workspace_key(workspace_id);
    let scoped = handles_store(store)?;
    match scoped.get_json::<HandleReference>(key).await {
        Ok(reference) => reference,
        Err(e) => {
            warn!(workspace = %key, error = %e, "failed to load handle reference");
            None
        },
    }
}

/// Forget the reference saved under `workspace_id`.
///
/// Returns true if one was removed.
pub async fn clear_directory_handle_reference(
    store: &Arc<dyn KvStore>,
    workspace_id: Option<&str>,
) -> bool {
    let key = workspace_key(workspace_id);
    let Some(scoped) = handles_store(store) else {
        return false;
    };
    match scoped.delete(key).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!(workspace = %key, error = %e, "failed to clear handle reference");
            false
        },
    }
}

/// Restore the handle saved under `workspace_id`, if it still resolves.
pub async fn restore_directory_handle(
    store: &Arc<dyn KvStore>,
    workspace_id: Option<&str>,
) -> Option<Arc<dyn DirectoryHandle>> {
    let reference = load_directory_handle_reference(store, workspace_id).await?;
    match HostDirHandle::from_reference(&reference).await {
        Ok(handle) => Some(Arc::new(handle)),
        Err(e) => {
            warn!(
                directory = %reference.name,
                error = %e,
                "stored directory handle no longer resolves"
            );
            None
        },
    }
}
