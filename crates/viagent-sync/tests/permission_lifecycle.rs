//! Permission queries, requests and persisted handle references.

use std::sync::Arc;

use viagent_storage::{JsonFileKvStore, KvStore};
use viagent_sync::{
    ensure_read_write_permission, get_permission_state, is_persistent_permission_supported,
    load_directory_handle_reference, restore_directory_handle, save_directory_handle_reference,
};
use viagent_test::{MemoryDirHandle, PermissionBehavior};
use viagent_vfs::{DirectoryHandle, HostDirHandle, PermissionMode, PermissionState};

fn scripted(query: PermissionBehavior, request: PermissionBehavior) -> MemoryDirHandle {
    MemoryDirHandle::new("project").with_permission(query, request)
}

#[tokio::test]
async fn test_missing_api_is_denied() {
    let handle = scripted(PermissionBehavior::Unsupported, PermissionBehavior::Unsupported);
    assert_eq!(
        get_permission_state(&handle, PermissionMode::Read).await,
        PermissionState::Denied
    );
    assert!(!is_persistent_permission_supported(&handle).await);
}

#[tokio::test]
async fn test_throwing_query_is_denied() {
    let handle = scripted(
        PermissionBehavior::Error("boom".into()),
        PermissionBehavior::State(PermissionState::Granted),
    );
    assert_eq!(
        get_permission_state(&handle, PermissionMode::ReadWrite).await,
        PermissionState::Denied
    );
}

#[tokio::test]
async fn test_unknown_reads_as_prompt() {
    let handle = scripted(
        PermissionBehavior::State(PermissionState::Unknown),
        PermissionBehavior::State(PermissionState::Denied),
    );
    assert_eq!(
        get_permission_state(&handle, PermissionMode::Read).await,
        PermissionState::Prompt
    );
    assert!(is_persistent_permission_supported(&handle).await);
}

#[tokio::test]
async fn test_granted_short_circuits_request() {
    let handle = scripted(
        PermissionBehavior::State(PermissionState::Granted),
        PermissionBehavior::State(PermissionState::Denied),
    );
    assert_eq!(
        ensure_read_write_permission(&handle).await,
        PermissionState::Granted
    );
    assert_eq!(handle.request_calls(), 0);
}

#[tokio::test]
async fn test_prompt_issues_request_and_maps_result() {
    let granted = scripted(
        PermissionBehavior::State(PermissionState::Prompt),
        PermissionBehavior::State(PermissionState::Granted),
    );
    assert_eq!(
        ensure_read_write_permission(&granted).await,
        PermissionState::Granted
    );
    assert_eq!(granted.request_calls(), 1);

    let prompt_again = scripted(
        PermissionBehavior::State(PermissionState::Prompt),
        PermissionBehavior::State(PermissionState::Prompt),
    );
    assert_eq!(
        ensure_read_write_permission(&prompt_again).await,
        PermissionState::Denied
    );

    let throwing = scripted(
        PermissionBehavior::State(PermissionState::Denied),
        PermissionBehavior::Error("no user gesture".into()),
    );
    assert_eq!(
        ensure_read_write_permission(&throwing).await,
        PermissionState::Denied
    );
    assert_eq!(throwing.request_calls(), 1);
}

#[tokio::test]
async fn test_reference_survives_store_reopen() {
    let state_dir = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let state_file = state_dir.path().join("state.json");
    let handle = HostDirHandle::open(project.path()).await.unwrap();

    {
        let store: Arc<dyn KvStore> = Arc::new(JsonFileKvStore::open(&state_file).await.unwrap());
        assert!(save_directory_handle_reference(&store, &handle, Some("ws-1")).await);
    }

    let store: Arc<dyn KvStore> = Arc::new(JsonFileKvStore::open(&state_file).await.unwrap());
    let reference = load_directory_handle_reference(&store, Some("ws-1"))
        .await
        .unwrap();
    assert_eq!(reference.kind, "host");
    assert!(load_directory_handle_reference(&store, None).await.is_none());

    let restored = restore_directory_handle(&store, Some("ws-1")).await.unwrap();
    assert_eq!(restored.name(), handle.name());
}

#[tokio::test]
async fn test_foreign_reference_does_not_restore() {
    let store: Arc<dyn KvStore> = Arc::new(viagent_storage::MemoryKvStore::new());
    let handle = MemoryDirHandle::new("in-memory");
    assert!(save_directory_handle_reference(&store, &handle, None).await);
    assert!(load_directory_handle_reference(&store, None).await.is_some());
    assert!(restore_directory_handle(&store, None).await.is_none());
}
