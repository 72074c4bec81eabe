//! End-to-end behaviour of the sync manager and workspace session.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{GatedDir, ManagerHarness, position};
use viagent_events::{EventBus, SyncEvent, SyncMode, SyncStatus};
use viagent_storage::{JsonFileKvStore, KvStore};
use viagent_sync::{SyncAttempt, SyncError, SyncOptions, WorkspaceSession};
use viagent_test::{
    MemoryDirHandle, RecordingContainerFs, SAMPLE_PROJECT_SYNCED_FILES, sample_project,
    write_sample_project,
};
use viagent_vfs::{ContainerFs, HostDirHandle, HostFs};

#[tokio::test]
async fn test_second_request_while_syncing_is_a_noop() {
    let h = ManagerHarness::new(&SyncOptions::default());
    let root = Arc::new(GatedDir::new(sample_project()));
    h.bind(root.clone());

    let manager = Arc::clone(&h.manager);
    let first = tokio::spawn(async move { manager.sync_to_container(None).await });
    root.wait_entered().await;
    assert_eq!(h.manager.status(), SyncStatus::Syncing);

    let second = h.manager.sync_to_container(None).await.unwrap();
    assert_eq!(second, SyncAttempt::AlreadyRunning);

    root.open();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, SyncAttempt::Completed(_)));
    assert_eq!(h.sink.count("sync:started"), 1);
    assert_eq!(h.sink.count("sync:completed"), 1);
    assert_eq!(h.manager.status(), SyncStatus::Idle);
}

#[tokio::test]
async fn test_cancel_in_flight_pass() {
    let h = ManagerHarness::new(&SyncOptions::default());
    let root = Arc::new(GatedDir::new(sample_project()));
    h.bind(root.clone());

    let manager = Arc::clone(&h.manager);
    let pass = tokio::spawn(async move { manager.sync_to_container(None).await });
    root.wait_entered().await;
    assert!(h.manager.cancel());

    let err = tokio::time::timeout(Duration::from_secs(5), pass)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SyncError::Cancelled { synced: 0 }));
    assert_eq!(h.manager.status(), SyncStatus::Idle);
    assert_eq!(h.fs.write_count(), 0);
    assert_eq!(h.sink.count("sync:completed"), 0);
    assert!(!h.manager.cancel());
}

#[tokio::test]
async fn test_aborted_pass_releases_cancel_slot() {
    let h = ManagerHarness::new(&SyncOptions::default());
    let root = Arc::new(GatedDir::new(sample_project()));
    h.bind(root.clone());

    let manager = Arc::clone(&h.manager);
    let pass = tokio::spawn(async move { manager.sync_to_container(None).await });
    root.wait_entered().await;
    pass.abort();
    assert!(pass.await.unwrap_err().is_cancelled());

    assert_eq!(h.manager.status(), SyncStatus::Idle);
    assert!(!h.manager.cancel());

    root.open();
    let attempt = h.manager.sync_to_container(None).await.unwrap();
    assert!(matches!(attempt, SyncAttempt::Completed(_)));
    assert!(!h.manager.cancel());
}

#[tokio::test]
async fn test_started_precedes_progress_and_completed_follows() {
    let h = ManagerHarness::new(&SyncOptions::default());
    h.bind(Arc::new(sample_project()));

    h.manager.sync_to_container(None).await.unwrap();

    let events = h.sink.events();
    let started = position(&events, "sync:started").unwrap();
    let first_progress = position(&events, "sync:progress").unwrap();
    let completed = position(&events, "sync:completed").unwrap();
    assert!(started < first_progress);
    let last_progress = events
        .iter()
        .rposition(|e| matches!(e, SyncEvent::Progress(_)))
        .unwrap();
    assert!(last_progress < completed);

    let mut written = h.fs.writes();
    written.sort();
    assert_eq!(written, SAMPLE_PROJECT_SYNCED_FILES);
}

#[tokio::test]
async fn test_mid_walk_pattern_change_does_not_leak_into_pass() {
    let h = ManagerHarness::new(&SyncOptions::default());
    let root = Arc::new(GatedDir::new(sample_project()));
    h.bind(root.clone());

    let manager = Arc::clone(&h.manager);
    let pass = tokio::spawn(async move { manager.sync_to_container(None).await });
    root.wait_entered().await;
    let mut patterns = h.manager.exclude_patterns();
    patterns.push("src".into());
    h.manager.set_exclude_patterns(patterns);
    root.open();
    pass.await.unwrap().unwrap();

    assert!(h.fs.writes().contains(&"src/main.ts".to_owned()));
}

#[tokio::test]
async fn test_full_sync_between_host_directories() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    write_sample_project(source.path()).unwrap();
    std::fs::create_dir_all(target.path().join("stale/dir")).unwrap();
    std::fs::write(target.path().join("stale/dir/old.ts"), "old").unwrap();
    std::fs::write(target.path().join("removed.ts"), "gone").unwrap();

    let h = ManagerHarness::new(&SyncOptions {
        mode: SyncMode::Full,
        concurrency: 4,
        ..SyncOptions::default()
    });
    let host = Arc::new(HostFs::new(target.path()));
    h.container.boot(host.clone());
    h.bind(Arc::new(HostDirHandle::open(source.path()).await.unwrap()));

    let SyncAttempt::Completed(result) = h.manager.sync_to_container(None).await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert!(!result.has_failures());
    assert!(!target.path().join("stale").exists());
    assert!(!target.path().join("removed.ts").exists());
    assert!(!target.path().join("node_modules").exists());
    assert_eq!(
        std::fs::read(target.path().join("public/logo.png")).unwrap(),
        std::fs::read(source.path().join("public/logo.png")).unwrap()
    );
    assert!(host.exists("src/components/App.tsx").await.unwrap());
}

#[tokio::test]
async fn test_full_sync_replaces_entries_that_changed_kind() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(source.path().join("lib")).unwrap();
    std::fs::write(source.path().join("lib/a.ts"), "a").unwrap();
    std::fs::write(source.path().join("dist"), "bundle").unwrap();
    std::fs::write(target.path().join("lib"), "stale").unwrap();
    std::fs::create_dir_all(target.path().join("dist")).unwrap();
    std::fs::write(target.path().join("dist/x.js"), "x").unwrap();

    let h = ManagerHarness::new(&SyncOptions {
        mode: SyncMode::Full,
        ..SyncOptions::default()
    });
    h.container.boot(Arc::new(HostFs::new(target.path())));
    h.bind(Arc::new(HostDirHandle::open(source.path()).await.unwrap()));

    for _ in 0..2 {
        let SyncAttempt::Completed(result) = h.manager.sync_to_container(None).await.unwrap()
        else {
            panic!("expected a completed pass");
        };
        assert!(result.failed_files.is_empty(), "{:?}", result.failed_files);
    }
    assert_eq!(std::fs::read(target.path().join("lib/a.ts")).unwrap(), b"a");
    assert!(target.path().join("dist").is_file());
}

#[tokio::test]
async fn test_session_lifecycle_with_persistent_state() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_sample_project(project.path()).unwrap();
    let state_file = state.path().join("state.json");
    let bus = Arc::new(EventBus::new());
    let mut receiver = bus.subscribe();

    {
        let store: Arc<dyn KvStore> = Arc::new(JsonFileKvStore::open(&state_file).await.unwrap());
        let session =
            WorkspaceSession::open("app", "App", store, bus.clone(), SyncOptions::default())
                .await
                .unwrap();
        session
            .attach_directory(Arc::new(HostDirHandle::open(project.path()).await.unwrap()))
            .await
            .unwrap();
        session.update_exclusions("public").await.unwrap();

        let fs = Arc::new(RecordingContainerFs::new());
        let attempt = session.on_container_booted(fs.clone()).await.unwrap();
        assert!(matches!(attempt, Some(SyncAttempt::Completed(_))));
        assert!(!fs.writes().contains(&"public/logo.png".to_owned()));
        session.close();
    }

    let first = receiver.recv().await.unwrap();
    assert_eq!(first.event_type(), "sync:status");

    let store: Arc<dyn KvStore> = Arc::new(JsonFileKvStore::open(&state_file).await.unwrap());
    let session = WorkspaceSession::open("app", "App", store, bus, SyncOptions::default())
        .await
        .unwrap();
    assert!(session.adapter().has_directory());
    assert_eq!(session.project().exclusion_patterns, vec!["public"]);
    assert!(session.project().last_sync_time.is_some());

    let fs = Arc::new(RecordingContainerFs::new());
    session.on_container_booted(fs.clone()).await.unwrap();
    assert_eq!(fs.write_count(), 3);
}

#[tokio::test]
async fn test_listing_failure_skips_directory_only() {
    let h = ManagerHarness::new(&SyncOptions::default());
    let root = MemoryDirHandle::new("p")
        .with_file("ok.ts", "ok")
        .with_file("locked/secret.ts", "s");
    root.dir("locked").unwrap().set_list_fails(true);
    h.bind(Arc::new(root));

    let SyncAttempt::Completed(result) = h.manager.sync_to_container(None).await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert_eq!(result.synced_files, 2);
    assert_eq!(h.fs.writes(), vec!["ok.ts"]);
}
