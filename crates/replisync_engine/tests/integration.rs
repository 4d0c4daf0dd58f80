//! Send-only folder operations against a real replica store.

use replisync_engine::{
    BatchLimits, EventKind, FolderConfig, FolderError, FolderService, FolderState, IgnoreList,
    NoIgnores, RecordingEventLogger, SendOnlyFolder,
};
use replisync_store::{ReplicaStore, StoreError};
use replisync_testkit::prelude::*;
use replisync_types::{DeviceId, LocalFlags, ShortId};
use std::sync::Arc;
use std::time::Duration;

const LOCAL: u64 = 1;
const REMOTE: u64 = 2;

type StoreFolder = SendOnlyFolder<ReplicaStore, NoIgnores, RecordingEventLogger>;

fn config() -> FolderConfig {
    FolderConfig::new("photos", ShortId::new(LOCAL)).with_label("Photos")
}

fn folder(store: &ReplicaStore, config: FolderConfig) -> StoreFolder {
    init_tracing();
    SendOnlyFolder::new(config, store.clone(), NoIgnores, RecordingEventLogger::new())
}

#[test]
fn pull_adopts_remote_version_of_identical_file() {
    let store = memory_store();
    seed_local(&store, vec![versioned("b.txt", &[(LOCAL, 1)])]);
    let remote_copy =
        versioned("b.txt", &[(LOCAL, 1), (REMOTE, 1)]).with_modified(FIXTURE_MTIME + 1, 0);
    seed_remote(&store, remote_device(REMOTE), vec![remote_copy.clone()]);
    assert_eq!(needed_names(&store), vec!["b.txt"]);

    let folder = folder(&store, config().with_mod_time_window(Duration::from_secs(2)));
    assert!(folder.pull().unwrap());

    let local = local_record(&store, "b.txt").unwrap();
    assert_eq!(local.version, remote_copy.version);
    assert_eq!(local.sequence, 2);
    assert!(needed_names(&store).is_empty());
    assert_eq!(store.open_snapshots(), 0);
    assert_eq!(folder.state(), FolderState::Idle);
    assert_eq!(
        folder.events().messages(EventKind::LocalIndexUpdated),
        vec!["folder=photos items=1 sequence=2"]
    );
}

#[test]
fn pull_outside_window_leaves_file_for_transfer() {
    let store = memory_store();
    seed_local(&store, vec![versioned("b.txt", &[(LOCAL, 1)])]);
    seed_remote(
        &store,
        remote_device(REMOTE),
        vec![versioned("b.txt", &[(LOCAL, 1), (REMOTE, 1)]).with_modified(FIXTURE_MTIME + 3, 0)],
    );

    let folder = folder(&store, config().with_mod_time_window(Duration::from_secs(2)));
    assert!(folder.pull().unwrap());

    assert_eq!(store.sequence(DeviceId::LOCAL), 1);
    assert_eq!(needed_names(&store), vec!["b.txt"]);
}

#[test]
fn pull_is_a_no_op_once_converged() {
    let store = memory_store();
    seed_local(&store, vec![plain_file("a"), plain_file("b")]);
    seed_remote(
        &store,
        remote_device(REMOTE),
        vec![versioned("a", &[(REMOTE, 1)]), versioned("b", &[(REMOTE, 1)])],
    );

    let folder = folder(&store, config());
    assert!(folder.pull().unwrap());
    let sequence = store.sequence(DeviceId::LOCAL);

    assert!(folder.pull().unwrap());
    assert_eq!(store.sequence(DeviceId::LOCAL), sequence);
    assert_eq!(folder.events().count(EventKind::LocalIndexUpdated), 1);
}

#[test]
fn pull_ignores_deletion_of_file_never_held() {
    let store = memory_store();
    seed_remote(
        &store,
        remote_device(REMOTE),
        vec![versioned("a.txt", &[(REMOTE, 2)]).with_deleted()],
    );

    let folder = folder(&store, config());
    assert!(folder.pull().unwrap());

    assert!(local_record(&store, "a.txt").is_none());
    assert_eq!(store.sequence(DeviceId::LOCAL), 0);
}

#[test]
fn pull_settles_need_for_ignored_names() {
    init_tracing();
    let store = memory_store();
    seed_remote(
        &store,
        remote_device(REMOTE),
        vec![versioned("cache/tmp", &[(REMOTE, 1)]), versioned("keep", &[(REMOTE, 1)])],
    );

    let folder = SendOnlyFolder::new(
        config(),
        store.clone(),
        IgnoreList::new().with_dir("cache"),
        RecordingEventLogger::new(),
    );
    folder.pull().unwrap();

    let ignored = local_record(&store, "cache/tmp").unwrap();
    assert_eq!(ignored.local_flags, LocalFlags::IGNORED);
    assert!(local_record(&store, "keep").is_none());
    assert_eq!(needed_names(&store), vec!["keep"]);
}

#[test]
fn pull_commits_in_bounded_batches() {
    let store = memory_store();
    let names = ["a", "b", "c", "d", "e"];
    seed_local(&store, names.iter().map(|n| plain_file(n)).collect());
    seed_remote(
        &store,
        remote_device(REMOTE),
        names.iter().map(|n| versioned(n, &[(REMOTE, 1)])).collect(),
    );

    let folder = folder(&store, config().with_batch_limits(BatchLimits::new(2, usize::MAX)));
    folder.pull().unwrap();

    assert_eq!(
        folder.events().messages(EventKind::LocalIndexUpdated),
        vec![
            "folder=photos items=2 sequence=7",
            "folder=photos items=2 sequence=9",
            "folder=photos items=1 sequence=10",
        ]
    );
    assert!(needed_names(&store).is_empty());
}

#[test]
fn override_merges_versions_and_resequences() {
    let store = memory_store();
    let have = versioned("c.txt", &[(LOCAL, 2)]);
    seed_local(&store, vec![have.clone()]);
    let need = versioned("c.txt", &[(LOCAL, 1), (REMOTE, 3)])
        .with_size(7)
        .with_modified(FIXTURE_MTIME + 10, 0);
    seed_remote(&store, remote_device(REMOTE), vec![need.clone()]);
    assert_eq!(needed_names(&store), vec!["c.txt"]);

    let folder = folder(&store, config());
    folder.force_override().unwrap();

    let local = local_record(&store, "c.txt").unwrap();
    assert_eq!(local.version, vv(&[(LOCAL, 3), (REMOTE, 3)]));
    assert!(local.version.dominates(&have.version));
    assert!(local.version.dominates(&need.version));
    assert_eq!(local.size, have.size);
    assert_eq!(local.sequence, 2);

    assert!(needed_names(&store).is_empty());
    let snapshot = store.snapshot().unwrap();
    let remote_needs: Vec<String> = snapshot.need(remote_device(REMOTE)).map(|r| r.name).collect();
    assert_eq!(remote_needs, vec!["c.txt"]);
    drop(snapshot);

    assert_eq!(folder.events().count(EventKind::LocalChangeDetected), 1);
    assert_eq!(
        folder.events().messages(EventKind::Info),
        vec!["Overriding global state on folder \"Photos\" (photos)"]
    );
    assert_eq!(store.open_snapshots(), 0);
}

#[test]
fn override_deletes_files_missing_locally() {
    let store = memory_store();
    seed_remote(&store, remote_device(REMOTE), vec![versioned("gone", &[(REMOTE, 4)])]);

    let folder = folder(&store, config());
    folder.force_override().unwrap();

    let tombstone = local_record(&store, "gone").unwrap();
    assert!(tombstone.is_deleted());
    assert_eq!(tombstone.version, vv(&[(LOCAL, 1), (REMOTE, 4)]));
    assert_eq!(tombstone.modified_by, ShortId::new(LOCAL));

    let snapshot = store.snapshot().unwrap();
    assert!(snapshot.global("gone").unwrap().is_deleted());
    assert_eq!(snapshot.need(remote_device(REMOTE)).count(), 1);
    assert_eq!(snapshot.need(DeviceId::LOCAL).count(), 0);
}

#[test]
fn override_leaves_invalid_local_files_alone() {
    let store = memory_store();
    seed_local(
        &store,
        vec![versioned("bad", &[(LOCAL, 1)]).with_local_flags(LocalFlags::MUST_RESCAN)],
    );
    seed_remote(&store, remote_device(REMOTE), vec![versioned("bad", &[(REMOTE, 1)])]);
    assert_eq!(needed_names(&store), vec!["bad"]);

    let folder = folder(&store, config());
    folder.force_override().unwrap();

    let local = local_record(&store, "bad").unwrap();
    assert_eq!(local.sequence, 1);
    assert_eq!(local.version, vv(&[(LOCAL, 1)]));
    assert_eq!(store.sequence(DeviceId::LOCAL), 1);
}

#[test]
fn closed_store_fails_operations_and_restores_idle() {
    let store = memory_store();
    let folder = folder(&store, config());
    store.close();

    let err = folder.pull().unwrap_err();
    assert!(matches!(err, FolderError::Store(StoreError::Closed)));
    assert!(err.is_storage_unavailable());
    assert_eq!(folder.state(), FolderState::Idle);

    assert!(folder.force_override().is_err());
    assert_eq!(folder.state(), FolderState::Idle);
    assert_eq!(store.open_snapshots(), 0);
}

#[test]
fn overrides_survive_restart() {
    let mut fixture = TempStore::new();
    seed_remote(fixture.store(), remote_device(REMOTE), vec![versioned("x", &[(REMOTE, 1)])]);
    {
        let folder = folder(fixture.store(), config());
        folder.force_override().unwrap();
    }

    let store = fixture.reopen();
    let tombstone = local_record(store, "x").unwrap();
    assert!(tombstone.is_deleted());
    assert_eq!(tombstone.sequence, 1);
    assert!(needed_names(store).is_empty());
}

#[tokio::test]
async fn service_serializes_operations_on_a_store() {
    let store = memory_store();
    seed_local(&store, vec![plain_file("a")]);
    seed_remote(
        &store,
        remote_device(REMOTE),
        vec![versioned("a", &[(REMOTE, 1)]), versioned("b", &[(REMOTE, 1)])],
    );

    let folder = Arc::new(folder(&store, config()));
    let handle = FolderService::spawn(folder.clone());

    let (pulled, overridden) = tokio::join!(handle.pull(), handle.force_override());
    assert!(pulled.unwrap());
    overridden.unwrap();

    assert!(needed_names(&store).is_empty());
    assert_eq!(folder.state(), FolderState::Idle);
    handle.shutdown().await.unwrap();
    assert!(matches!(handle.pull().await, Err(FolderError::ServiceStopped)));
}
