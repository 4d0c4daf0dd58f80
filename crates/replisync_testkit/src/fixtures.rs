//! Test fixtures: devices, records and stores.

use replisync_store::ReplicaStore;
use replisync_types::{DeviceId, FileRecord, ShortId, VersionVector};
use std::path::PathBuf;
use tempfile::TempDir;

/// Modification time used by fixture records, in seconds since the epoch.
pub const FIXTURE_MTIME: i64 = 1_700_000_000;

/// Returns a remote device whose short ID is `n`.
pub fn remote_device(n: u64) -> DeviceId {
    let mut bytes = [0x11u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    DeviceId::from_bytes(bytes)
}

/// Builds a version vector from `(short id, counter)` pairs.
pub fn vv(pairs: &[(u64, u64)]) -> VersionVector {
    VersionVector::from_counters(pairs.iter().map(|&(id, value)| (ShortId::new(id), value)))
}

/// A 100-byte file with mode 0644 and the fixture modification time.
pub fn plain_file(name: &str) -> FileRecord {
    FileRecord::file(name)
        .with_size(100)
        .with_permissions(0o644)
        .with_modified(FIXTURE_MTIME, 0)
}

/// [`plain_file`] carrying the given version.
pub fn versioned(name: &str, pairs: &[(u64, u64)]) -> FileRecord {
    plain_file(name).with_version(vv(pairs))
}

/// Creates an in-memory store.
pub fn memory_store() -> ReplicaStore {
    ReplicaStore::in_memory()
}

/// Commits `records` to `device`'s catalog.
///
/// # Panics
///
/// Panics if the commit fails.
pub fn seed_remote(store: &ReplicaStore, device: DeviceId, records: Vec<FileRecord>) {
    store
        .commit_batch(device, records)
        .expect("seeding remote catalog");
}

/// Commits `records` to the local catalog.
///
/// # Panics
///
/// Panics if the commit fails.
pub fn seed_local(store: &ReplicaStore, records: Vec<FileRecord>) {
    seed_remote(store, DeviceId::LOCAL, records);
}

/// Returns the local device's record for `name`.
///
/// # Panics
///
/// Panics if no snapshot can be taken.
pub fn local_record(store: &ReplicaStore, name: &str) -> Option<FileRecord> {
    store
        .snapshot()
        .expect("taking snapshot")
        .get(DeviceId::LOCAL, name)
}

/// Returns the names the local device needs, in need order.
///
/// # Panics
///
/// Panics if no snapshot can be taken.
pub fn needed_names(store: &ReplicaStore) -> Vec<String> {
    let snapshot = store.snapshot().expect("taking snapshot");
    let names: Vec<String> = snapshot.need(DeviceId::LOCAL).map(|r| r.name).collect();
    names
}

/// A file-backed store in a temporary directory.
///
/// The directory is deleted when the fixture is dropped.
pub struct TempStore {
    dir: TempDir,
    store: Option<ReplicaStore>,
}

impl TempStore {
    /// Creates a fresh store.
    ///
    /// # Panics
    ///
    /// Panics if the directory or store cannot be created.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let store = ReplicaStore::open(&dir.path().join("catalog.log")).expect("opening store");
        Self {
            dir,
            store: Some(store),
        }
    }

    /// Returns the open store.
    ///
    /// # Panics
    ///
    /// Panics while the store is closed for a reopen.
    pub fn store(&self) -> &ReplicaStore {
        self.store.as_ref().expect("store is open")
    }

    /// Returns the path of the commit log.
    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("catalog.log")
    }

    /// Drops the store and opens it again from its log.
    ///
    /// Every clone of the old store must be dropped first, or the log is
    /// still locked.
    ///
    /// # Panics
    ///
    /// Panics if reopening fails.
    pub fn reopen(&mut self) -> &ReplicaStore {
        self.store = None;
        let store = ReplicaStore::open(&self.log_path()).expect("reopening store");
        self.store.insert(store)
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}
