//! The catalog seam between folders and storage.

use parking_lot::{Mutex, RwLock};
use replisync_store::{StoreError, StoreResult};
use replisync_types::{DeviceId, FileRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage a folder reconciles against.
///
/// This trait abstracts the replica store, allowing folders to run against
/// [`ReplicaStore`](replisync_store::ReplicaStore) or a scripted
/// [`MockCatalog`].
pub trait Catalog: Send + Sync {
    /// Read view type.
    type Snapshot: CatalogSnapshot;

    /// Acquires a consistent read view.
    ///
    /// The view is released when dropped.
    fn snapshot(&self) -> StoreResult<Self::Snapshot>;

    /// Atomically commits `records` to the local device's catalog.
    ///
    /// Returns the last sequence assigned, or `None` if nothing was written.
    fn commit_local(&self, records: Vec<FileRecord>) -> StoreResult<Option<u64>>;
}

/// A consistent read view of a catalog.
pub trait CatalogSnapshot {
    /// Looks up `device`'s record for `name`.
    fn get(&self, device: DeviceId, name: &str) -> Option<FileRecord>;

    /// Iterates every record `device` needs, in a stable order.
    fn need(&self, device: DeviceId) -> Box<dyn Iterator<Item = FileRecord> + '_>;
}

/// A scripted catalog for testing.
///
/// The need list is fixed by the test and does not react to commits.
/// Commits are recorded exactly as handed over, and also become the local
/// records later snapshots see.
#[derive(Debug, Default)]
pub struct MockCatalog {
    local: RwLock<BTreeMap<String, FileRecord>>,
    needed: RwLock<Vec<FileRecord>>,
    commits: Mutex<Vec<Vec<FileRecord>>>,
    fail_snapshots: AtomicBool,
    fail_commits: AtomicBool,
    open_snapshots: Arc<AtomicUsize>,
    sequence: AtomicU64,
}

impl MockCatalog {
    /// Creates an empty mock catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local device's record for its name.
    pub fn insert_local(&self, record: FileRecord) {
        self.local.write().insert(record.name.clone(), record);
    }

    /// Adds a record to the need list.
    pub fn push_need(&self, record: FileRecord) {
        self.needed.write().push(record);
    }

    /// Makes snapshot acquisition fail with [`StoreError::Closed`].
    pub fn set_fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    /// Makes commits fail with [`StoreError::Closed`].
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Returns every committed batch, as handed over.
    pub fn commits(&self) -> Vec<Vec<FileRecord>> {
        self.commits.lock().clone()
    }

    /// Returns every committed record in commit order.
    pub fn committed(&self) -> Vec<FileRecord> {
        self.commits.lock().iter().flatten().cloned().collect()
    }

    /// Returns the local device's current record for `name`.
    pub fn local(&self, name: &str) -> Option<FileRecord> {
        self.local.read().get(name).cloned()
    }

    /// Returns the number of snapshots not yet dropped.
    pub fn open_snapshots(&self) -> usize {
        self.open_snapshots.load(Ordering::SeqCst)
    }
}

impl Catalog for MockCatalog {
    type Snapshot = MockSnapshot;

    fn snapshot(&self) -> StoreResult<MockSnapshot> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        self.open_snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(MockSnapshot {
            local: self.local.read().clone(),
            needed: self.needed.read().clone(),
            open: Arc::clone(&self.open_snapshots),
        })
    }

    fn commit_local(&self, records: Vec<FileRecord>) -> StoreResult<Option<u64>> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if records.is_empty() {
            return Ok(None);
        }

        let mut local = self.local.write();
        for record in &records {
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            local.insert(record.name.clone(), record.clone().with_sequence(sequence));
        }
        self.commits.lock().push(records);
        Ok(Some(self.sequence.load(Ordering::SeqCst)))
    }
}

/// Read view of a [`MockCatalog`].
#[derive(Debug)]
pub struct MockSnapshot {
    local: BTreeMap<String, FileRecord>,
    needed: Vec<FileRecord>,
    open: Arc<AtomicUsize>,
}

impl CatalogSnapshot for MockSnapshot {
    fn get(&self, device: DeviceId, name: &str) -> Option<FileRecord> {
        if device.is_local() {
            self.local.get(name).cloned()
        } else {
            None
        }
    }

    fn need(&self, device: DeviceId) -> Box<dyn Iterator<Item = FileRecord> + '_> {
        if device.is_local() {
            Box::new(self.needed.iter().cloned())
        } else {
            Box::new(std::iter::empty())
        }
    }
}

impl Drop for MockSnapshot {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
