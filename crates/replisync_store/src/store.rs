//! The replica store.

use crate::backend::LogBackend;
use crate::catalog::CatalogIndex;
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;
use crate::frame::{read_frame, CommitFrame, FrameRead};
use crate::memory::MemoryBackend;
use crate::snapshot::Snapshot;
use parking_lot::{Mutex, RwLock};
use replisync_types::{DeviceId, FileRecord};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State shared between the store and its snapshots.
pub(crate) struct Shared {
    pub(crate) index: RwLock<CatalogIndex>,
    /// Commit log. Holding this lock serializes commits.
    log: Mutex<Box<dyn LogBackend>>,
    /// Open snapshot count per stamp.
    readers: Mutex<BTreeMap<u64, usize>>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn release_reader(&self, stamp: u64) {
        let mut readers = self.readers.lock();
        if let Some(count) = readers.get_mut(&stamp) {
            *count -= 1;
            if *count == 0 {
                readers.remove(&stamp);
            }
        }
    }
}

/// Append-only, sequenced catalog of file records for every device.
///
/// The store provides:
/// - Snapshot reads that never observe a partial batch
/// - Atomic batch commits with per-device sequence assignment
/// - Durability through a checksummed commit log, replayed on open
///
/// # Concurrency
///
/// Commits are serialized internally. Any number of snapshots may be open
/// while commits proceed.
///
/// # Example
///
/// ```rust
/// use replisync_store::ReplicaStore;
/// use replisync_types::{DeviceId, FileRecord};
///
/// let store = ReplicaStore::in_memory();
/// store.commit_batch(DeviceId::LOCAL, vec![FileRecord::file("a.txt")]).unwrap();
///
/// let snap = store.snapshot().unwrap();
/// assert_eq!(snap.get(DeviceId::LOCAL, "a.txt").unwrap().sequence, 1);
/// snap.release();
/// ```
#[derive(Clone)]
pub struct ReplicaStore {
    shared: Arc<Shared>,
}

impl ReplicaStore {
    /// Creates an empty, memory-only store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(CatalogIndex::new(), Box::new(MemoryBackend::new()))
    }

    /// Opens (or creates) a file-backed store at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the log is locked by another store, unreadable, or holds a
    /// complete frame that is damaged. Only an incomplete trailing frame is
    /// cut off.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let backend = FileBackend::open(path)?;
        info!(path = %path.display(), "opening replica catalog");
        Self::with_backend(backend)
    }

    /// Opens a store over an arbitrary log backend, replaying its frames.
    ///
    /// # Errors
    ///
    /// Same as [`ReplicaStore::open`].
    pub fn with_backend(backend: impl LogBackend + 'static) -> StoreResult<Self> {
        let mut backend: Box<dyn LogBackend> = Box::new(backend);
        let mut index = CatalogIndex::new();
        let mut offset = 0;
        let mut frames = 0usize;

        loop {
            match read_frame(backend.as_ref(), offset)? {
                FrameRead::Frame(frame, next) => {
                    if frame.stamp <= index.stamp() {
                        return Err(StoreError::Corrupted {
                            offset,
                            message: format!(
                                "commit stamp {} does not follow {}",
                                frame.stamp,
                                index.stamp()
                            ),
                        });
                    }
                    index.apply(frame);
                    frames += 1;
                    offset = next;
                }
                FrameRead::Torn(at) => {
                    warn!(offset = at, "truncating torn commit frame");
                    backend.truncate(at)?;
                    break;
                }
                FrameRead::End => break,
            }
        }

        debug!(frames, stamp = index.stamp(), names = index.name_count(), "catalog replayed");
        Ok(Self::from_parts(index, backend))
    }

    fn from_parts(index: CatalogIndex, backend: Box<dyn LogBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                index: RwLock::new(index),
                log: Mutex::new(backend),
                readers: Mutex::new(BTreeMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Acquires a consistent read view.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] once the store is closed.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        self.ensure_open()?;
        // Register under the index lock so compaction cannot slip in between.
        let index = self.shared.index.read();
        let stamp = index.stamp();
        *self.shared.readers.lock().entry(stamp).or_insert(0) += 1;
        drop(index);
        Ok(Snapshot::new(Arc::clone(&self.shared), stamp))
    }

    /// Atomically upserts `records` into `device`'s catalog.
    ///
    /// Sequence numbers are assigned here, continuing `device`'s sequence;
    /// whatever the records carried is overwritten. The batch is durable
    /// before it becomes visible to new snapshots.
    ///
    /// Returns the last assigned sequence, or `None` for an empty batch.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the log cannot be written. A failed
    /// commit leaves the catalog unchanged.
    pub fn commit_batch(
        &self,
        device: DeviceId,
        records: Vec<FileRecord>,
    ) -> StoreResult<Option<u64>> {
        self.ensure_open()?;
        if records.is_empty() {
            return Ok(None);
        }

        let mut log = self.shared.log.lock();
        let (stamp, mut sequence) = {
            let index = self.shared.index.read();
            (index.stamp() + 1, index.sequence(device))
        };
        let records: Vec<FileRecord> = records
            .into_iter()
            .map(|record| {
                sequence += 1;
                record.with_sequence(sequence)
            })
            .collect();
        let count = records.len();

        let frame = CommitFrame {
            device,
            stamp,
            records,
        };
        let bytes = frame.encode()?;
        let start = log.size()?;
        if let Err(err) = log.append(&bytes).and_then(|_| log.sync()) {
            // Cut the partial frame so later commits do not land behind it.
            if let Err(cleanup) = log.truncate(start) {
                warn!(error = %cleanup, "failed to cut partial commit frame");
            }
            return Err(err);
        }

        self.shared.index.write().apply(frame);
        debug!(%device, stamp, count, sequence, "committed batch");
        Ok(Some(sequence))
    }

    /// Returns the last sequence assigned in `device`'s catalog.
    #[must_use]
    pub fn sequence(&self, device: DeviceId) -> u64 {
        self.shared.index.read().sequence(device)
    }

    /// Returns the latest commit stamp.
    #[must_use]
    pub fn stamp(&self) -> u64 {
        self.shared.index.read().stamp()
    }

    /// Returns the number of snapshots not yet released.
    #[must_use]
    pub fn open_snapshots(&self) -> usize {
        self.shared.readers.lock().values().sum()
    }

    /// Drops superseded versions that no open snapshot can observe.
    ///
    /// Returns the number of versions removed. The commit log itself is
    /// left untouched.
    pub fn compact(&self) -> usize {
        let mut index = self.shared.index.write();
        let horizon = self
            .shared
            .readers
            .lock()
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| index.stamp());
        let removed = index.compact(horizon);
        debug!(horizon, removed, "compacted catalog index");
        removed
    }

    /// Closes the store. Later snapshots and commits fail with
    /// [`StoreError::Closed`]; open snapshots stay readable.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`ReplicaStore::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for ReplicaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaStore")
            .field("stamp", &self.stamp())
            .field("closed", &self.is_closed())
            .finish()
    }
}
