//! Point-in-time read views.

use crate::store::Shared;
use replisync_types::{DeviceId, FileRecord};
use std::iter::FusedIterator;
use std::sync::Arc;

/// A consistent read view of every catalog at one commit stamp.
///
/// Commits made after the snapshot was taken are invisible to it. A
/// snapshot is released exactly once: explicitly through
/// [`Snapshot::release`], or when dropped.
pub struct Snapshot {
    shared: Arc<Shared>,
    stamp: u64,
    released: bool,
}

impl Snapshot {
    pub(crate) fn new(shared: Arc<Shared>, stamp: u64) -> Self {
        Self {
            shared,
            stamp,
            released: false,
        }
    }

    /// Returns the commit stamp this snapshot reads at.
    #[must_use]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Looks up `device`'s record for `name`.
    #[must_use]
    pub fn get(&self, device: DeviceId, name: &str) -> Option<FileRecord> {
        self.shared
            .index
            .read()
            .get_at(device, name, self.stamp)
            .cloned()
    }

    /// Returns the global record for `name`.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<FileRecord> {
        self.shared.index.read().global_at(name, self.stamp).cloned()
    }

    /// Iterates, in name order, every global record `device` needs.
    ///
    /// The iterator borrows the snapshot, so the view stays valid for the
    /// whole iteration. It holds no lock between items.
    #[must_use]
    pub fn need(&self, device: DeviceId) -> Need<'_> {
        Need {
            snapshot: self,
            device,
            cursor: None,
            done: false,
        }
    }

    /// Releases the snapshot.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.release_reader(self.stamp);
        }
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("stamp", &self.stamp)
            .field("released", &self.released)
            .finish()
    }
}

/// Lazy, single-pass sequence of records a device needs.
///
/// Produced by [`Snapshot::need`]. Once exhausted it stays exhausted.
#[derive(Debug)]
pub struct Need<'a> {
    snapshot: &'a Snapshot,
    device: DeviceId,
    cursor: Option<String>,
    done: bool,
}

impl Iterator for Need<'_> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        if self.done {
            return None;
        }
        let next = self.snapshot.shared.index.read().next_needed(
            self.device,
            self.cursor.as_deref(),
            self.snapshot.stamp,
        );
        match next {
            Some(record) => {
                self.cursor = Some(record.name.clone());
                Some(record)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl FusedIterator for Need<'_> {}
