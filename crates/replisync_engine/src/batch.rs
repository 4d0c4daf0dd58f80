//! Bounded write buffer for catalog updates.

use crate::config::BatchLimits;
use crate::error::FolderResult;
use replisync_types::FileRecord;

/// Groups catalog updates so they are committed in few, bounded batches.
///
/// Callers check [`flush_if_full`](Self::flush_if_full) before every
/// [`append`](Self::append). A committed batch therefore holds at most
/// `max_files` records, and exceeds `max_bytes` by at most its last record.
///
/// [`flush`](Self::flush) must be called once iteration ends, however it
/// ends, or the buffered records are lost.
pub struct BatchAccumulator<F>
where
    F: FnMut(Vec<FileRecord>) -> FolderResult<()>,
{
    limits: BatchLimits,
    records: Vec<FileRecord>,
    bytes: usize,
    commit: F,
    appended: usize,
    committed: usize,
}

impl<F> BatchAccumulator<F>
where
    F: FnMut(Vec<FileRecord>) -> FolderResult<()>,
{
    /// Creates an empty accumulator that hands full batches to `commit`.
    pub fn new(limits: BatchLimits, commit: F) -> Self {
        Self {
            limits,
            records: Vec::new(),
            bytes: 0,
            commit,
            appended: 0,
            committed: 0,
        }
    }

    /// Buffers one record.
    pub fn append(&mut self, record: FileRecord) {
        self.bytes += record.encoded_size();
        self.records.push(record);
        self.appended += 1;
    }

    /// Returns true once either threshold is reached.
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.limits.max_files || self.bytes >= self.limits.max_bytes
    }

    /// Commits the pending records if the batch is full.
    ///
    /// # Errors
    ///
    /// Returns the commit callback's error.
    pub fn flush_if_full(&mut self) -> FolderResult<()> {
        if self.is_full() {
            self.flush()
        } else {
            Ok(())
        }
    }

    /// Commits the pending records, if any, and resets the batch.
    ///
    /// # Errors
    ///
    /// Returns the commit callback's error. The pending records are
    /// dropped either way.
    pub fn flush(&mut self) -> FolderResult<()> {
        if self.records.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(&mut self.records);
        let count = records.len();
        self.bytes = 0;
        (self.commit)(records)?;
        self.committed += count;
        Ok(())
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Estimated size of the pending records.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Total records appended so far.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Total records handed to a successful commit so far.
    pub fn committed(&self) -> usize {
        self.committed
    }
}

impl<F> std::fmt::Debug for BatchAccumulator<F>
where
    F: FnMut(Vec<FileRecord>) -> FolderResult<()>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchAccumulator")
            .field("limits", &self.limits)
            .field("pending", &self.records.len())
            .field("bytes", &self.bytes)
            .field("appended", &self.appended)
            .field("committed", &self.committed)
            .finish()
    }
}
