//! Commit log backend trait.

use crate::error::StoreResult;

/// Byte storage underneath the catalog's commit log.
///
/// Backends know nothing about frames or records; the store owns the
/// format.
///
/// # Invariants
///
/// - `append` returns the offset where the bytes start
/// - `read_at` returns exactly the bytes previously appended there
/// - After `sync` returns, every appended byte survives a crash
pub trait LogBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the range extends past the end of the log or on I/O errors.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends bytes to the end of the log and returns their offset.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Makes every appended byte durable.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    fn sync(&mut self) -> StoreResult<()>;

    /// Returns the current log size, i.e. the next append offset.
    ///
    /// # Errors
    ///
    /// Fails if the size cannot be determined.
    fn size(&self) -> StoreResult<u64>;

    /// Drops every byte after `new_size`.
    ///
    /// Used to cut off a torn frame left by a crash mid-append.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` is past the end or on I/O errors.
    fn truncate(&mut self, new_size: u64) -> StoreResult<()>;
}
