//! Error types for catalog storage.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the replica store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A commit frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Attempted to read beyond the end of the log.
    #[error("read beyond end of log: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current log size.
        size: u64,
    },

    /// A frame in the middle of the log is damaged.
    #[error("log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the damaged frame.
        offset: u64,
        /// Description of the damage.
        message: String,
    },

    /// Frame payload does not match its checksum.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the frame header.
        expected: u32,
        /// Checksum of the payload read back.
        actual: u32,
    },

    /// Another process holds the catalog log.
    #[error("catalog locked: another process has exclusive access")]
    Locked,

    /// The store was closed; no further reads or writes are possible.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Creates a codec error from any displayable source.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }

    /// Returns true if the store cannot serve requests at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Closed | StoreError::Locked | StoreError::Io(_))
    }
}
