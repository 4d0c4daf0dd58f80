//! Error types for folder operations.

use replisync_store::StoreError;
use thiserror::Error;

/// Result type for folder operations.
pub type FolderResult<T> = Result<T, FolderError>;

/// Errors that can abort a folder operation.
#[derive(Debug, Error)]
pub enum FolderError {
    /// The catalog failed; passed through as reported by the store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The folder service is no longer accepting requests.
    #[error("folder service stopped")]
    ServiceStopped,

    /// A folder operation panicked on the worker.
    #[error("folder task failed: {0}")]
    TaskFailed(String),
}

impl FolderError {
    /// Returns true if the catalog could not be reached at all.
    pub fn is_storage_unavailable(&self) -> bool {
        match self {
            FolderError::Store(err) => err.is_unavailable(),
            _ => false,
        }
    }
}

/// A per-file failure reported by folders that transfer content.
///
/// Send-only folders never produce these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Name of the affected file.
    pub path: String,
    /// Description of the failure.
    pub err: String,
}
