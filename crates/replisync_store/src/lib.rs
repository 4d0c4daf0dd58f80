//! # replisync store
//!
//! Append-only, sequenced catalog of file records, one catalog per device.
//!
//! The store is the only shared mutable resource of a folder. It offers:
//!
//! - Consistent point-in-time read views ([`Snapshot`]) that are released
//!   exactly once, explicitly or on drop
//! - A lazy [`Need`] query listing every record a device should receive
//! - Atomic batch commits with store-assigned, per-device sequence numbers
//!
//! ## Durability
//!
//! Every batch is written as one checksummed commit frame and synced
//! before it becomes visible. Opening a store replays the log; a frame
//! torn by a crash mid-append is cut off, while a complete frame with a bad
//! checksum fails the open.
//!
//! ## Backends
//!
//! - [`MemoryBackend`] - For tests and ephemeral folders
//! - [`FileBackend`] - A single exclusively locked log file
//!
//! ## Example
//!
//! ```rust
//! use replisync_store::ReplicaStore;
//! use replisync_types::{DeviceId, FileRecord, ShortId, VersionVector};
//!
//! let store = ReplicaStore::in_memory();
//! let remote = DeviceId::from_bytes([1; 32]);
//! let version = VersionVector::new().update(ShortId::new(1));
//! store
//!     .commit_batch(remote, vec![FileRecord::file("a.txt").with_version(version)])
//!     .unwrap();
//!
//! let snapshot = store.snapshot().unwrap();
//! let needed: Vec<_> = snapshot.need(DeviceId::LOCAL).collect();
//! assert_eq!(needed.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod catalog;
mod error;
mod file;
mod frame;
mod memory;
mod snapshot;
mod store;

pub use backend::LogBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use frame::{compute_crc32, read_frame, CommitFrame, FrameRead, FRAME_HEADER_SIZE, FRAME_MAGIC};
pub use memory::MemoryBackend;
pub use snapshot::{Need, Snapshot};
pub use store::ReplicaStore;
