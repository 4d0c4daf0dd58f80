//! # replisync types
//!
//! Pure value types for the replisync reconciliation core.
//!
//! This crate provides:
//! - [`DeviceId`] and [`ShortId`] for replica identity
//! - [`VersionVector`] with merge, update and causal comparison
//! - [`FileRecord`], the metadata entity stored in every catalog
//! - [`EquivalenceOptions`] for metadata-only comparison of two records
//! - Global-version selection and the need rule used by catalog stores
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod device;
mod equivalence;
mod global;
mod record;
mod vector;

pub use device::{DeviceId, ShortId};
pub use equivalence::{mod_time_equal, perms_equal, EquivalenceOptions};
pub use global::{needs, newer_than, select_global};
pub use record::{FileKind, FileRecord, LocalFlags, BLOCKS_HASH_SIZE};
pub use vector::{Counter, VectorOrdering, VersionVector};
