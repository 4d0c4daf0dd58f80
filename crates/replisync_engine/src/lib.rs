//! # replisync engine
//!
//! Reconciliation for send-only folders.
//!
//! This crate provides:
//! - [`SendOnlyFolder`] with its two operations: metadata pull and forced
//!   override
//! - [`BatchAccumulator`], the bounded write buffer in front of the catalog
//! - The Idle/Scanning folder lifecycle ([`StateTracker`])
//! - [`FolderService`], a single-worker actor per folder
//! - Seams to storage ([`Catalog`]), ignores ([`IgnoreMatcher`]) and
//!   events ([`EventLogger`]), each with an implementation for testing
//!
//! ## Operations
//!
//! **Pull** walks the records the local device needs. A record whose
//! content already exists locally is committed as is, so its version
//! history is adopted without transferring bytes. Everything else is left
//! to a content-transferring folder type.
//!
//! **Override** makes the local device authoritative. Needed records get
//! the local content metadata and a version dominating both sides, or are
//! deleted in the local device's name when absent locally.
//!
//! ## Key Invariants
//!
//! - One operation at a time per folder
//! - The folder is idle again after every operation, however it ended
//! - Snapshots are released on every exit path
//! - Storage errors reach the caller unchanged; anomalies are only logged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod catalog;
mod config;
mod error;
mod events;
mod folder;
mod ignore;
mod service;
mod state;
mod store_catalog;

pub use batch::BatchAccumulator;
pub use catalog::{Catalog, CatalogSnapshot, MockCatalog, MockSnapshot};
pub use config::{BatchLimits, FolderConfig, DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_FILES};
pub use error::{FileError, FolderError, FolderResult};
pub use events::{EventKind, EventLogger, RecordingEventLogger, TracingEventLogger};
pub use folder::SendOnlyFolder;
pub use ignore::{IgnoreList, IgnoreMatcher, NoIgnores};
pub use service::{FolderHandle, FolderService};
pub use state::{FolderState, StateGuard, StateTracker};
