//! # replisync testkit
//!
//! Test utilities for replisync.
//!
//! This crate provides:
//! - Devices, records and stores for tests ([`fixtures`])
//! - Property-based test generators using proptest ([`generators`])
//! - Log output for tests ([`init_tracing`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replisync_testkit::prelude::*;
//!
//! #[test]
//! fn needs_remote_file() {
//!     let store = memory_store();
//!     seed_remote(&store, remote_device(1), vec![versioned("a.txt", &[(1, 1)])]);
//!     assert_eq!(needed_names(&store), vec!["a.txt"]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::init_tracing;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::init_tracing;
