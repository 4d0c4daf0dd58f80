//! Configuration for send-only folders.

use replisync_types::ShortId;
use std::time::Duration;

/// Default maximum number of records per committed batch.
pub const DEFAULT_MAX_BATCH_FILES: usize = 1000;

/// Default maximum estimated bytes per committed batch.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 250 * 1024;

/// Thresholds of the batch accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum number of records per batch.
    pub max_files: usize,
    /// Maximum estimated encoded size per batch.
    pub max_bytes: usize,
}

impl BatchLimits {
    /// Creates batch limits.
    pub fn new(max_files: usize, max_bytes: usize) -> Self {
        Self {
            max_files,
            max_bytes,
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_FILES, DEFAULT_MAX_BATCH_BYTES)
    }
}

/// Configuration for one send-only folder.
#[derive(Debug, Clone)]
pub struct FolderConfig {
    /// Folder ID, unique within the cluster.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Short ID of the local device, used to stamp overrides.
    pub short_id: ShortId,
    /// Tolerance when comparing modification times.
    pub mod_time_window: Duration,
    /// Whether permission bits are ignored when comparing records.
    pub ignore_permissions: bool,
    /// Batch thresholds.
    pub batch: BatchLimits,
    /// Interval for scheduled pulls by the folder service.
    pub pull_interval: Option<Duration>,
}

impl FolderConfig {
    /// Creates a new folder configuration.
    pub fn new(id: impl Into<String>, short_id: ShortId) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            short_id,
            mod_time_window: Duration::ZERO,
            ignore_permissions: false,
            batch: BatchLimits::default(),
            pull_interval: None,
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the modification time window.
    pub fn with_mod_time_window(mut self, window: Duration) -> Self {
        self.mod_time_window = window;
        self
    }

    /// Sets whether permissions are ignored.
    pub fn with_ignore_permissions(mut self, ignore: bool) -> Self {
        self.ignore_permissions = ignore;
        self
    }

    /// Sets the batch thresholds.
    pub fn with_batch_limits(mut self, batch: BatchLimits) -> Self {
        self.batch = batch;
        self
    }

    /// Sets the interval for scheduled pulls.
    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = Some(interval);
        self
    }

    /// Returns the folder as shown in log lines: `"label" (id)`, or just
    /// the id when no label is set.
    pub fn description(&self) -> String {
        if self.label.is_empty() {
            self.id.clone()
        } else {
            format!("{:?} ({})", self.label, self.id)
        }
    }
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self::new("default", ShortId::new(0))
    }
}
