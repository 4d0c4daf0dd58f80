//! Metadata equivalence between records.

use crate::record::{FileKind, FileRecord, LocalFlags};
use std::time::Duration;

/// Permission bits that take part in comparisons.
const PERMISSION_MASK: u32 = 0o777;

/// Tunables for [`FileRecord::is_equivalent`].
///
/// Version and sequence fields are never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EquivalenceOptions {
    /// Modification times closer than this are equal. Zero means exact.
    pub mod_time_window: Duration,
    /// Skip permission bits entirely.
    pub ignore_permissions: bool,
    /// Skip the content digest.
    pub ignore_blocks: bool,
    /// Local flags masked out of both sides before comparing.
    pub ignore_flags: LocalFlags,
}

impl EquivalenceOptions {
    /// Options for metadata-only convergence.
    ///
    /// Content digests and local flags always take part, so genuinely
    /// different content is never accepted.
    #[must_use]
    pub fn metadata_only(mod_time_window: Duration, ignore_permissions: bool) -> Self {
        Self {
            mod_time_window,
            ignore_permissions,
            ignore_blocks: false,
            ignore_flags: LocalFlags::NONE,
        }
    }
}

/// Compares the permission bits that matter.
#[must_use]
pub fn perms_equal(a: u32, b: u32) -> bool {
    a & PERMISSION_MASK == b & PERMISSION_MASK
}

/// Compares two modification times (in nanoseconds) within `window`.
#[must_use]
pub fn mod_time_equal(a_nanos: i128, b_nanos: i128, window: Duration) -> bool {
    if a_nanos == b_nanos {
        return true;
    }
    (a_nanos - b_nanos).abs() < window.as_nanos() as i128
}

impl FileRecord {
    /// Returns true if both records describe the same content.
    #[must_use]
    pub fn is_equivalent(&self, other: &FileRecord, opts: &EquivalenceOptions) -> bool {
        if self.must_rescan() || other.must_rescan() {
            return false;
        }

        let ours = self.local_flags.without(opts.ignore_flags);
        let theirs = other.local_flags.without(opts.ignore_flags);
        let ours_invalid = self.raw_invalid || !ours.is_empty();
        let theirs_invalid = other.raw_invalid || !theirs.is_empty();

        if self.name != other.name
            || self.kind != other.kind
            || self.deleted != other.deleted
            || ours_invalid != theirs_invalid
        {
            return false;
        }

        if !opts.ignore_permissions
            && !self.no_permissions
            && !other.no_permissions
            && !perms_equal(self.permissions, other.permissions)
        {
            return false;
        }

        match self.kind {
            FileKind::File => {
                self.size == other.size
                    && mod_time_equal(
                        self.modified_nanos(),
                        other.modified_nanos(),
                        opts.mod_time_window,
                    )
                    && (opts.ignore_blocks || self.blocks_match(other))
            }
            FileKind::Symlink => self.blocks_match(other),
            FileKind::Directory => true,
        }
    }

    /// A digest known on only one side cannot vouch for the content, so it
    /// counts as a mismatch.
    fn blocks_match(&self, other: &FileRecord) -> bool {
        match (&self.blocks_hash, &other.blocks_hash) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }
}
