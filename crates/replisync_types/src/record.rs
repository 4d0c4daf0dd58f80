//! File records.

use crate::device::ShortId;
use crate::vector::VersionVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of a content digest.
pub const BLOCKS_HASH_SIZE: usize = 32;

/// Fixed per-record overhead used by [`FileRecord::encoded_size`].
const RECORD_OVERHEAD: usize = 64;

/// Bytes per version-vector counter in [`FileRecord::encoded_size`].
const COUNTER_SIZE: usize = 16;

/// Kind of filesystem object a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileKind {
    /// Regular file.
    #[default]
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

/// Local administrative flags.
///
/// Any set flag makes the record invalid: the local device cannot or will
/// not offer its content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocalFlags(u32);

impl LocalFlags {
    /// No flags.
    pub const NONE: LocalFlags = LocalFlags(0);
    /// Excluded by an ignore rule.
    pub const IGNORED: LocalFlags = LocalFlags(1 << 0);
    /// Must be rescanned before its metadata can be trusted.
    pub const MUST_RESCAN: LocalFlags = LocalFlags(1 << 1);
    /// Not representable on this device.
    pub const UNSUPPORTED: LocalFlags = LocalFlags(1 << 2);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: LocalFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Returns these flags with `other` added.
    #[must_use]
    pub const fn union(self, other: LocalFlags) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns these flags with `other` removed.
    #[must_use]
    pub const fn without(self, other: LocalFlags) -> Self {
        Self(self.0 & !other.0)
    }
}

impl fmt::Debug for LocalFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.contains(Self::IGNORED) {
            set.entry(&"ignored");
        }
        if self.contains(Self::MUST_RESCAN) {
            set.entry(&"must-rescan");
        }
        if self.contains(Self::UNSUPPORTED) {
            set.entry(&"unsupported");
        }
        set.finish()
    }
}

/// Metadata for one file in one device's catalog.
///
/// A record never carries content. Deletion is a flag: deleted records stay
/// in the catalog so their version history keeps converging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the folder root; unique within a catalog.
    pub name: String,
    /// Object kind.
    pub kind: FileKind,
    /// Size in bytes (zero for deleted records).
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub modified_s: i64,
    /// Sub-second part of the modification time.
    pub modified_ns: u32,
    /// Permission bits.
    pub permissions: u32,
    /// Permission bits are meaningless for this record.
    pub no_permissions: bool,
    /// The file was deleted.
    pub deleted: bool,
    /// Announced as invalid by its owner.
    pub raw_invalid: bool,
    /// Local administrative flags.
    pub local_flags: LocalFlags,
    /// Causal history.
    pub version: VersionVector,
    /// Store-assigned sequence; zero until committed.
    pub sequence: u64,
    /// Device that made the latest change.
    pub modified_by: ShortId,
    /// Digest of the content, when known.
    pub blocks_hash: Option<[u8; BLOCKS_HASH_SIZE]>,
}

impl FileRecord {
    /// Creates an empty record for `name`.
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
            size: 0,
            modified_s: 0,
            modified_ns: 0,
            permissions: 0,
            no_permissions: false,
            deleted: false,
            raw_invalid: false,
            local_flags: LocalFlags::NONE,
            version: VersionVector::new(),
            sequence: 0,
            modified_by: ShortId::new(0),
            blocks_hash: None,
        }
    }

    /// Creates a regular file record.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileKind::File)
    }

    /// Sets the size.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the modification time.
    #[must_use]
    pub fn with_modified(mut self, secs: i64, nanos: u32) -> Self {
        self.modified_s = secs;
        self.modified_ns = nanos;
        self
    }

    /// Sets the permission bits.
    #[must_use]
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the version vector.
    #[must_use]
    pub fn with_version(mut self, version: VersionVector) -> Self {
        self.version = version;
        self
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets the content digest.
    #[must_use]
    pub fn with_blocks_hash(mut self, hash: [u8; BLOCKS_HASH_SIZE]) -> Self {
        self.blocks_hash = Some(hash);
        self
    }

    /// Sets the local flags.
    #[must_use]
    pub fn with_local_flags(mut self, flags: LocalFlags) -> Self {
        self.local_flags = flags;
        self
    }

    /// Marks the record as announced invalid.
    #[must_use]
    pub fn with_raw_invalid(mut self) -> Self {
        self.raw_invalid = true;
        self
    }

    /// Marks the record deleted without touching its version.
    #[must_use]
    pub fn with_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Returns true if the file was deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns true if the record cannot be trusted as a content source.
    ///
    /// Ignored, unsupported and must-rescan records are all invalid.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.raw_invalid || !self.local_flags.is_empty()
    }

    /// Returns true if an ignore rule excludes the record.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.local_flags.contains(LocalFlags::IGNORED)
    }

    /// Returns true if the record must be rescanned.
    #[must_use]
    pub fn must_rescan(&self) -> bool {
        self.local_flags.contains(LocalFlags::MUST_RESCAN)
    }

    /// Returns the record with exactly the ignored flag set.
    #[must_use]
    pub fn into_ignored(mut self) -> Self {
        self.local_flags = LocalFlags::IGNORED;
        self
    }

    /// Returns a tombstone for this record, stamped by `by`.
    ///
    /// The version is bumped for `by`, the modification time becomes now
    /// and all content metadata is dropped.
    #[must_use]
    pub fn into_tombstone(self, by: ShortId) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            deleted: true,
            modified_by: by,
            version: self.version.update(by),
            modified_s: i64::try_from(now.as_secs()).unwrap_or(i64::MAX),
            modified_ns: now.subsec_nanos(),
            size: 0,
            blocks_hash: None,
            ..self
        }
    }

    /// Modification time as nanoseconds since the Unix epoch.
    #[must_use]
    pub fn modified_nanos(&self) -> i128 {
        i128::from(self.modified_s) * 1_000_000_000 + i128::from(self.modified_ns)
    }

    /// Estimated serialized size, used for batch byte accounting.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        let hash = if self.blocks_hash.is_some() {
            BLOCKS_HASH_SIZE
        } else {
            0
        };
        RECORD_OVERHEAD + self.name.len() + self.version.iter().count() * COUNTER_SIZE + hash
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, size={}, seq={}, deleted={}, invalid={}, version={:?})",
            self.name,
            self.kind,
            self.size,
            self.sequence,
            self.deleted,
            self.is_invalid(),
            self.version
        )
    }
}
