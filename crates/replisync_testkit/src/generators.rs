//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random catalog data.

use proptest::prelude::*;
use replisync_types::{FileRecord, LocalFlags, ShortId, VersionVector};

/// Strategy for short IDs drawn from a small pool, so vectors overlap.
pub fn short_id_strategy() -> impl Strategy<Value = ShortId> {
    (1u64..6).prop_map(ShortId::new)
}

/// Strategy for version vectors over a small pool of devices.
pub fn version_vector_strategy() -> impl Strategy<Value = VersionVector> {
    prop::collection::vec((short_id_strategy(), 0u64..5), 0..5)
        .prop_map(|pairs| VersionVector::from_counters(pairs))
}

/// Strategy for relative file names, optionally nested one level.
pub fn file_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}(/[a-z]{1,8})?(\\.txt)?").expect("Invalid regex")
}

/// Strategy for local flag sets.
pub fn local_flags_strategy() -> impl Strategy<Value = LocalFlags> {
    prop_oneof![
        4 => Just(LocalFlags::NONE),
        1 => Just(LocalFlags::IGNORED),
        1 => Just(LocalFlags::MUST_RESCAN),
        1 => Just(LocalFlags::UNSUPPORTED),
    ]
}

/// Strategy for valid, non-deleted file records.
pub fn file_record_strategy() -> impl Strategy<Value = FileRecord> {
    (
        file_name_strategy(),
        0u64..1_000_000,
        0i64..2_000_000_000,
        0u32..1_000_000_000,
        prop_oneof![Just(0o644u32), Just(0o600u32), Just(0o755u32)],
        version_vector_strategy(),
    )
        .prop_map(|(name, size, secs, nanos, perms, version)| {
            FileRecord::file(name)
                .with_size(size)
                .with_modified(secs, nanos)
                .with_permissions(perms)
                .with_version(version)
        })
}

/// Strategy for records that may be deleted or carry local flags.
pub fn any_record_strategy() -> impl Strategy<Value = FileRecord> {
    (file_record_strategy(), any::<bool>(), local_flags_strategy()).prop_map(
        |(record, deleted, flags)| {
            let record = record.with_local_flags(flags);
            if deleted {
                record.with_deleted()
            } else {
                record
            }
        },
    )
}
