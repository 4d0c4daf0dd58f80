//! Global-version selection and the need rule.
//!
//! Every name has one "global" record: the version the cluster converges
//! on. A device needs a name when its own record does not already cover the
//! global one.

use crate::record::FileRecord;
use crate::vector::VectorOrdering;

/// Returns true if `candidate` should replace `current` as the global record.
///
/// - A valid record beats an invalid one
/// - A strictly greater version wins
/// - Concurrent versions: newer modification time, then the vector tie-break
/// - Equal versions keep `current`
#[must_use]
pub fn newer_than(candidate: &FileRecord, current: &FileRecord) -> bool {
    if candidate.is_invalid() != current.is_invalid() {
        return !candidate.is_invalid();
    }
    match candidate.version.compare(&current.version) {
        VectorOrdering::Greater => true,
        VectorOrdering::Lesser | VectorOrdering::Equal => false,
        ordering => {
            let (ours, theirs) = (candidate.modified_nanos(), current.modified_nanos());
            if ours != theirs {
                return ours > theirs;
            }
            ordering == VectorOrdering::ConcurrentGreater
        }
    }
}

/// Picks the global record among all devices' records for one name.
pub fn select_global<'a>(
    records: impl IntoIterator<Item = &'a FileRecord>,
) -> Option<&'a FileRecord> {
    records.into_iter().fold(None, |best, candidate| match best {
        Some(current) if !newer_than(candidate, current) => Some(current),
        _ => Some(candidate),
    })
}

/// Returns true if a device holding `have` needs `global`.
#[must_use]
pub fn needs(global: &FileRecord, have: Option<&FileRecord>) -> bool {
    if global.is_invalid() || global.version.is_empty() {
        return false;
    }
    match have {
        None => !global.is_deleted(),
        Some(have) => !have.version.dominates(&global.version),
    }
}
