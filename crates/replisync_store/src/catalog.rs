//! Multi-version in-memory index over every device's catalog.

use crate::frame::CommitFrame;
use replisync_types::{needs, select_global, DeviceId, FileRecord};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// One record as committed at one stamp.
#[derive(Debug, Clone)]
struct Version {
    device: DeviceId,
    stamp: u64,
    record: FileRecord,
}

/// Versioned catalog state rebuilt from the commit log.
///
/// # Invariants
///
/// - Versions of a name are kept in commit (stamp) order
/// - A reader at stamp `s` sees, per device, the last version with stamp <= `s`
/// - Per-device sequences only grow
#[derive(Debug, Default)]
pub(crate) struct CatalogIndex {
    files: BTreeMap<String, Vec<Version>>,
    sequences: HashMap<DeviceId, u64>,
    stamp: u64,
}

impl CatalogIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Last applied commit stamp.
    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Last sequence assigned in `device`'s catalog.
    pub(crate) fn sequence(&self, device: DeviceId) -> u64 {
        self.sequences.get(&device).copied().unwrap_or(0)
    }

    /// Number of distinct names across all catalogs.
    pub(crate) fn name_count(&self) -> usize {
        self.files.len()
    }

    /// Applies a committed frame.
    pub(crate) fn apply(&mut self, frame: CommitFrame) {
        let CommitFrame {
            device,
            stamp,
            records,
        } = frame;

        for record in records {
            let seq = self.sequences.entry(device).or_insert(0);
            *seq = (*seq).max(record.sequence);
            self.files
                .entry(record.name.clone())
                .or_default()
                .push(Version {
                    device,
                    stamp,
                    record,
                });
        }
        self.stamp = self.stamp.max(stamp);
    }

    /// Returns `device`'s record for `name` as of `stamp`.
    pub(crate) fn get_at(&self, device: DeviceId, name: &str, stamp: u64) -> Option<&FileRecord> {
        self.files.get(name).and_then(|versions| {
            versions
                .iter()
                .rev()
                .find(|v| v.device == device && v.stamp <= stamp)
                .map(|v| &v.record)
        })
    }

    /// Returns the global record for `name` as of `stamp`.
    pub(crate) fn global_at(&self, name: &str, stamp: u64) -> Option<&FileRecord> {
        self.files
            .get(name)
            .and_then(|versions| select_global(visible(versions, stamp).map(|v| &v.record)))
    }

    /// Returns the first record after `cursor` (in name order) that
    /// `device` needs as of `stamp`.
    pub(crate) fn next_needed(
        &self,
        device: DeviceId,
        cursor: Option<&str>,
        stamp: u64,
    ) -> Option<FileRecord> {
        let lower = match cursor {
            Some(name) => Bound::Excluded(name),
            None => Bound::Unbounded,
        };
        self.files
            .range::<str, _>((lower, Bound::Unbounded))
            .find_map(|(_, versions)| {
                let current: Vec<&Version> = visible(versions, stamp).collect();
                let global = select_global(current.iter().map(|v| &v.record))?;
                let have = current
                    .iter()
                    .find(|v| v.device == device)
                    .map(|v| &v.record);
                needs(global, have).then(|| global.clone())
            })
    }

    /// Drops versions no reader at or after `horizon` can observe.
    ///
    /// Returns the number of versions removed.
    pub(crate) fn compact(&mut self, horizon: u64) -> usize {
        let mut removed = 0;
        for versions in self.files.values_mut() {
            let before = versions.len();
            let mut kept_old: Vec<DeviceId> = Vec::new();
            let mut keep = vec![false; before];
            for (idx, version) in versions.iter().enumerate().rev() {
                if version.stamp > horizon {
                    keep[idx] = true;
                } else if !kept_old.contains(&version.device) {
                    kept_old.push(version.device);
                    keep[idx] = true;
                }
            }
            let mut flags = keep.into_iter();
            versions.retain(|_| flags.next().unwrap_or(true));
            removed += before - versions.len();
        }
        removed
    }
}

/// Latest version per device visible at `stamp`, newest commit first.
fn visible(versions: &[Version], stamp: u64) -> impl Iterator<Item = &Version> {
    let mut seen: Vec<DeviceId> = Vec::new();
    versions.iter().rev().filter(move |v| {
        if v.stamp > stamp || seen.contains(&v.device) {
            return false;
        }
        seen.push(v.device);
        true
    })
}
