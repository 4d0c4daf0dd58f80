//! Version vectors.

use crate::device::ShortId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single device counter inside a [`VersionVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counter {
    /// Device the counter belongs to.
    pub id: ShortId,
    /// Number of changes observed from that device.
    pub value: u64,
}

/// Causal relation between two version vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOrdering {
    /// Identical on every device.
    Equal,
    /// Strictly newer: at least one counter higher, none lower.
    Greater,
    /// Strictly older.
    Lesser,
    /// Concurrent, and this side wins the deterministic tie-break.
    ConcurrentGreater,
    /// Concurrent, and the other side wins the deterministic tie-break.
    ConcurrentLesser,
}

impl VectorOrdering {
    /// Returns true for either concurrent variant.
    #[must_use]
    pub fn is_concurrent(self) -> bool {
        matches!(self, Self::ConcurrentGreater | Self::ConcurrentLesser)
    }
}

/// Per-device monotonic counters.
///
/// # Invariants
///
/// - Counters are sorted by device and unique per device
/// - Zero counters are never stored, so equality is structural
///
/// Every operation returns a new vector; nothing mutates in place.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Counter>", into = "Vec<Counter>")]
pub struct VersionVector {
    counters: Vec<Counter>,
}

impl VersionVector {
    /// Creates an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a vector from arbitrary `(device, counter)` pairs.
    ///
    /// Duplicate devices keep their highest counter.
    pub fn from_counters(pairs: impl IntoIterator<Item = (ShortId, u64)>) -> Self {
        let mut counters: Vec<Counter> = pairs
            .into_iter()
            .filter(|(_, value)| *value > 0)
            .map(|(id, value)| Counter { id, value })
            .collect();
        counters.sort_by(|a, b| a.id.cmp(&b.id).then(b.value.cmp(&a.value)));
        counters.dedup_by_key(|c| c.id);
        Self { counters }
    }

    /// Returns true if no device has a counter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns the counter for `id`, zero when absent.
    #[must_use]
    pub fn counter(&self, id: ShortId) -> u64 {
        self.counters
            .binary_search_by(|c| c.id.cmp(&id))
            .map(|idx| self.counters[idx].value)
            .unwrap_or(0)
    }

    /// Iterates over the stored counters in device order.
    pub fn iter(&self) -> impl Iterator<Item = &Counter> {
        self.counters.iter()
    }

    /// Returns a copy with `id`'s counter incremented by one.
    #[must_use]
    pub fn update(&self, id: ShortId) -> Self {
        let mut counters = self.counters.clone();
        match counters.binary_search_by(|c| c.id.cmp(&id)) {
            Ok(idx) => counters[idx].value += 1,
            Err(idx) => counters.insert(idx, Counter { id, value: 1 }),
        }
        Self { counters }
    }

    /// Returns the component-wise maximum of both vectors.
    #[must_use]
    pub fn merge(&self, other: &VersionVector) -> Self {
        let counters = self
            .zip_counters(other)
            .map(|(id, ours, theirs)| Counter {
                id,
                value: ours.max(theirs),
            })
            .collect();
        Self { counters }
    }

    /// Compares two vectors causally.
    ///
    /// Concurrent vectors are ordered by the counter at the highest device
    /// where they differ, so the tie-break is the same from both sides.
    #[must_use]
    pub fn compare(&self, other: &VersionVector) -> VectorOrdering {
        let mut greater = false;
        let mut lesser = false;
        let mut highest_diff_ours = false;

        for (_, ours, theirs) in self.zip_counters(other) {
            if ours > theirs {
                greater = true;
                highest_diff_ours = true;
            } else if ours < theirs {
                lesser = true;
                highest_diff_ours = false;
            }
        }

        match (greater, lesser) {
            (false, false) => VectorOrdering::Equal,
            (true, false) => VectorOrdering::Greater,
            (false, true) => VectorOrdering::Lesser,
            (true, true) if highest_diff_ours => VectorOrdering::ConcurrentGreater,
            (true, true) => VectorOrdering::ConcurrentLesser,
        }
    }

    /// Walks the union of both key sets in device order, yielding
    /// `(device, ours, theirs)` with zero for a missing side.
    fn zip_counters<'a>(
        &'a self,
        other: &'a VersionVector,
    ) -> impl Iterator<Item = (ShortId, u64, u64)> + 'a {
        let (a, b) = (&self.counters, &other.counters);
        let (mut i, mut j) = (0, 0);
        std::iter::from_fn(move || match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) if x.id == y.id => {
                i += 1;
                j += 1;
                Some((x.id, x.value, y.value))
            }
            (Some(x), Some(y)) if x.id < y.id => {
                i += 1;
                Some((x.id, x.value, 0))
            }
            (Some(x), None) => {
                i += 1;
                Some((x.id, x.value, 0))
            }
            (_, Some(y)) => {
                j += 1;
                Some((y.id, 0, y.value))
            }
            (None, None) => None,
        })
    }

    /// Returns true if merging `other` into this vector changes nothing.
    #[must_use]
    pub fn dominates(&self, other: &VersionVector) -> bool {
        matches!(
            self.compare(other),
            VectorOrdering::Equal | VectorOrdering::Greater
        )
    }

    /// Returns true if neither vector dominates the other.
    #[must_use]
    pub fn concurrent(&self, other: &VersionVector) -> bool {
        self.compare(other).is_concurrent()
    }
}

impl From<Vec<Counter>> for VersionVector {
    fn from(counters: Vec<Counter>) -> Self {
        Self::from_counters(counters.into_iter().map(|c| (c.id, c.value)))
    }
}

impl From<VersionVector> for Vec<Counter> {
    fn from(vector: VersionVector) -> Self {
        vector.counters
    }
}

impl fmt::Debug for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.counters.iter().map(|c| (c.id.as_u64(), c.value)))
            .finish()
    }
}
