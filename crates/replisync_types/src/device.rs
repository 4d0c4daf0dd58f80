//! Device identities.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Globally unique identifier of a participating device.
///
/// Catalogs are keyed by `DeviceId`. The distinguished [`DeviceId::LOCAL`]
/// value stands for "this replica" regardless of the real identity of the
/// device the catalog lives on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId([u8; 32]);

impl DeviceId {
    /// The local replica.
    pub const LOCAL: DeviceId = DeviceId([0xff; 32]);

    /// Creates a device ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives a device ID from a DER-encoded certificate.
    #[must_use]
    pub fn from_certificate(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true for [`DeviceId::LOCAL`].
    #[must_use]
    pub fn is_local(&self) -> bool {
        *self == Self::LOCAL
    }

    /// Returns the short form used as a version-vector key.
    #[must_use]
    pub fn short_id(&self) -> ShortId {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        ShortId(u64::from_be_bytes(head))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            return f.write_str("LOCAL");
        }
        for (i, chunk) in self.0.chunks(4).enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            for byte in chunk {
                write!(f, "{byte:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.short_id())
    }
}

/// The first 64 bits of a [`DeviceId`].
///
/// Short IDs key version-vector counters; collisions are treated as the
/// same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShortId(pub u64);

impl ShortId {
    /// Creates a short ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}
