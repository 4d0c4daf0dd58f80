//! Commit frames: the on-log unit of one atomic batch.
//!
//! Layout (little-endian):
//!
//! ```text
//! | magic "RSCF" (4) | payload len (4) | crc32 of payload (4) | CBOR payload |
//! ```

use crate::backend::LogBackend;
use crate::error::{StoreError, StoreResult};
use replisync_types::{DeviceId, FileRecord};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"RSCF";

/// Size of the fixed frame header.
pub const FRAME_HEADER_SIZE: usize = 12;

/// One committed batch for one device's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFrame {
    /// Catalog the batch belongs to.
    pub device: DeviceId,
    /// Store-wide commit stamp; strictly increasing across frames.
    pub stamp: u64,
    /// Records with their assigned sequence numbers.
    pub records: Vec<FileRecord>,
}

impl CommitFrame {
    /// Encodes the frame including its header.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload).map_err(StoreError::codec)?;

        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::codec("commit frame larger than 4 GiB"))?;

        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&FRAME_MAGIC);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }
}

/// Outcome of reading the frame at one offset.
#[derive(Debug)]
pub enum FrameRead {
    /// A complete frame and the offset right after it.
    Frame(CommitFrame, u64),
    /// The log ends with an incomplete frame starting at this offset.
    Torn(u64),
    /// No bytes remain.
    End,
}

/// Reads the frame starting at `offset`.
///
/// Only a frame that runs past the end of the log is reported as torn: a
/// crash interrupted its append, so it was never acknowledged. A complete
/// frame was synced before its commit returned, so any damage to it is an
/// error, including in the last frame.
pub fn read_frame(log: &dyn LogBackend, offset: u64) -> StoreResult<FrameRead> {
    let size = log.size()?;
    if offset >= size {
        return Ok(FrameRead::End);
    }
    if size - offset < FRAME_HEADER_SIZE as u64 {
        return Ok(FrameRead::Torn(offset));
    }

    let header = log.read_at(offset, FRAME_HEADER_SIZE)?;
    if header[0..4] != FRAME_MAGIC {
        return Err(StoreError::Corrupted {
            offset,
            message: "bad frame magic".into(),
        });
    }
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
    let expected = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

    let payload_start = offset + FRAME_HEADER_SIZE as u64;
    let next = payload_start + len;
    if next > size {
        return Ok(FrameRead::Torn(offset));
    }

    let payload = log.read_at(payload_start, len as usize)?;
    let actual = compute_crc32(&payload);
    if actual != expected {
        return Err(StoreError::ChecksumMismatch { expected, actual });
    }

    let frame: CommitFrame =
        ciborium::from_reader(payload.as_slice()).map_err(StoreError::codec)?;
    Ok(FrameRead::Frame(frame, next))
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use replisync_types::{ShortId, VersionVector};

    fn frame(stamp: u64) -> CommitFrame {
        CommitFrame {
            device: DeviceId::LOCAL,
            stamp,
            records: vec![FileRecord::file("a.txt")
                .with_size(3)
                .with_sequence(stamp)
                .with_version(VersionVector::new().update(ShortId::new(1)))],
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut log = MemoryBackend::new();
        log.append(&frame(1).encode().unwrap()).unwrap();
        log.append(&frame(2).encode().unwrap()).unwrap();

        let FrameRead::Frame(first, next) = read_frame(&log, 0).unwrap() else {
            panic!("expected first frame");
        };
        assert_eq!(first, frame(1));
        let FrameRead::Frame(second, end) = read_frame(&log, next).unwrap() else {
            panic!("expected second frame");
        };
        assert_eq!(second, frame(2));
        assert!(matches!(read_frame(&log, end).unwrap(), FrameRead::End));
    }

    #[test]
    fn short_tail_is_torn() {
        let bytes = frame(1).encode().unwrap();
        let log = MemoryBackend::with_data(bytes[..bytes.len() - 3].to_vec());
        assert!(matches!(read_frame(&log, 0).unwrap(), FrameRead::Torn(0)));

        let log = MemoryBackend::with_data(bytes[..5].to_vec());
        assert!(matches!(read_frame(&log, 0).unwrap(), FrameRead::Torn(0)));
    }

    #[test]
    fn damaged_frame_is_an_error_anywhere() {
        let mut first = frame(1).encode().unwrap();
        let last = first.len() - 1;
        first[last] ^= 0x01;
        let mut log = MemoryBackend::with_data(first);
        assert!(matches!(
            read_frame(&log, 0),
            Err(StoreError::ChecksumMismatch { .. })
        ));

        log.append(&frame(2).encode().unwrap()).unwrap();
        assert!(matches!(
            read_frame(&log, 0),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = frame(1).encode().unwrap();
        bytes[0] = b'X';
        let log = MemoryBackend::with_data(bytes);
        assert!(matches!(
            read_frame(&log, 0),
            Err(StoreError::Corrupted { offset: 0, .. })
        ));
    }
}
