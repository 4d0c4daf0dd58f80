//! Benchmark utilities.

use rand::Rng;
use replisync_store::ReplicaStore;
use replisync_types::{DeviceId, FileRecord, ShortId, VersionVector};

/// Short ID of the device benchmarks run as.
pub const LOCAL_SHORT: ShortId = ShortId::new(1);

/// Returns the remote device with short ID `n`.
pub fn remote_device(n: u64) -> DeviceId {
    let mut bytes = [0x22u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    DeviceId::from_bytes(bytes)
}

/// Generates `count` files with random sizes and modification times.
pub fn random_files(count: usize) -> Vec<FileRecord> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            FileRecord::file(format!("dir{:02}/file{:06}.dat", i % 32, i))
                .with_size(rng.gen_range(0..10_000_000))
                .with_modified(
                    rng.gen_range(1_500_000_000..1_700_000_000),
                    rng.gen_range(0..1_000_000_000),
                )
                .with_permissions(0o644)
        })
        .collect()
}

/// Seeds a store where a remote device holds newer versions of every
/// local file, with identical content.
///
/// # Panics
///
/// Panics if a commit fails.
pub fn diverged_store(count: usize) -> ReplicaStore {
    let store = ReplicaStore::in_memory();
    let local = random_files(count);
    let remote_short = ShortId::new(2);
    let remote: Vec<FileRecord> = local
        .iter()
        .cloned()
        .map(|record| {
            let version = record.version.update(LOCAL_SHORT).update(remote_short);
            record.with_version(version)
        })
        .collect();
    let local: Vec<FileRecord> = local
        .into_iter()
        .map(|record| {
            let version = VersionVector::new().update(LOCAL_SHORT);
            record.with_version(version)
        })
        .collect();

    store.commit_batch(DeviceId::LOCAL, local).expect("seeding local catalog");
    store
        .commit_batch(remote_device(2), remote)
        .expect("seeding remote catalog");
    store
}
