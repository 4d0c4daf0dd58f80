//! [`Catalog`] implementation backed by a [`ReplicaStore`].

use crate::catalog::{Catalog, CatalogSnapshot};
use replisync_store::{ReplicaStore, Snapshot, StoreResult};
use replisync_types::{DeviceId, FileRecord};

impl Catalog for ReplicaStore {
    type Snapshot = Snapshot;

    fn snapshot(&self) -> StoreResult<Snapshot> {
        ReplicaStore::snapshot(self)
    }

    fn commit_local(&self, records: Vec<FileRecord>) -> StoreResult<Option<u64>> {
        self.commit_batch(DeviceId::LOCAL, records)
    }
}

impl CatalogSnapshot for Snapshot {
    fn get(&self, device: DeviceId, name: &str) -> Option<FileRecord> {
        Snapshot::get(self, device, name)
    }

    fn need(&self, device: DeviceId) -> Box<dyn Iterator<Item = FileRecord> + '_> {
        Box::new(Snapshot::need(self, device))
    }
}
