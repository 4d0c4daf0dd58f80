//! Send-only folder reconciliation.

use crate::batch::BatchAccumulator;
use crate::catalog::{Catalog, CatalogSnapshot};
use crate::config::FolderConfig;
use crate::error::{FileError, FolderResult};
use crate::events::{EventKind, EventLogger};
use crate::ignore::IgnoreMatcher;
use crate::state::{FolderState, StateTracker};
use parking_lot::Mutex;
use replisync_types::{DeviceId, EquivalenceOptions, FileKind, FileRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Failure reported when a needed deletion names a file we never held.
const DELETED_NOT_HELD: &str =
    "got deleted file that doesn't exist locally as needed when pulling on send-only";

/// How a committed record changed, as reported in change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeAction {
    Added,
    Modified,
    Deleted,
}

impl ChangeAction {
    fn of(record: &FileRecord) -> Self {
        if record.is_deleted() {
            ChangeAction::Deleted
        } else if record.version.iter().count() == 1
            && record.version.iter().all(|c| c.value == 1)
        {
            ChangeAction::Added
        } else {
            ChangeAction::Modified
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ChangeAction::Added => "added",
            ChangeAction::Modified => "modified",
            ChangeAction::Deleted => "deleted",
        }
    }
}

fn kind_name(kind: FileKind) -> &'static str {
    match kind {
        FileKind::File => "file",
        FileKind::Directory => "dir",
        FileKind::Symlink => "symlink",
    }
}

/// A folder whose local state is authoritative.
///
/// A send-only folder never fetches content. It offers two operations:
///
/// - [`pull`](Self::pull) adopts needed records whose content is already
///   present locally, so only version bookkeeping changes
/// - [`force_override`](Self::force_override) makes the local state win for
///   every needed record
///
/// Both run under the folder's exclusive lock and in the
/// [`FolderState::Scanning`] state, returning to idle on every exit path.
pub struct SendOnlyFolder<C, I, E> {
    config: FolderConfig,
    catalog: C,
    ignores: I,
    events: Arc<E>,
    state: StateTracker,
    sync: Mutex<()>,
}

impl<C, I, E> SendOnlyFolder<C, I, E>
where
    C: Catalog,
    I: IgnoreMatcher,
    E: EventLogger + 'static,
{
    /// Creates a folder over `catalog`.
    pub fn new(config: FolderConfig, catalog: C, ignores: I, events: E) -> Self {
        let events = Arc::new(events);
        let state = StateTracker::new(config.id.clone(), events.clone());
        Self {
            config,
            catalog,
            ignores,
            events,
            state,
            sync: Mutex::new(()),
        }
    }

    /// Returns the folder configuration.
    pub fn config(&self) -> &FolderConfig {
        &self.config
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Returns the event logger.
    pub fn events(&self) -> &E {
        &self.events
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> FolderState {
        self.state.state()
    }

    /// Runs `f` while holding the folder's exclusive lock.
    ///
    /// [`pull`](Self::pull) and [`force_override`](Self::force_override)
    /// take this lock themselves and must not be called from `f`.
    pub fn do_in_sync<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.sync.lock();
        f()
    }

    /// Adopts every needed record whose content is already present.
    ///
    /// Ignored names are committed with the ignored flag so need accounting
    /// settles. Invalid records missing locally are committed unchanged as
    /// placeholders. Records that differ locally are left for a content
    /// transfer that this folder does not perform.
    ///
    /// Always reports progress on success.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error if no snapshot can be taken or a batch
    /// cannot be committed.
    pub fn pull(&self) -> FolderResult<bool> {
        self.do_in_sync(|| {
            let _scanning = self.state.enter(FolderState::Scanning);
            self.pull_locked()
        })
    }

    fn pull_locked(&self) -> FolderResult<bool> {
        let snapshot = self.catalog.snapshot()?;
        let opts = EquivalenceOptions::metadata_only(
            self.config.mod_time_window,
            self.config.ignore_permissions,
        );
        let mut batch = BatchAccumulator::new(self.config.batch, |records| {
            self.update_locals(records, EventKind::RemoteChangeDetected)
        });

        for need in snapshot.need(DeviceId::LOCAL) {
            batch.flush_if_full()?;

            if self.ignores.should_ignore(&need.name) {
                debug!(
                    folder = %self.config.id,
                    name = %need.name,
                    "marking needed file as ignored"
                );
                batch.append(need.into_ignored());
                continue;
            }

            let Some(have) = snapshot.get(DeviceId::LOCAL, &need.name) else {
                if need.is_invalid() {
                    // Only exists for need accounting.
                    batch.append(need);
                } else if need.is_deleted() {
                    debug!(
                        folder = %self.config.id,
                        name = %need.name,
                        "needed deletion of a file we do not have"
                    );
                    self.events.log(EventKind::Failure, DELETED_NOT_HELD);
                }
                continue;
            };

            if have.is_equivalent(&need, &opts) {
                debug!(
                    folder = %self.config.id,
                    name = %need.name,
                    "merging versions of identical file"
                );
                batch.append(need);
            } else {
                debug!(
                    folder = %self.config.id,
                    name = %need.name,
                    "skipping needed file that differs locally"
                );
            }
        }

        batch.flush()?;
        Ok(true)
    }

    /// Makes the local state authoritative for every needed record.
    ///
    /// Needed records we hold validly get our content metadata and a
    /// version that dominates both histories. Needed records we lack are
    /// deleted in our name. Records invalid locally are left alone.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error if no snapshot can be taken or a batch
    /// cannot be committed.
    pub fn force_override(&self) -> FolderResult<()> {
        self.do_in_sync(|| {
            let description = self.config.description();
            info!(folder = %description, "overriding global state");
            self.events.log(
                EventKind::Info,
                &format!("Overriding global state on folder {description}"),
            );

            let _scanning = self.state.enter(FolderState::Scanning);
            self.override_locked()
        })
    }

    fn override_locked(&self) -> FolderResult<()> {
        let snapshot = self.catalog.snapshot()?;
        let short_id = self.config.short_id;
        let mut batch = BatchAccumulator::new(self.config.batch, |records| {
            self.update_locals(records, EventKind::LocalChangeDetected)
        });

        for need in snapshot.need(DeviceId::LOCAL) {
            batch.flush_if_full()?;

            let record = match snapshot.get(DeviceId::LOCAL, &need.name) {
                Some(have) if have.is_invalid() => {
                    debug!(
                        folder = %self.config.id,
                        name = %have.name,
                        "not overriding invalid local file"
                    );
                    continue;
                }
                Some(have) if have.name == need.name => {
                    let version = have.version.merge(&need.version).update(short_id);
                    have.with_version(version)
                }
                _ => need.into_tombstone(short_id),
            };

            batch.append(record.with_sequence(0));
        }

        batch.flush()?;
        Ok(())
    }

    /// Returns per-file errors of the last pull.
    ///
    /// Send-only folders transfer no content, so this is always empty.
    pub fn pull_errors(&self) -> Vec<FileError> {
        Vec::new()
    }

    /// Commits one batch to the local catalog and announces it.
    fn update_locals(&self, records: Vec<FileRecord>, change: EventKind) -> FolderResult<()> {
        let changes: Vec<String> = records
            .iter()
            .filter(|record| !record.is_invalid())
            .map(|record| {
                format!(
                    "folder={} path={} type={} action={}",
                    self.config.id,
                    record.name,
                    kind_name(record.kind),
                    ChangeAction::of(record).as_str()
                )
            })
            .collect();
        let count = records.len();

        let sequence = self.catalog.commit_local(records)?.unwrap_or_default();
        debug!(folder = %self.config.id, count, sequence, "updated local index");

        self.events.log(
            EventKind::LocalIndexUpdated,
            &format!(
                "folder={} items={} sequence={}",
                self.config.id, count, sequence
            ),
        );
        for message in &changes {
            self.events.log(change, message);
        }
        Ok(())
    }
}

impl<C, I, E> std::fmt::Debug for SendOnlyFolder<C, I, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendOnlyFolder")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockCatalog;
    use crate::config::BatchLimits;
    use crate::error::FolderError;
    use crate::events::RecordingEventLogger;
    use crate::ignore::{IgnoreList, NoIgnores};
    use replisync_store::StoreError;
    use replisync_types::{LocalFlags, ShortId, VersionVector};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const LOCAL_SHORT: ShortId = ShortId::new(1);
    const REMOTE_SHORT: ShortId = ShortId::new(2);

    fn vv(pairs: &[(ShortId, u64)]) -> VersionVector {
        VersionVector::from_counters(pairs.iter().copied())
    }

    fn config() -> FolderConfig {
        FolderConfig::new("default", LOCAL_SHORT)
    }

    fn folder_with<I: IgnoreMatcher>(
        config: FolderConfig,
        ignores: I,
    ) -> SendOnlyFolder<MockCatalog, I, RecordingEventLogger> {
        SendOnlyFolder::new(config, MockCatalog::new(), ignores, RecordingEventLogger::new())
    }

    fn folder() -> SendOnlyFolder<MockCatalog, NoIgnores, RecordingEventLogger> {
        folder_with(config(), NoIgnores)
    }

    fn file(name: &str) -> FileRecord {
        FileRecord::file(name)
            .with_size(100)
            .with_permissions(0o644)
            .with_modified(1_700_000_000, 0)
    }

    #[test]
    fn pull_adopts_equivalent_file_within_window() {
        let folder = folder_with(
            config().with_mod_time_window(Duration::from_secs(2)),
            NoIgnores,
        );
        folder
            .catalog()
            .insert_local(file("b.txt").with_version(vv(&[(LOCAL_SHORT, 1)])));
        let need = file("b.txt")
            .with_modified(1_700_000_001, 0)
            .with_version(vv(&[(LOCAL_SHORT, 1), (REMOTE_SHORT, 1)]))
            .with_sequence(9);
        folder.catalog().push_need(need.clone());

        assert!(folder.pull().unwrap());

        assert_eq!(folder.catalog().committed(), vec![need]);
        assert_eq!(folder.catalog().open_snapshots(), 0);
        assert_eq!(folder.state(), FolderState::Idle);
        assert_eq!(folder.events().count(EventKind::LocalIndexUpdated), 1);
        assert_eq!(folder.events().count(EventKind::RemoteChangeDetected), 1);
    }

    #[test]
    fn pull_skips_differing_file() {
        let folder = folder();
        folder.catalog().insert_local(file("b.txt"));
        folder
            .catalog()
            .push_need(file("b.txt").with_size(101).with_version(vv(&[(REMOTE_SHORT, 1)])));

        assert!(folder.pull().unwrap());
        assert!(folder.catalog().commits().is_empty());
    }

    #[test]
    fn pull_respects_permission_setting() {
        let strict = folder();
        strict.catalog().insert_local(file("x"));
        strict
            .catalog()
            .push_need(file("x").with_permissions(0o600).with_version(vv(&[(REMOTE_SHORT, 1)])));
        strict.pull().unwrap();
        assert!(strict.catalog().commits().is_empty());

        let lax = folder_with(config().with_ignore_permissions(true), NoIgnores);
        lax.catalog().insert_local(file("x"));
        lax.catalog()
            .push_need(file("x").with_permissions(0o600).with_version(vv(&[(REMOTE_SHORT, 1)])));
        lax.pull().unwrap();
        assert_eq!(lax.catalog().committed().len(), 1);
    }

    #[test]
    fn pull_marks_ignored_names() {
        let folder = folder_with(config(), IgnoreList::new().with_name("skip.me"));
        folder
            .catalog()
            .push_need(file("skip.me").with_version(vv(&[(REMOTE_SHORT, 1)])));

        folder.pull().unwrap();

        let committed = folder.catalog().committed();
        assert_eq!(committed.len(), 1);
        assert!(committed[0].is_ignored());
        assert_eq!(committed[0].local_flags, LocalFlags::IGNORED);
        // Invalid records produce no change event.
        assert_eq!(folder.events().count(EventKind::RemoteChangeDetected), 0);
    }

    #[test]
    fn pull_keeps_invalid_placeholder() {
        let folder = folder();
        let placeholder = file("bad")
            .with_raw_invalid()
            .with_version(vv(&[(REMOTE_SHORT, 1)]));
        folder.catalog().push_need(placeholder.clone());

        folder.pull().unwrap();
        assert_eq!(folder.catalog().committed(), vec![placeholder]);
    }

    #[test]
    fn pull_logs_needed_deletion_of_missing_file() {
        let folder = folder();
        folder.catalog().push_need(
            file("a.txt")
                .with_deleted()
                .with_version(vv(&[(REMOTE_SHORT, 2)])),
        );

        assert!(folder.pull().unwrap());

        assert!(folder.catalog().commits().is_empty());
        assert!(folder.catalog().local("a.txt").is_none());
        let failures = folder.events().messages(EventKind::Failure);
        assert_eq!(
            failures,
            vec!["got deleted file that doesn't exist locally as needed when pulling on send-only"]
        );
    }

    #[test]
    fn pull_skips_missing_regular_file() {
        let folder = folder();
        folder
            .catalog()
            .push_need(file("new.txt").with_version(vv(&[(REMOTE_SHORT, 1)])));
        assert!(folder.pull().unwrap());
        assert!(folder.catalog().commits().is_empty());
        assert_eq!(folder.events().count(EventKind::Failure), 0);
    }

    #[test]
    fn pull_flushes_in_bounded_batches() {
        let folder = folder_with(
            config().with_batch_limits(BatchLimits::new(2, usize::MAX)),
            NoIgnores,
        );
        for name in ["a", "b", "c", "d", "e"] {
            folder.catalog().insert_local(file(name));
            folder
                .catalog()
                .push_need(file(name).with_version(vv(&[(REMOTE_SHORT, 1)])));
        }

        folder.pull().unwrap();

        let sizes: Vec<usize> = folder.catalog().commits().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(folder.events().count(EventKind::LocalIndexUpdated), 3);
    }

    #[test]
    fn snapshot_failure_aborts_and_restores_idle() {
        let folder = folder();
        folder.catalog().set_fail_snapshots(true);

        assert!(matches!(
            folder.pull(),
            Err(FolderError::Store(StoreError::Closed))
        ));
        assert_eq!(folder.state(), FolderState::Idle);
        assert!(matches!(
            folder.force_override(),
            Err(FolderError::Store(StoreError::Closed))
        ));
        assert_eq!(folder.state(), FolderState::Idle);
        assert_eq!(folder.events().count(EventKind::StateChanged), 4);
    }

    #[test]
    fn commit_failure_propagates_and_releases_snapshot() {
        let folder = folder();
        folder.catalog().insert_local(file("a"));
        folder
            .catalog()
            .push_need(file("a").with_version(vv(&[(REMOTE_SHORT, 1)])));
        folder.catalog().set_fail_commits(true);

        assert!(matches!(
            folder.pull(),
            Err(FolderError::Store(StoreError::Closed))
        ));
        assert_eq!(folder.catalog().open_snapshots(), 0);
        assert_eq!(folder.state(), FolderState::Idle);
    }

    #[test]
    fn override_merges_and_bumps_local_counter() {
        let folder = folder();
        let have = file("c.txt").with_version(vv(&[(LOCAL_SHORT, 2)])).with_sequence(5);
        folder.catalog().insert_local(have.clone());
        folder.catalog().push_need(
            file("c.txt")
                .with_size(7)
                .with_version(vv(&[(LOCAL_SHORT, 1), (REMOTE_SHORT, 3)])),
        );

        folder.force_override().unwrap();

        let committed = folder.catalog().committed();
        assert_eq!(committed.len(), 1);
        let record = &committed[0];
        assert_eq!(record.version, vv(&[(LOCAL_SHORT, 3), (REMOTE_SHORT, 3)]));
        assert_eq!(record.sequence, 0);
        // Content metadata comes from the local record.
        assert_eq!(record.size, have.size);
        assert!(record.version.dominates(&have.version));

        assert_eq!(folder.events().count(EventKind::LocalChangeDetected), 1);
        assert_eq!(folder.events().count(EventKind::Info), 1);
        assert_eq!(folder.state(), FolderState::Idle);
    }

    #[test]
    fn override_announcement_waits_for_the_folder_lock() {
        let folder = &folder();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|scope| {
            scope.spawn(move || {
                folder.do_in_sync(|| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
            });
            entered_rx.recv().unwrap();

            let overriding = scope.spawn(move || folder.force_override());
            thread::sleep(Duration::from_millis(50));
            assert_eq!(folder.events().count(EventKind::Info), 0);

            release_tx.send(()).unwrap();
            overriding.join().unwrap().unwrap();
        });

        assert_eq!(folder.events().count(EventKind::Info), 1);
        assert_eq!(folder.state(), FolderState::Idle);
    }

    #[test]
    fn override_tombstones_missing_files() {
        let folder = folder();
        folder
            .catalog()
            .push_need(file("gone.txt").with_version(vv(&[(REMOTE_SHORT, 4)])));

        folder.force_override().unwrap();

        let committed = folder.catalog().committed();
        assert_eq!(committed.len(), 1);
        let record = &committed[0];
        assert!(record.is_deleted());
        assert_eq!(record.size, 0);
        assert_eq!(record.modified_by, LOCAL_SHORT);
        assert_eq!(record.version, vv(&[(LOCAL_SHORT, 1), (REMOTE_SHORT, 4)]));
        assert_eq!(record.sequence, 0);
        let changes = folder.events().messages(EventKind::LocalChangeDetected);
        assert!(changes[0].contains("action=deleted"));
    }

    #[test]
    fn override_never_touches_invalid_local_files() {
        let folder = folder();
        for flags in [LocalFlags::IGNORED, LocalFlags::MUST_RESCAN, LocalFlags::UNSUPPORTED] {
            let name = format!("bad-{}", flags.bits());
            folder.catalog().insert_local(file(&name).with_local_flags(flags));
            folder
                .catalog()
                .push_need(file(&name).with_version(vv(&[(REMOTE_SHORT, 1)])));
        }

        folder.force_override().unwrap();
        assert!(folder.catalog().commits().is_empty());
    }

    #[test]
    fn pull_errors_are_always_empty() {
        let folder = folder();
        folder.pull().unwrap();
        assert!(folder.pull_errors().is_empty());
    }

    #[test]
    fn do_in_sync_runs_closure() {
        let folder = folder();
        let state = folder.do_in_sync(|| folder.state());
        assert_eq!(state, FolderState::Idle);
    }
}
