//! Folder lifecycle state.

use crate::events::{EventKind, EventLogger};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The lifecycle state of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    /// No operation is running.
    Idle,
    /// An operation is reading or rewriting the local catalog.
    Scanning,
}

impl FolderState {
    /// Returns true while an operation is running.
    pub fn is_busy(&self) -> bool {
        matches!(self, FolderState::Scanning)
    }
}

impl fmt::Display for FolderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderState::Idle => f.write_str("idle"),
            FolderState::Scanning => f.write_str("scanning"),
        }
    }
}

/// Tracks and announces a folder's lifecycle state.
pub struct StateTracker {
    folder: String,
    inner: RwLock<(FolderState, Instant)>,
    events: Arc<dyn EventLogger>,
}

impl StateTracker {
    /// Creates a tracker in the idle state.
    pub fn new(folder: impl Into<String>, events: Arc<dyn EventLogger>) -> Self {
        Self {
            folder: folder.into(),
            inner: RwLock::new((FolderState::Idle, Instant::now())),
            events,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> FolderState {
        self.inner.read().0
    }

    /// Returns when the state last changed.
    pub fn changed_at(&self) -> Instant {
        self.inner.read().1
    }

    /// Enters `state` until the returned guard is dropped.
    ///
    /// The guard restores [`FolderState::Idle`] on every exit path,
    /// including early returns and panics.
    #[must_use = "the folder returns to idle as soon as the guard is dropped"]
    pub fn enter(&self, state: FolderState) -> StateGuard<'_> {
        self.set_state(state);
        StateGuard { tracker: self }
    }

    /// Moves to `state`, announcing the change. Setting the current state
    /// again does nothing.
    pub fn set_state(&self, state: FolderState) {
        let (from, duration) = {
            let mut inner = self.inner.write();
            let (from, since) = *inner;
            if from == state {
                return;
            }
            let now = Instant::now();
            *inner = (state, now);
            (from, now.duration_since(since))
        };

        debug!(folder = %self.folder, %from, to = %state, ?duration, "folder state changed");
        self.events.log(
            EventKind::StateChanged,
            &format!(
                "folder={} from={} to={} duration={:.3}s",
                self.folder,
                from,
                state,
                duration.as_secs_f64()
            ),
        );
    }
}

impl fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTracker")
            .field("folder", &self.folder)
            .field("state", &self.state())
            .finish()
    }
}

/// Returns the folder to idle when dropped.
#[derive(Debug)]
pub struct StateGuard<'a> {
    tracker: &'a StateTracker,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.tracker.set_state(FolderState::Idle);
    }
}
