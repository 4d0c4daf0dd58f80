//! Folder events.

use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, info, warn};

/// Kinds of events a folder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The folder lifecycle state changed.
    StateChanged,
    /// A batch was committed to the local catalog.
    LocalIndexUpdated,
    /// A local record changed through a scan-like commit (override).
    LocalChangeDetected,
    /// A local record changed to follow a remote one (pull).
    RemoteChangeDetected,
    /// Something that should not happen did.
    Failure,
    /// Operator-facing announcement.
    Info,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::StateChanged => "StateChanged",
            EventKind::LocalIndexUpdated => "LocalIndexUpdated",
            EventKind::LocalChangeDetected => "LocalChangeDetected",
            EventKind::RemoteChangeDetected => "RemoteChangeDetected",
            EventKind::Failure => "Failure",
            EventKind::Info => "Info",
        };
        f.write_str(name)
    }
}

/// Sink for folder events.
///
/// Logging is fire-and-forget: implementations must not fail or block for
/// long, and the folder never learns whether an event was delivered.
pub trait EventLogger: Send + Sync {
    /// Records one event.
    fn log(&self, kind: EventKind, message: &str);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn log(&self, kind: EventKind, message: &str) {
        match kind {
            EventKind::Failure => warn!(event = %kind, "{message}"),
            EventKind::Info => info!(event = %kind, "{message}"),
            _ => debug!(event = %kind, "{message}"),
        }
    }
}

/// Keeps events in memory for testing.
#[derive(Debug, Default)]
pub struct RecordingEventLogger {
    events: Mutex<Vec<(EventKind, String)>>,
}

impl RecordingEventLogger {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event in order.
    pub fn events(&self) -> Vec<(EventKind, String)> {
        self.events.lock().clone()
    }

    /// Returns the messages of every event of `kind`.
    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Counts the events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Forgets every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventLogger for RecordingEventLogger {
    fn log(&self, kind: EventKind, message: &str) {
        self.events.lock().push((kind, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_filters_by_kind() {
        let recorder = RecordingEventLogger::new();
        recorder.log(EventKind::Info, "hello");
        recorder.log(EventKind::Failure, "bad");
        recorder.log(EventKind::Info, "again");

        assert_eq!(recorder.count(EventKind::Info), 2);
        assert_eq!(recorder.messages(EventKind::Failure), vec!["bad"]);
        assert_eq!(recorder.events().len(), 3);

        recorder.clear();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn tracing_logger_accepts_every_kind() {
        let logger = TracingEventLogger;
        for kind in [
            EventKind::StateChanged,
            EventKind::LocalIndexUpdated,
            EventKind::LocalChangeDetected,
            EventKind::RemoteChangeDetected,
            EventKind::Failure,
            EventKind::Info,
        ] {
            logger.log(kind, "message");
        }
        assert_eq!(EventKind::RemoteChangeDetected.to_string(), "RemoteChangeDetected");
    }
}
