//! Single-worker service running a folder's operations.
//!
//! ```text
//!   FolderHandle ──(Pull / Override / Shutdown)──▶ worker task
//!        ▲                                            │
//!        └──────────────── oneshot reply ◀────────────┤
//!                                                     ▼
//!                                     blocking pool: SendOnlyFolder
//! ```
//!
//! The worker handles one request at a time, so operations on one folder
//! never overlap. Different folders get different workers and proceed
//! independently.

use crate::catalog::Catalog;
use crate::error::{FolderError, FolderResult};
use crate::events::EventLogger;
use crate::folder::SendOnlyFolder;
use crate::ignore::IgnoreMatcher;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the request queue.
const QUEUE_CAPACITY: usize = 16;

enum Command {
    Pull(oneshot::Sender<FolderResult<bool>>),
    Override(oneshot::Sender<FolderResult<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running folder service.
///
/// Clones address the same worker.
#[derive(Debug, Clone)]
pub struct FolderHandle {
    folder_id: String,
    tx: mpsc::Sender<Command>,
}

impl FolderHandle {
    /// Returns the ID of the served folder.
    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// Runs a pull and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns the pull's error, or [`FolderError::ServiceStopped`] once the
    /// service is shut down.
    pub async fn pull(&self) -> FolderResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Pull(reply)).await?;
        rx.await.map_err(|_| FolderError::ServiceStopped)?
    }

    /// Runs an override and waits for it to complete.
    ///
    /// # Errors
    ///
    /// Returns the override's error, or [`FolderError::ServiceStopped`] once
    /// the service is shut down.
    pub async fn force_override(&self) -> FolderResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Override(reply)).await?;
        rx.await.map_err(|_| FolderError::ServiceStopped)?
    }

    /// Stops the worker after the request in progress, if any.
    ///
    /// Requests queued behind the shutdown fail with
    /// [`FolderError::ServiceStopped`].
    ///
    /// # Errors
    ///
    /// Returns [`FolderError::ServiceStopped`] if already stopped.
    pub async fn shutdown(&self) -> FolderResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown(reply)).await?;
        rx.await.map_err(|_| FolderError::ServiceStopped)
    }

    /// Returns true once the worker has stopped.
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> FolderResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| FolderError::ServiceStopped)
    }
}

/// Spawns services for send-only folders.
pub struct FolderService;

impl FolderService {
    /// Spawns the worker for `folder` on the current tokio runtime.
    ///
    /// If the folder configures a pull interval, the worker also pulls on
    /// that schedule, between requests.
    pub fn spawn<C, I, E>(folder: Arc<SendOnlyFolder<C, I, E>>) -> FolderHandle
    where
        C: Catalog + 'static,
        I: IgnoreMatcher + 'static,
        E: EventLogger + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let folder_id = folder.config().id.clone();
        tokio::spawn(run(folder, rx));
        FolderHandle { folder_id, tx }
    }
}

async fn run<C, I, E>(folder: Arc<SendOnlyFolder<C, I, E>>, mut rx: mpsc::Receiver<Command>)
where
    C: Catalog + 'static,
    I: IgnoreMatcher + 'static,
    E: EventLogger + 'static,
{
    let description = folder.config().description();
    let mut ticker = folder.config().pull_interval.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    info!(folder = %description, "folder service starting");

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Pull(reply)) => {
                    let result = run_blocking(&folder, |folder| folder.pull()).await;
                    let _ = reply.send(result);
                }
                Some(Command::Override(reply)) => {
                    let result = run_blocking(&folder, |folder| folder.force_override()).await;
                    let _ = reply.send(result);
                }
                Some(Command::Shutdown(reply)) => {
                    rx.close();
                    let _ = reply.send(());
                    break;
                }
                None => break,
            },

            _ = tick(&mut ticker) => {
                debug!(folder = %description, "scheduled pull");
                if let Err(e) = run_blocking(&folder, |folder| folder.pull()).await {
                    warn!(folder = %description, error = %e, "scheduled pull failed");
                }
            }
        }
    }

    info!(folder = %description, "folder service stopped");
}

/// Waits for the next scheduled tick, or forever without a schedule.
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn run_blocking<C, I, E, T, F>(
    folder: &Arc<SendOnlyFolder<C, I, E>>,
    op: F,
) -> FolderResult<T>
where
    C: Catalog + 'static,
    I: IgnoreMatcher + 'static,
    E: EventLogger + 'static,
    T: Send + 'static,
    F: FnOnce(&SendOnlyFolder<C, I, E>) -> FolderResult<T> + Send + 'static,
{
    let folder = Arc::clone(folder);
    tokio::task::spawn_blocking(move || op(&folder))
        .await
        .map_err(|e| FolderError::TaskFailed(e.to_string()))?
}
