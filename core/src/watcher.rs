//! Recursive directory watcher.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{Result, WatchError};
use crate::filter::{Decision, EventFilter};
use crate::operation::{Operation, RawKind};

/// Capacity of the channel between the notify thread and consumers.
///
/// A slow consumer blocks the notify thread once this fills, at which point
/// the OS may start dropping events.
pub const CHANNEL_CAPACITY: usize = 10;

/// Watches a directory tree and yields filtered [`Operation`]s in delivery order.
pub struct RecursiveWatcher {
    /// Canonical watch root.
    root: PathBuf,

    /// Internal notify watcher. Dropping it stops delivery.
    watcher: Option<RecommendedWatcher>,

    /// Operation receiver.
    ops_rx: mpsc::Receiver<Operation>,
}

impl RecursiveWatcher {
    /// Start watching `root` recursively.
    ///
    /// Fails when the root does not exist, is not a directory, or cannot be
    /// registered with the OS.
    pub fn start(root: impl AsRef<Path>, filter: EventFilter) -> Result<Self> {
        let root = root.as_ref();

        if !root.exists() {
            return Err(WatchError::DirectoryNotFound(root.display().to_string()));
        }

        if !root.is_dir() {
            return Err(WatchError::Config(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        let root = root.canonicalize()?;
        let (ops_tx, ops_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => forward(event, &filter, &ops_tx),
                Err(e) => error!("Watch error: {e}"),
            },
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!("Watching {}", root.display());

        Ok(Self {
            root,
            watcher: Some(watcher),
            ops_rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive the next operation; `None` once closed.
    pub async fn next(&mut self) -> Option<Operation> {
        if self.watcher.is_none() {
            return None;
        }

        self.ops_rx.recv().await
    }

    /// Stop notification delivery. Operations still queued are discarded.
    pub fn close(&mut self) {
        if self.watcher.take().is_some() {
            self.ops_rx.close();
            info!("Stopped watching {}", self.root.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.watcher.is_none()
    }
}

impl Drop for RecursiveWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Filter a raw notify event and push the surviving paths downstream.
///
/// Runs on the notify thread, so the blocking send is allowed here.
fn forward(event: notify::Event, filter: &EventFilter, ops_tx: &mpsc::Sender<Operation>) {
    let raw_kind = RawKind::from_event_kind(&event.kind);
    if raw_kind.is_empty() {
        return;
    }

    for path in event.paths {
        match filter.decide(&path) {
            Decision::Forward => {}
            Decision::NotIncluded => {
                debug!("Skipping: does not match include path: {}", path.display());
                continue;
            }
            Decision::Excluded => {
                debug!("Skipping: does match exclude path: {}", path.display());
                continue;
            }
        }

        if ops_tx.blocking_send(Operation::new(path, raw_kind)).is_err() {
            debug!("Watcher closed, dropping remaining events");
            return;
        }
    }
}
