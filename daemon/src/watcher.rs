/// Recursive filesystem watcher over the log folder.
///
/// notify delivers events on its own thread; they are forwarded over a tokio
/// channel to an async loop that dispatches every newly created log file to
/// the engine. Only creation events count: arcdps writes each log once.
use notify::event::CreateKind;
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{is_log_file, IngestionEngine};
use crate::error::WatchError;
use crate::status::Status;

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// A running watcher. Must be stopped (or dropped) to release the OS watch.
pub struct FolderWatcher {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl FolderWatcher {
    /// Starts watching the engine's log folder.
    ///
    /// A missing folder sets the status to `DISCONNECTED` and returns an
    /// error; the periodic rescan keeps running regardless.
    pub fn start(engine: Arc<IngestionEngine>) -> Result<Self, WatchError> {
        let folder = engine.folder().to_path_buf();
        if !folder.is_dir() {
            engine
                .status()
                .set(Status::Disconnected, "Log folder not found!");
            return Err(WatchError::FolderMissing(folder));
        }

        let (tx, mut rx) = mpsc::channel::<notify::Event>(64);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!("file watcher error: {e}"),
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&folder, RecursiveMode::Recursive)?;

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for path in created_logs(&event) {
                    tracing::debug!(path = %path.display(), "new log file");
                    engine.dispatch(path);
                }
            }
        });

        tracing::info!(folder = %folder.display(), "file watcher started");
        Ok(Self { watcher, task })
    }

    /// Stops the OS watch and joins the dispatch loop.
    pub async fn stop(self) {
        let Self { watcher, task } = self;
        // Dropping the watcher drops the event sender, which ends the loop.
        drop(watcher);
        let abort = task.abort_handle();
        if tokio::time::timeout(STOP_TIMEOUT, task).await.is_err() {
            abort.abort();
        }
        tracing::info!("file watcher stopped");
    }
}

/// Log files created by `event`. Folder creations are ignored.
fn created_logs(event: &notify::Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(kind) if kind != CreateKind::Folder => event
            .paths
            .iter()
            .filter(|p| is_log_file(p))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}
