//! Ingestion engine: turns discovered log paths into uploads.
//!
//! Three producers feed [`IngestionEngine::dispatch`]: the filesystem watcher,
//! the startup scan, and the periodic rescan. Each candidate runs as its own
//! task; uploads of different files may overlap. The ledger claim taken in
//! [`IngestionEngine::handle_candidate`] is the only de-duplication guard, so a
//! file reported by several producers at once is still uploaded at most once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::feed::{EventFeed, UploadRecord};
use crate::gate::{GameState, GateChange, UploadGate};
use crate::ledger::PersistedLedger;
use crate::notifier::{upload_notification, Notifier};
use crate::queue::UploadQueue;
use crate::status::{Status, StatusModel};
use crate::uploader::Uploader;

/// Extensions written by arcdps (plain and zipped logs).
pub const LOG_EXTENSIONS: &[&str] = &["evtc", "zevtc"];
/// Backstop for filesystem events that never arrived.
pub const RESCAN_INTERVAL: Duration = Duration::from_secs(60);

const UP_TO_DATE_DETAIL: &str = "All logs processed.";

/// What happened to a single candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Not a log file.
    Ignored,
    GateClosed,
    /// Already uploaded, or another task is uploading the same name.
    AlreadyKnown,
    Uploaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Reports progress in the status, including "nothing to do".
    Announced,
    /// Leaves the status alone unless it finds work.
    Silent,
}

pub fn is_log_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| LOG_EXTENSIONS.contains(&e))
}

/// Ledger key for a log: its basename. Identical names in different
/// subfolders are treated as the same log.
pub fn log_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Recursively enumerates log files under `folder`. Lazy; every call is a
/// fresh full walk. Unreadable entries are skipped.
pub fn scan(folder: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                debug!("scan: skipping entry: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_log_file(p))
}

pub struct IngestionEngine {
    folder: PathBuf,
    ledger: PersistedLedger,
    queue: UploadQueue,
    feed: Arc<EventFeed>,
    status: Arc<StatusModel>,
    gate: UploadGate,
    uploader: Arc<dyn Uploader>,
    notifier: Option<Arc<dyn Notifier>>,
    tasks: TaskTracker,
}

impl IngestionEngine {
    pub fn new(
        folder: PathBuf,
        ledger: PersistedLedger,
        uploader: Arc<dyn Uploader>,
        gate: UploadGate,
    ) -> Self {
        Self {
            folder,
            ledger,
            queue: UploadQueue::new(),
            feed: Arc::new(EventFeed::new()),
            status: Arc::new(StatusModel::new()),
            gate,
            uploader,
            notifier: None,
            tasks: TaskTracker::new(),
        }
    }

    /// Sends a notification for every successful upload.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn ledger(&self) -> &PersistedLedger {
        &self.ledger
    }

    pub fn feed(&self) -> &Arc<EventFeed> {
        &self.feed
    }

    pub fn status(&self) -> &Arc<StatusModel> {
        &self.status
    }

    pub fn gate(&self) -> &UploadGate {
        &self.gate
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Uploads `path` unless the gate is closed or its name is already known.
    pub async fn handle_candidate(&self, path: &Path) -> CandidateOutcome {
        if !is_log_file(path) {
            return CandidateOutcome::Ignored;
        }
        if !self.gate.is_open() {
            return CandidateOutcome::GateClosed;
        }
        let Some(name) = log_name(path) else {
            return CandidateOutcome::Ignored;
        };
        let Some(claim) = self.ledger.claim(&name) else {
            debug!(file = %name, "already known, skipping");
            return CandidateOutcome::AlreadyKnown;
        };

        self.queue.enter();
        self.status.set(Status::Uploading, format!("Processing {name}..."));

        let outcome = match self.uploader.upload(path).await {
            Ok(report) => {
                info!(file = %name, permalink = %report.permalink, "successfully uploaded");
                if let Err(e) = claim.commit() {
                    error!(file = %name, "could not write to ledger file: {e}");
                }
                let record = UploadRecord {
                    permalink: report.permalink,
                    boss: report.boss,
                    success: report.success,
                    uploaded_at: chrono::Local::now(),
                };
                if let Some(notifier) = &self.notifier {
                    let (title, body) = upload_notification(&record);
                    notifier.notify(&title, &body);
                }
                self.feed.push(record);
                CandidateOutcome::Uploaded
            }
            Err(e) => {
                drop(claim);
                if e.is_connection() {
                    warn!(file = %name, "{e}");
                    self.status
                        .set(Status::Disconnected, "Connection to dps.report failed.");
                } else {
                    error!(file = %name, "error uploading: {e}");
                }
                CandidateOutcome::Failed
            }
        };

        // A connection failure stays visible until the next upload attempt.
        if self.queue.leave() == 0 {
            if !self.gate.is_open() {
                self.status.set(Status::Sleeping, self.gate.waiting_detail());
            } else if self.status.status() != Status::Disconnected {
                self.status.set(Status::UpToDate, UP_TO_DATE_DETAIL);
            }
        }

        outcome
    }

    /// Runs [`handle_candidate`](Self::handle_candidate) as a detached, tracked task.
    pub fn dispatch(self: &Arc<Self>, path: PathBuf) -> JoinHandle<CandidateOutcome> {
        let engine = Arc::clone(self);
        self.tasks
            .spawn(async move { engine.handle_candidate(&path).await })
    }

    /// Walks the log folder and dispatches every log not yet in the ledger.
    ///
    /// The walk and ledger filter run on the blocking pool.
    pub async fn rescan(self: &Arc<Self>, mode: ScanMode) -> Vec<JoinHandle<CandidateOutcome>> {
        let announced = mode == ScanMode::Announced;

        if !self.gate.is_open() {
            if announced {
                self.status.set(Status::Sleeping, self.gate.waiting_detail());
            }
            return Vec::new();
        }

        if !self.folder.is_dir() {
            if announced {
                self.status.set(Status::Disconnected, "Log folder not found!");
            } else {
                debug!(folder = %self.folder.display(), "rescan: log folder missing");
            }
            return Vec::new();
        }

        if announced {
            self.status.set(Status::Uploading, "Scanning log folder...");
        }

        let pending = match tokio::task::spawn_blocking({
            let engine = Arc::clone(self);
            move || engine.unknown_logs()
        })
        .await
        {
            Ok(pending) => pending,
            Err(e) => {
                error!("rescan: walk task failed: {e}");
                return Vec::new();
            }
        };

        if pending.is_empty() {
            if announced && self.queue.depth() == 0 {
                self.status.set(Status::UpToDate, UP_TO_DATE_DETAIL);
            }
            return Vec::new();
        }

        info!("found {} unprocessed logs", pending.len());
        pending.into_iter().map(|p| self.dispatch(p)).collect()
    }

    /// Logs under the folder whose names are not in the ledger. Blocking.
    fn unknown_logs(&self) -> Vec<PathBuf> {
        scan(&self.folder)
            .filter(|p| log_name(p).is_some_and(|n| !self.ledger.contains(&n)))
            .collect()
    }

    /// Silent rescan every `period`. The first tick is skipped; the startup
    /// scan covers it.
    pub async fn run_rescan_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.rescan(ScanMode::Silent).await;
        }
    }

    /// Feeds a polled game state into the gate and reacts to any flip.
    pub async fn observe_game(self: &Arc<Self>, game: GameState) -> Vec<JoinHandle<CandidateOutcome>> {
        match self.gate.observe(game) {
            Some(change) => self.on_gate_change(change).await,
            None => Vec::new(),
        }
    }

    /// An opened gate triggers an immediate scan. A closed gate lets running
    /// uploads finish but dispatches nothing new.
    pub async fn on_gate_change(self: &Arc<Self>, change: GateChange) -> Vec<JoinHandle<CandidateOutcome>> {
        match change {
            GateChange::Opened => {
                info!("upload gate opened");
                self.rescan(ScanMode::Announced).await
            }
            GateChange::Closed => {
                info!("upload gate closed");
                self.status.set(Status::Sleeping, self.gate.waiting_detail());
                Vec::new()
            }
        }
    }

    /// Waits up to `grace` for in-flight uploads. Whatever is still running
    /// afterwards is abandoned when the process exits.
    pub async fn shutdown(&self, grace: Duration) {
        self.tasks.close();
        if !grace.is_zero() && tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            debug!("shutdown grace period elapsed");
        }
        let abandoned = self.tasks.len();
        if abandoned > 0 {
            warn!("abandoning {abandoned} in-flight uploads");
        }
    }
}
