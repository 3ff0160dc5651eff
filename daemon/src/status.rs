use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Current operational state of the uploader.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Startup, before the first scan completes.
    Pending,
    /// One or more files are being processed.
    Uploading,
    /// Queue empty, gate open, no known pending work.
    UpToDate,
    /// The upload gate is closed.
    Sleeping,
    /// Log folder missing, dashboard bind failed, or the upload service is unreachable.
    Disconnected,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Uploading => "UPLOADING",
            Status::UpToDate => "UP TO DATE",
            Status::Sleeping => "SLEEPING",
            Status::Disconnected => "DISCONNECTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: Status,
    pub detail: String,
}

impl StatusSnapshot {
    /// The line shown at the top of the tray menu.
    pub fn text(&self) -> String {
        format!("Status: {} - {}", self.status.label(), self.detail)
    }
}

/// Advisory display state. Last write wins; nothing reads it for correctness.
pub struct StatusModel {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusModel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot {
            status: Status::Pending,
            detail: "Initializing...".to_string(),
        });
        Self { tx }
    }

    pub fn set(&self, status: Status, detail: impl Into<String>) {
        let snapshot = StatusSnapshot {
            status,
            detail: detail.into(),
        };
        tracing::info!("status changed: {}", snapshot.text());
        self.tx.send_replace(snapshot);
    }

    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> Status {
        self.tx.borrow().status
    }

    pub fn text(&self) -> String {
        self.tx.borrow().text()
    }

    /// Receiver notified on every change, for the tray and the status file writer.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }
}

/// Status written by the daemon to status.toml for an out-of-process tray.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusFile {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub status: Status,
    pub detail: String,
    /// Pre-rendered `Status: X - detail` line.
    pub text: String,
    /// RFC 3339 timestamp of the change.
    pub updated_at: String,
}

impl StatusFile {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: snapshot.status,
            detail: snapshot.detail.clone(),
            text: snapshot.text(),
            updated_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// A failed write is logged and otherwise ignored.
pub fn write_status(path: &Path, status: &StatusFile) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!("failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::error!("failed to write status file: {e}");
            }
        }
        Err(e) => tracing::error!("failed to serialize status: {e}"),
    }
}

/// Mirrors every status change into `path` until the model is dropped.
pub async fn run_status_writer(mut rx: watch::Receiver<StatusSnapshot>, path: PathBuf) {
    loop {
        let file = StatusFile::from_snapshot(&rx.borrow_and_update());
        write_status(&path, &file);
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ── StatusModel ───────────────────────────────────────────────────────────

    #[test]
    fn new_starts_pending() {
        let model = StatusModel::new();
        assert_eq!(model.status(), Status::Pending);
        assert_eq!(model.text(), "Status: PENDING - Initializing...");
    }

    #[test]
    fn set_replaces_snapshot() {
        let model = StatusModel::new();
        model.set(Status::UpToDate, "All logs processed.");
        assert_eq!(
            model.current(),
            StatusSnapshot {
                status: Status::UpToDate,
                detail: "All logs processed.".to_string()
            }
        );
        assert_eq!(model.text(), "Status: UP TO DATE - All logs processed.");
    }

    #[test]
    fn subscribers_see_changes() {
        let model = StatusModel::new();
        let mut rx = model.subscribe();
        assert!(!rx.has_changed().unwrap());
        model.set(Status::Sleeping, "Waiting");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, Status::Sleeping);
    }

    // ── Status serialization ──────────────────────────────────────────────────

    #[test]
    fn status_serializes_screaming_snake_case() {
        let mut file = StatusFile::from_snapshot(&StatusSnapshot {
            status: Status::UpToDate,
            detail: String::new(),
        });
        let content = toml::to_string_pretty(&file).unwrap();
        assert!(content.contains("status = \"UP_TO_DATE\""));

        file.status = Status::Disconnected;
        let content = toml::to_string_pretty(&file).unwrap();
        assert!(content.contains("status = \"DISCONNECTED\""));
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("status.toml");
        let model = StatusModel::new();
        write_status(&path, &StatusFile::from_snapshot(&model.current()));
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let snapshot = StatusSnapshot {
            status: Status::Uploading,
            detail: "Processing a.zevtc...".to_string(),
        };
        write_status(&path, &StatusFile::from_snapshot(&snapshot));

        let parsed: StatusFile = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.status, Status::Uploading);
        assert_eq!(parsed.detail, "Processing a.zevtc...");
        assert_eq!(parsed.text, "Status: UPLOADING - Processing a.zevtc...");
        assert_eq!(parsed.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn status_writer_follows_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let model = StatusModel::new();
        let writer = tokio::spawn(run_status_writer(model.subscribe(), path.clone()));

        model.set(Status::Sleeping, "Waiting for Gw2-64.exe to start...");

        let mut seen = false;
        for _ in 0..50 {
            if let Ok(content) = std::fs::read_to_string(&path) {
                if content.contains("SLEEPING") {
                    seen = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(seen);

        drop(model);
        tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .unwrap()
            .unwrap();
    }
}
