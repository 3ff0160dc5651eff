use std::path::PathBuf;

/// Settings could not be loaded or written. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no log folder configured")]
    NoLogFolder,
}

/// The ledger file could not be read or appended to.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single upload attempt. None of these are retried in place.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The remote service could not be reached at all.
    #[error("connection to upload service failed: {0}")]
    Connection(String),

    /// The service answered, but not with a usable success response.
    #[error("upload request failed: {0}")]
    Request(String),

    #[error("unexpected upload failure: {0}")]
    Unexpected(String),
}

impl UploadError {
    pub fn is_connection(&self) -> bool {
        matches!(self, UploadError::Connection(_))
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            UploadError::Connection(e.to_string())
        } else if e.is_decode() {
            UploadError::Unexpected(e.to_string())
        } else {
            UploadError::Request(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("log folder not found: {0}")]
    FolderMissing(PathBuf),

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("failed to bind dashboard on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("dashboard server error: {0}")]
    Serve(#[source] std::io::Error),
}
