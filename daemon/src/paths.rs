/// Canonical file paths for uploader data files.
///
/// Everything lives under one app-data directory
/// (`%APPDATA%\ArcdpsUploader\` on Windows, `~/.config/arcdps-uploader/` elsewhere):
///   - config.toml         Settings, written on first run and backfilled on load.
///   - uploaded_logs.txt   Append-only ledger of uploaded log basenames.
///   - status.toml         Written by the daemon, read by the tray.
///   - app_log.txt         Tracing output, truncated on every start.
use std::path::PathBuf;

#[cfg(windows)]
const APP_DIR_NAME: &str = "ArcdpsUploader";
#[cfg(not(windows))]
const APP_DIR_NAME: &str = "arcdps-uploader";

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LEDGER_FILE_NAME: &str = "uploaded_logs.txt";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const LOG_FILE_NAME: &str = "app_log.txt";

/// Returns the application data directory.
///
/// Falls back to the working directory when no per-user location is known.
pub fn app_data_dir() -> PathBuf {
    base_dir().map(|b| b.join(APP_DIR_NAME)).unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(windows)]
fn base_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(not(windows))]
fn base_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
}

pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn ledger_file_path() -> PathBuf {
    app_data_dir().join(LEDGER_FILE_NAME)
}

pub fn status_file_path() -> PathBuf {
    app_data_dir().join(STATUS_FILE_NAME)
}

pub fn log_file_path() -> PathBuf {
    app_data_dir().join(LOG_FILE_NAME)
}

/// Default arcdps log directory, offered as the suggestion on first run.
pub fn default_log_folder() -> Option<PathBuf> {
    let home = std::env::var_os("USERPROFILE").or_else(|| std::env::var_os("HOME"))?;
    Some(
        PathBuf::from(home)
            .join("Documents")
            .join("Guild Wars 2")
            .join("addons")
            .join("arcdps")
            .join("arcdps.cbtlogs"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        let dir = app_data_dir();
        if dir != PathBuf::from(".") {
            assert_eq!(dir.file_name().unwrap(), APP_DIR_NAME);
        }
    }

    #[test]
    fn data_files_have_correct_names() {
        assert_eq!(config_file_path().file_name().unwrap(), CONFIG_FILE_NAME);
        assert_eq!(ledger_file_path().file_name().unwrap(), LEDGER_FILE_NAME);
        assert_eq!(status_file_path().file_name().unwrap(), STATUS_FILE_NAME);
        assert_eq!(log_file_path().file_name().unwrap(), LOG_FILE_NAME);
    }

    #[test]
    fn data_files_share_same_parent_dir() {
        let config = config_file_path();
        assert_eq!(config.parent(), ledger_file_path().parent());
        assert_eq!(config.parent(), status_file_path().parent());
        assert_eq!(config.parent(), log_file_path().parent());
    }

    #[test]
    fn default_log_folder_points_at_arcdps_logs() {
        if let Some(folder) = default_log_folder() {
            assert!(folder.ends_with("arcdps.cbtlogs"));
        }
    }
}
