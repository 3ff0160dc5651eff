use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::error::ConfigError;
use crate::event::DaemonEvent;
use crate::gate::GatePolicy;

pub const SETTINGS_VERSION: u32 = 1;
pub const DEFAULT_DASHBOARD_PORT: u16 = 8000;
pub const DEFAULT_GAME_EXECUTABLE: &str = "Gw2-64.exe";

/// Every key written to config.toml. A file missing any of these is backfilled.
const SETTINGS_KEYS: &[&str] = &[
    "version",
    "log_folder",
    "dashboard_port",
    "auto_start",
    "notifications",
    "only_while_game_running",
    "only_after_game_closes",
    "game_executable",
    "shutdown_grace_secs",
];

/// Daemon settings. Loaded once at startup; an edit on disk restarts the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Folder containing arcdps `.evtc` / `.zevtc` logs. Watched recursively.
    #[serde(default)]
    pub log_folder: PathBuf,
    #[serde(default = "default_dashboard_port")]
    pub dashboard_port: u16,
    /// Register the daemon to launch at login.
    #[serde(default)]
    pub auto_start: bool,
    /// Emit a notification for every successful upload.
    #[serde(default = "default_true")]
    pub notifications: bool,
    /// Only upload while the game is running.
    #[serde(default)]
    pub only_while_game_running: bool,
    /// Only upload while the game is not running.
    #[serde(default)]
    pub only_after_game_closes: bool,
    /// Exact, case-sensitive process name of the game client.
    #[serde(default = "default_game_executable")]
    pub game_executable: String,
    /// How long shutdown waits for in-flight uploads. 0 abandons them immediately.
    #[serde(default)]
    pub shutdown_grace_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            log_folder: PathBuf::new(),
            dashboard_port: DEFAULT_DASHBOARD_PORT,
            auto_start: false,
            notifications: true,
            only_while_game_running: false,
            only_after_game_closes: false,
            game_executable: DEFAULT_GAME_EXECUTABLE.to_string(),
            shutdown_grace_secs: 0,
        }
    }
}

impl Settings {
    pub fn with_log_folder(log_folder: PathBuf) -> Self {
        Self {
            log_folder,
            ..Self::default()
        }
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy::from_flags(self.only_while_game_running, self.only_after_game_closes)
    }

    pub fn dashboard_url(&self) -> String {
        format!("http://localhost:{}", self.dashboard_port)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Writes the settings to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads settings from `path`, creating the file on first run.
    ///
    /// `prompt` is asked for the log folder when the file does not exist or has
    /// no folder set; a `None` answer is fatal. Keys missing from an existing
    /// file are filled with their defaults and the file is rewritten.
    pub fn load_or_init<F>(path: &Path, prompt: F) -> Result<Self, ConfigError>
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        if !path.exists() {
            tracing::info!(path = %path.display(), "settings file not found, prompting for log folder");
            let folder = prompt()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(ConfigError::NoLogFolder)?;
            let settings = Self::with_log_folder(folder);
            settings.save(path)?;
            tracing::info!(path = %path.display(), "settings saved");
            return Ok(settings);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = toml::from_str(&content)?;
        let missing: Vec<&str> = SETTINGS_KEYS
            .iter()
            .copied()
            .filter(|key| !table.contains_key(*key))
            .collect();

        let mut settings = Self::parse(&content)?;
        let mut rewrite = !missing.is_empty() || settings.version < SETTINGS_VERSION;

        if settings.log_folder.as_os_str().is_empty() {
            settings.log_folder = prompt()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(ConfigError::NoLogFolder)?;
            rewrite = true;
        }

        if rewrite {
            if !missing.is_empty() {
                tracing::info!(keys = ?missing, "backfilling missing settings keys");
            }
            settings.version = SETTINGS_VERSION;
            settings.save(path)?;
        }

        Ok(settings)
    }
}

/// Asks on the terminal for the log folder, suggesting the arcdps default.
pub fn prompt_for_log_folder() -> Option<PathBuf> {
    let suggestion = crate::paths::default_log_folder();
    let mut stdout = std::io::stdout();
    match &suggestion {
        Some(s) => print!("Please select your arcdps log folder [{}]: ", s.display()),
        None => print!("Please select your arcdps log folder: "),
    }
    let _ = stdout.flush();

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer).ok()?;
    resolve_folder_answer(&answer, suggestion)
}

/// An empty answer accepts the suggestion.
fn resolve_folder_answer(answer: &str, suggestion: Option<PathBuf>) -> Option<PathBuf> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        suggestion
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// Watches the parent directory of `path`. When the settings file is edited
/// into something that parses and differs from `current`, sends
/// `SettingsChanged` so the daemon can restart with it.
pub async fn watch_settings(path: PathBuf, current: Settings, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!("failed to create settings watcher: {e}");
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename).
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            tracing::error!("settings path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::error!("failed to watch settings directory: {e}");
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_settings = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );
        if !(affects_settings && is_write) {
            continue;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })
            .and_then(|content| Settings::parse(&content))
            .and_then(|settings| {
                if settings.log_folder.as_os_str().is_empty() {
                    Err(ConfigError::NoLogFolder)
                } else {
                    Ok(settings)
                }
            });

        match parsed {
            Ok(settings) if settings != current => {
                if tx.send(DaemonEvent::SettingsChanged(settings)).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("ignoring settings edit: {e}"),
        }
    }
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_dashboard_port() -> u16 {
    DEFAULT_DASHBOARD_PORT
}

fn default_true() -> bool {
    true
}

fn default_game_executable() -> String {
    DEFAULT_GAME_EXECUTABLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn settings_default_values() {
        let s = Settings::default();
        assert_eq!(s.version, SETTINGS_VERSION);
        assert_eq!(s.dashboard_port, DEFAULT_DASHBOARD_PORT);
        assert!(!s.auto_start);
        assert!(s.notifications);
        assert!(!s.only_while_game_running);
        assert!(!s.only_after_game_closes);
        assert_eq!(s.game_executable, DEFAULT_GAME_EXECUTABLE);
        assert_eq!(s.shutdown_grace_secs, 0);
    }

    #[test]
    fn dashboard_url_uses_port() {
        let mut s = Settings::default();
        s.dashboard_port = 9123;
        assert_eq!(s.dashboard_url(), "http://localhost:9123");
    }

    #[test]
    fn gate_policy_follows_flags() {
        let mut s = Settings::default();
        assert_eq!(s.gate_policy(), GatePolicy::Always);
        s.only_while_game_running = true;
        assert_eq!(s.gate_policy(), GatePolicy::WhileGameRunning);
        s.only_after_game_closes = true;
        assert_eq!(s.gate_policy(), GatePolicy::Always);
        s.only_while_game_running = false;
        assert_eq!(s.gate_policy(), GatePolicy::AfterGameCloses);
    }

    // ── load_or_init ──────────────────────────────────────────────────────────

    #[test]
    fn first_run_prompts_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let settings = Settings::load_or_init(&path, || Some(PathBuf::from("/logs"))).unwrap();
        assert_eq!(settings.log_folder, PathBuf::from("/logs"));
        assert!(path.exists());

        let reloaded = Settings::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn first_run_without_folder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = Settings::load_or_init(&path, || None).unwrap_err();
        assert!(matches!(err, ConfigError::NoLogFolder));
        assert!(!path.exists());
    }

    #[test]
    fn first_run_with_empty_folder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = Settings::load_or_init(&path, || Some(PathBuf::new())).unwrap_err();
        assert!(matches!(err, ConfigError::NoLogFolder));
    }

    #[test]
    fn complete_file_is_loaded_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut original = Settings::with_log_folder(PathBuf::from("/arc"));
        original.dashboard_port = 8123;
        original.only_after_game_closes = true;
        original.save(&path).unwrap();

        let loaded = Settings::load_or_init(&path, || panic!("should not prompt")).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_keys_are_backfilled_and_file_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_folder = \"/arc\"\ndashboard_port = 9000\n").unwrap();

        let settings = Settings::load_or_init(&path, || panic!("should not prompt")).unwrap();
        assert_eq!(settings.log_folder, PathBuf::from("/arc"));
        assert_eq!(settings.dashboard_port, 9000);
        assert!(settings.notifications);
        assert_eq!(settings.game_executable, DEFAULT_GAME_EXECUTABLE);

        let content = std::fs::read_to_string(&path).unwrap();
        for key in SETTINGS_KEYS {
            assert!(content.contains(key), "{key} was not backfilled");
        }
    }

    #[test]
    fn missing_log_folder_prompts_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "dashboard_port = 9000\n").unwrap();

        let settings = Settings::load_or_init(&path, || Some(PathBuf::from("/picked"))).unwrap();
        assert_eq!(settings.log_folder, PathBuf::from("/picked"));
        assert_eq!(settings.dashboard_port, 9000);

        let reloaded = Settings::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.log_folder, PathBuf::from("/picked"));
    }

    #[test]
    fn invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml ][[[").unwrap();
        let err = Settings::load_or_init(&path, || None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn wrong_value_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_folder = \"/arc\"\ndashboard_port = \"eight\"\n").unwrap();
        assert!(Settings::load_or_init(&path, || None).is_err());
    }

    // ── resolve_folder_answer ─────────────────────────────────────────────────

    #[test]
    fn empty_answer_accepts_suggestion() {
        let suggestion = Some(PathBuf::from("/default"));
        assert_eq!(resolve_folder_answer("\n", suggestion.clone()), suggestion);
        assert_eq!(resolve_folder_answer("", None), None);
    }

    #[test]
    fn typed_answer_overrides_suggestion() {
        let answer = resolve_folder_answer("  /mine \n", Some(PathBuf::from("/default")));
        assert_eq!(answer, Some(PathBuf::from("/mine")));
    }

    // ── watch_settings ────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn valid_edit_is_reported_and_invalid_edit_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let current = Settings::with_log_folder(PathBuf::from("/arc"));
        current.save(&path).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(watch_settings(path.clone(), current.clone(), tx));
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        std::fs::write(&path, "dashboard_port = [").unwrap();
        let mut edited = current.clone();
        edited.dashboard_port = 9000;
        edited.save(&path).unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            DaemonEvent::SettingsChanged(settings) => assert_eq!(settings, edited),
            _ => panic!("unexpected event"),
        }
    }
}
