mod config;
mod dashboard;
mod engine;
mod error;
mod event;
mod feed;
mod gate;
mod ledger;
mod menu;
mod notifier;
mod paths;
mod process_monitor;
mod queue;
mod startup;
mod status;
mod uploader;
mod watcher;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::dashboard::DashboardState;
use crate::engine::{IngestionEngine, ScanMode, RESCAN_INTERVAL};
use crate::event::DaemonEvent;
use crate::gate::UploadGate;
use crate::ledger::PersistedLedger;
use crate::menu::MenuAction;
use crate::notifier::LogNotifier;
use crate::process_monitor::{SysinfoProbe, POLL_INTERVAL};
use crate::status::{Status, StatusFile, StatusSnapshot};
use crate::uploader::DpsReportClient;
use crate::watcher::FolderWatcher;

const UNREGISTER_FLAG: &str = "--unregister-startup";
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Logs go to app_log.txt, truncated on every start. Falls back to stderr.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_path = paths::log_file_path();
    match std::fs::File::create(&log_path) {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            tracing::warn!("could not open {}: {e}; logging to stderr", log_path.display());
        }
    }
}

/// How the daemon left its event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    /// The settings file changed; start a fresh process once this one is down.
    Restart,
}

fn main() -> anyhow::Result<()> {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir();
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("failed to create app data directory {}", app_dir.display()))?;

    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting arcdps-uploader");

    if std::env::args().skip(1).any(|arg| arg == UNREGISTER_FLAG) {
        startup::unregister_startup()?;
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let exit = runtime.block_on(run())?;
    // Dropping the runtime's tasks closes the dashboard listener, so a
    // relaunched process can bind the same port.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if exit == Exit::Restart {
        relaunch().context("failed to restart daemon")?;
        tracing::info!("relaunched with new settings");
    }
    tracing::info!("arcdps-uploader stopped");
    Ok(())
}

async fn run() -> anyhow::Result<Exit> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path();
    let settings = Settings::load_or_init(&config_path, config::prompt_for_log_folder)
        .context("failed to load settings")?;
    tracing::info!(folder = %settings.log_folder.display(), "settings loaded");

    if let Err(e) = startup::apply(settings.auto_start) {
        tracing::warn!("could not update launch at login: {e:#}");
    }

    // ── Engine ────────────────────────────────────────────────────────────────
    let ledger = PersistedLedger::load(paths::ledger_file_path());
    tracing::info!(entries = ledger.len(), "ledger loaded");

    let uploader = Arc::new(DpsReportClient::new().context("failed to build upload client")?);
    let policy = settings.gate_policy();
    let gate = UploadGate::new(policy, settings.game_executable.clone());

    let mut engine = IngestionEngine::new(settings.log_folder.clone(), ledger, uploader, gate);
    if settings.notifications {
        engine = engine.with_notifier(Arc::new(LogNotifier));
    }
    let engine = Arc::new(engine);
    let status = Arc::clone(engine.status());

    // ── Observers ─────────────────────────────────────────────────────────────
    let status_path = paths::status_file_path();
    tokio::spawn(status::run_status_writer(status.subscribe(), status_path.clone()));
    tokio::spawn(refresh_tray(status.subscribe()));

    let dashboard_state = DashboardState {
        feed: Arc::clone(engine.feed()),
        folder: settings.log_folder.clone(),
    };
    tokio::spawn(dashboard::run(
        settings.dashboard_port,
        dashboard_state,
        Arc::clone(&status),
    ));

    // ── Producers ─────────────────────────────────────────────────────────────
    let watcher = match FolderWatcher::start(Arc::clone(&engine)) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::error!("file watcher not started: {e}");
            None
        }
    };

    engine.rescan(ScanMode::Announced).await;
    tokio::spawn(Arc::clone(&engine).run_rescan_loop(RESCAN_INTERVAL));

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    if policy.is_active() {
        tokio::spawn(process_monitor::run(
            settings.game_executable.clone(),
            SysinfoProbe::new(),
            POLL_INTERVAL,
            event_tx.clone(),
        ));
    }
    tokio::spawn(config::watch_settings(
        config_path.clone(),
        settings.clone(),
        event_tx.clone(),
    ));

    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Menu(MenuAction::Exit)).await;
            }
        });
    }

    tracing::info!(dashboard = %settings.dashboard_url(), "arcdps-uploader started");

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut exit = Exit::Quit;
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::GameStateChanged(state) => {
                engine.observe_game(state).await;
            }
            DaemonEvent::SettingsChanged(_) => {
                tracing::info!("settings changed, restarting");
                exit = Exit::Restart;
                break;
            }
            DaemonEvent::Menu(MenuAction::Exit) => break,
            DaemonEvent::Menu(action) => handle_menu(action, &settings, &config_path),
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    if let Some(w) = watcher {
        w.stop().await;
    }
    status.set(Status::Pending, "Shutting down...");
    status::write_status(&status_path, &StatusFile::from_snapshot(&status.current()));
    engine
        .shutdown(Duration::from_secs(settings.shutdown_grace_secs))
        .await;

    Ok(exit)
}

fn handle_menu(action: MenuAction, settings: &Settings, config_path: &Path) {
    let result = match action {
        MenuAction::OpenDashboard => menu::open_target(&settings.dashboard_url()),
        MenuAction::OpenFolder => menu::open_path(&settings.log_folder),
        MenuAction::OpenConfig => menu::open_path(config_path),
        MenuAction::Exit => Ok(()),
    };
    if let Err(e) = result {
        tracing::warn!(?action, "menu action failed: {e}");
    }
}

/// Rebuilds the tray menu model on every status change.
async fn refresh_tray(mut rx: watch::Receiver<StatusSnapshot>) {
    while rx.changed().await.is_ok() {
        let items = menu::menu_items(&rx.borrow_and_update().text());
        tracing::debug!(entries = items.len(), "tray menu refreshed");
    }
}

/// Starts a fresh copy of this executable with the same arguments.
fn relaunch() -> anyhow::Result<()> {
    let exe = std::env::current_exe()?;
    std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .spawn()
        .with_context(|| format!("failed to spawn {}", exe.display()))?;
    Ok(())
}
