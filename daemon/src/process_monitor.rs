use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::event::DaemonEvent;
use crate::gate::GameState;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Answers whether a process with the given executable name is running.
pub trait ProcessProbe: Send {
    fn is_running(&mut self, executable: &str) -> bool;
}

/// Probe backed by the OS process list.
pub struct SysinfoProbe {
    sys: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn is_running(&mut self, executable: &str) -> bool {
        self.sys.refresh_processes(ProcessesToUpdate::All, false);
        self.sys
            .processes()
            .values()
            .any(|p| matches_executable(&p.name().to_string_lossy(), executable))
    }
}

/// Exact, case-sensitive name comparison.
pub fn matches_executable(process_name: &str, executable: &str) -> bool {
    process_name == executable
}

/// Polls `probe` every `period` and emits [`DaemonEvent::GameStateChanged`]
/// whenever the game appears or disappears. The first poll happens
/// immediately and always reports, since the prior state is unknown.
///
/// Only spawned when a gating policy is active.
pub async fn run<P: ProcessProbe>(
    executable: String,
    mut probe: P,
    period: Duration,
    tx: mpsc::Sender<DaemonEvent>,
) {
    let mut last = GameState::Unknown;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let state = if probe.is_running(&executable) {
            GameState::Running
        } else {
            GameState::NotRunning
        };
        if state == last {
            continue;
        }

        match state {
            GameState::Running => tracing::info!("{executable} detected"),
            _ => tracing::info!("{executable} not running"),
        }
        last = state;
        if tx.send(DaemonEvent::GameStateChanged(state)).await.is_err() {
            break;
        }
    }
}
