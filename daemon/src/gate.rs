//! Upload gating driven by game-process presence.
//!
//! The gate is a single boolean: when closed, no new files are dequeued for
//! upload. It is recomputed from the configured [`GatePolicy`] each time the
//! process monitor reports a new [`GameState`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Whether the game client is running, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Startup, before the first process-list poll.
    Unknown,
    Running,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePolicy {
    /// No restriction. Also used when both gating flags are set.
    Always,
    WhileGameRunning,
    AfterGameCloses,
}

impl GatePolicy {
    /// Setting both flags cancels the restriction entirely.
    pub fn from_flags(only_while_running: bool, only_after_closes: bool) -> Self {
        match (only_while_running, only_after_closes) {
            (true, false) => GatePolicy::WhileGameRunning,
            (false, true) => GatePolicy::AfterGameCloses,
            _ => GatePolicy::Always,
        }
    }

    /// True when game presence matters and must be polled.
    pub fn is_active(self) -> bool {
        self != GatePolicy::Always
    }

    /// An `Unknown` game state keeps a restricted gate closed until the first poll.
    pub fn allows(self, game: GameState) -> bool {
        match self {
            GatePolicy::Always => true,
            GatePolicy::WhileGameRunning => game == GameState::Running,
            GatePolicy::AfterGameCloses => game == GameState::NotRunning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChange {
    Opened,
    Closed,
}

pub struct UploadGate {
    policy: GatePolicy,
    executable: String,
    game: Mutex<GameState>,
    open: AtomicBool,
}

impl UploadGate {
    pub fn new(policy: GatePolicy, executable: impl Into<String>) -> Self {
        Self {
            policy,
            executable: executable.into(),
            game: Mutex::new(GameState::Unknown),
            open: AtomicBool::new(policy.allows(GameState::Unknown)),
        }
    }

    /// A gate that never closes.
    pub fn always_open() -> Self {
        Self::new(GatePolicy::Always, "")
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn game_state(&self) -> GameState {
        *self.game.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a new game state and returns the gate flip it caused, if any.
    pub fn observe(&self, game: GameState) -> Option<GateChange> {
        *self.game.lock().unwrap_or_else(|e| e.into_inner()) = game;
        let now_open = self.policy.allows(game);
        let was_open = self.open.swap(now_open, Ordering::SeqCst);
        match (was_open, now_open) {
            (false, true) => Some(GateChange::Opened),
            (true, false) => Some(GateChange::Closed),
            _ => None,
        }
    }

    /// Status detail shown while the gate is closed.
    pub fn waiting_detail(&self) -> String {
        match self.policy {
            GatePolicy::WhileGameRunning => {
                format!("Waiting for {} to start...", self.executable)
            }
            GatePolicy::AfterGameCloses => {
                format!("Waiting for {} to close...", self.executable)
            }
            GatePolicy::Always => "Uploads paused.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── GatePolicy ────────────────────────────────────────────────────────────

    #[test]
    fn from_flags_covers_all_combinations() {
        assert_eq!(GatePolicy::from_flags(false, false), GatePolicy::Always);
        assert_eq!(GatePolicy::from_flags(true, false), GatePolicy::WhileGameRunning);
        assert_eq!(GatePolicy::from_flags(false, true), GatePolicy::AfterGameCloses);
        assert_eq!(GatePolicy::from_flags(true, true), GatePolicy::Always);
    }

    #[test]
    fn always_allows_every_state() {
        for game in [GameState::Unknown, GameState::Running, GameState::NotRunning] {
            assert!(GatePolicy::Always.allows(game));
        }
        assert!(!GatePolicy::Always.is_active());
    }

    #[test]
    fn while_running_only_allows_running() {
        let p = GatePolicy::WhileGameRunning;
        assert!(p.is_active());
        assert!(p.allows(GameState::Running));
        assert!(!p.allows(GameState::NotRunning));
        assert!(!p.allows(GameState::Unknown));
    }

    #[test]
    fn after_closes_only_allows_not_running() {
        let p = GatePolicy::AfterGameCloses;
        assert!(p.is_active());
        assert!(p.allows(GameState::NotRunning));
        assert!(!p.allows(GameState::Running));
        assert!(!p.allows(GameState::Unknown));
    }

    // ── UploadGate ────────────────────────────────────────────────────────────

    #[test]
    fn unrestricted_gate_starts_open_and_never_flips() {
        let gate = UploadGate::always_open();
        assert!(gate.is_open());
        assert_eq!(gate.observe(GameState::Running), None);
        assert_eq!(gate.observe(GameState::NotRunning), None);
        assert!(gate.is_open());
    }

    #[test]
    fn restricted_gate_starts_closed() {
        let gate = UploadGate::new(GatePolicy::WhileGameRunning, "Gw2-64.exe");
        assert!(!gate.is_open());
        assert_eq!(gate.game_state(), GameState::Unknown);
    }

    #[test]
    fn observe_reports_flips_only() {
        let gate = UploadGate::new(GatePolicy::WhileGameRunning, "Gw2-64.exe");
        assert_eq!(gate.observe(GameState::NotRunning), None);
        assert_eq!(gate.observe(GameState::Running), Some(GateChange::Opened));
        assert!(gate.is_open());
        assert_eq!(gate.observe(GameState::Running), None);
        assert_eq!(gate.observe(GameState::NotRunning), Some(GateChange::Closed));
        assert!(!gate.is_open());
        assert_eq!(gate.game_state(), GameState::NotRunning);
    }

    #[test]
    fn after_closes_opens_on_first_poll_without_game() {
        let gate = UploadGate::new(GatePolicy::AfterGameCloses, "Gw2-64.exe");
        assert_eq!(gate.observe(GameState::NotRunning), Some(GateChange::Opened));
        assert_eq!(gate.observe(GameState::Running), Some(GateChange::Closed));
    }

    #[test]
    fn waiting_detail_names_the_awaited_condition() {
        let gate = UploadGate::new(GatePolicy::WhileGameRunning, "Gw2-64.exe");
        assert_eq!(gate.waiting_detail(), "Waiting for Gw2-64.exe to start...");
        let gate = UploadGate::new(GatePolicy::AfterGameCloses, "Gw2-64.exe");
        assert_eq!(gate.waiting_detail(), "Waiting for Gw2-64.exe to close...");
    }
}
