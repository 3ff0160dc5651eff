use crate::config::Settings;
use crate::gate::GameState;
use crate::menu::MenuAction;

pub enum DaemonEvent {
    /// The polled game process appeared or disappeared.
    GameStateChanged(GameState),
    /// The settings file changed on disk and was successfully re-parsed.
    /// The daemon restarts itself to apply it.
    SettingsChanged(Settings),
    /// A tray menu entry was chosen. Ctrl+C arrives as `Menu(Exit)`.
    Menu(MenuAction),
}
