//! Tray menu model. Rendering the tray icon is left to the host shell; the
//! daemon only owns the entries and what each one does.

use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    OpenDashboard,
    OpenFolder,
    OpenConfig,
    Exit,
}

impl MenuAction {
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::OpenDashboard => "Visit Log Webpage",
            MenuAction::OpenFolder => "Open Log Folder",
            MenuAction::OpenConfig => "Open Config File",
            MenuAction::Exit => "Exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    /// `None` for the disabled status line.
    pub action: Option<MenuAction>,
}

/// Status line first, then the actions in display order.
pub fn menu_items(status_text: &str) -> Vec<MenuItem> {
    let mut items = vec![MenuItem {
        label: status_text.to_string(),
        action: None,
    }];
    items.extend(
        [
            MenuAction::OpenDashboard,
            MenuAction::OpenFolder,
            MenuAction::OpenConfig,
            MenuAction::Exit,
        ]
        .into_iter()
        .map(|action| MenuItem {
            label: action.label().to_string(),
            action: Some(action),
        }),
    );
    items
}

fn opener_command(target: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("explorer");
        cmd.arg(target);
        cmd
    }
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(target);
        cmd
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(target);
        cmd
    }
}

/// Hands a URL or path to the platform's default handler.
pub fn open_target(target: &str) -> std::io::Result<()> {
    opener_command(target).spawn().map(|_| ())
}

pub fn open_path(path: &Path) -> std::io::Result<()> {
    open_target(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_comes_first_and_is_disabled() {
        let items = menu_items("Status: UP TO DATE - All logs processed.");
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].label, "Status: UP TO DATE - All logs processed.");
        assert_eq!(items[0].action, None);
    }

    #[test]
    fn actions_follow_in_display_order() {
        let labels: Vec<_> = menu_items("x")
            .into_iter()
            .skip(1)
            .map(|item| item.label)
            .collect();
        assert_eq!(
            labels,
            ["Visit Log Webpage", "Open Log Folder", "Open Config File", "Exit"]
        );
    }

    #[test]
    fn opener_receives_target_as_single_argument() {
        let cmd = opener_command("http://localhost:8000");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["http://localhost:8000"]);
    }
}
