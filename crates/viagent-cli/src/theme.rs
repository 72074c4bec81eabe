//! Terminal styling shared by every command.

use colored::{ColoredString, Colorize};
use viagent_vfs::PermissionState;

const RULE_WIDTH: usize = 48;

/// Namespace for the CLI's text styles.
pub(crate) struct Theme;

impl Theme {
    /// Bold cyan title.
    pub(crate) fn header(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    pub(crate) fn success(text: &str) -> String {
        marked("✓".green(), text.normal())
    }

    pub(crate) fn error(text: &str) -> String {
        marked("✗".red().bold(), text.red())
    }

    pub(crate) fn warning(text: &str) -> String {
        marked("!".yellow().bold(), text.yellow())
    }

    pub(crate) fn info(text: &str) -> String {
        marked("›".blue(), text.normal())
    }

    pub(crate) fn dimmed(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// Horizontal rule under a header.
    pub(crate) fn separator() -> String {
        "─".repeat(RULE_WIDTH).dimmed().to_string()
    }

    /// `key: value` line with the key in bold.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {value}", key.bold())
    }

    /// Permission state colored by how usable it is.
    pub(crate) fn permission(state: PermissionState) -> String {
        let label = state.to_string();
        let styled = match state {
            PermissionState::Granted => label.green(),
            PermissionState::Prompt => label.yellow(),
            PermissionState::Denied => label.red(),
            PermissionState::Unknown => label.dimmed(),
        };
        styled.to_string()
    }
}

fn marked(mark: ColoredString, text: ColoredString) -> String {
    format!("{mark} {text}")
}
