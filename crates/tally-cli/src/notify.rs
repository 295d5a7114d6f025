//! Terminal toasts for mutation outcomes.

use std::io::{self, Write};

use tally_core::notify::{NotifyKind, Notifier};
use tracing::debug;

use crate::output::OutputMode;

/// Prints each notification to stderr so stdout stays machine-readable.
///
/// Error notices are not printed: the failing command returns the same
/// error and `main` renders it once, with its code.
pub struct TerminalNotifier {
    mode: OutputMode,
}

impl TerminalNotifier {
    pub const fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

/// Format one notification line for `mode`, or `None` for error notices.
pub fn format_line(mode: OutputMode, kind: NotifyKind, message: &str) -> Option<String> {
    if kind == NotifyKind::Error {
        return None;
    }
    if mode.is_json() {
        return Some(serde_json::json!({ "notify": kind, "message": message }).to_string());
    }
    let marker = if kind == NotifyKind::Success { '✓' } else { '·' };
    Some(format!("{marker} {message}"))
}

impl Notifier for TerminalNotifier {
    fn notify(&self, kind: NotifyKind, message: &str) {
        let Some(line) = format_line(self.mode, kind, message) else {
            debug!(%kind, "error notice left to the command result");
            return;
        };
        if let Err(e) = writeln!(io::stderr().lock(), "{line}") {
            debug!(error = %e, "failed to write notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_lines_carry_a_marker() {
        assert_eq!(
            format_line(OutputMode::Pretty, NotifyKind::Success, "Report deleted successfully.").as_deref(),
            Some("✓ Report deleted successfully.")
        );
        assert_eq!(
            format_line(OutputMode::Text, NotifyKind::Info, "Editing report.").as_deref(),
            Some("· Editing report.")
        );
    }

    #[test]
    fn error_notices_are_left_to_the_command() {
        assert_eq!(format_line(OutputMode::Text, NotifyKind::Error, "Error updating remark."), None);
        assert_eq!(format_line(OutputMode::Json, NotifyKind::Error, "Error updating remark."), None);
    }

    #[test]
    fn json_lines_parse() {
        let line = format_line(OutputMode::Json, NotifyKind::Success, "Status updated to Completed.")
            .expect("success notices print");
        let value: serde_json::Value = serde_json::from_str(&line).expect("json");
        assert_eq!(value["notify"], "success");
        assert_eq!(value["message"], "Status updated to Completed.");
    }
}
