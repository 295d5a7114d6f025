//! Subcommand implementations.

pub mod completions;
pub mod reports;
pub mod tasks;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_core::Session;
use tally_core::config::EffectiveConfig;
use tally_core::error::ErrorCode;
use tally_core::filter::parse_date_bound;
use tally_core::remote::file::FileStore;
use tally_core::workflow::ParseEnumError;
use tracing::debug;

use crate::notify::TerminalNotifier;
use crate::output::{CliError, OutputMode};

/// Everything a subcommand needs besides its own arguments.
pub struct Context {
    pub config: EffectiveConfig,
    pub output: OutputMode,
    cli_user: Option<String>,
}

impl Context {
    pub fn new(
        mut config: EffectiveConfig,
        cli_user: Option<String>,
        cli_store: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = cli_store {
            config.store_path = path;
        }
        let output = OutputMode::from_resolved(&config.resolved_output);
        Self {
            config,
            output,
            cli_user,
        }
    }

    /// The acting user id, or an [`ErrorCode::MissingUser`] error.
    pub fn require_user(&self) -> anyhow::Result<String> {
        self.config.user_id(self.cli_user.as_deref()).ok_or_else(|| {
            anyhow::Error::from(CliError::coded(
                "no user id configured",
                ErrorCode::MissingUser,
            ))
        })
    }

    /// The acting user id when one is configured, empty otherwise.
    pub fn user_or_anonymous(&self) -> String {
        self.config
            .user_id(self.cli_user.as_deref())
            .unwrap_or_default()
    }

    /// Open a session for `user_id` over the configured store file.
    pub fn session(&self, user_id: impl Into<String>) -> Session {
        debug!(store = %self.config.store_path.display(), "opening file store");
        let store = Arc::new(FileStore::new(self.config.store_path.clone()));
        let notifier = Arc::new(TerminalNotifier::new(self.output));
        Session::new(store, notifier, user_id)
    }
}

/// Parse a stage or status argument.
pub fn parse_state<S>(raw: &str) -> anyhow::Result<S>
where
    S: FromStr<Err = ParseEnumError>,
{
    raw.parse::<S>()
        .map_err(|e| anyhow::Error::from(CliError::coded(e.to_string(), ErrorCode::InvalidEnumValue)))
}

/// Parse an optional `--from`/`--to` bound.
pub fn parse_bound(raw: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    raw.map(|value| parse_date_bound(value).map_err(|e| anyhow::Error::from(CliError::new(e))))
        .transpose()
}

/// Ask a yes/no question on stderr. Non-interactive sessions answer yes.
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    if !is_interactive(std::io::stdin().is_terminal(), std::io::stdout().is_terminal()) {
        return Ok(true);
    }

    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Prompt only when both ends are a terminal; piped output never blocks.
const fn is_interactive(stdin_tty: bool, stdout_tty: bool) -> bool {
    stdin_tty && stdout_tty
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::workflow::{ReportStatus, Stage};

    #[test]
    fn state_arguments_accept_spelling_variants() {
        assert_eq!(parse_state::<Stage>("in-progress").unwrap(), Stage::InProgress);
        assert_eq!(
            parse_state::<ReportStatus>("Maintaining").unwrap(),
            ReportStatus::Maintaining
        );
    }

    #[test]
    fn unknown_state_maps_to_enum_error() {
        let err = parse_state::<Stage>("archived").unwrap_err();
        let cli = err.downcast_ref::<CliError>().expect("cli error");
        assert_eq!(cli.error_code.as_deref(), Some("E2005"));
    }

    #[test]
    fn bounds_are_optional() {
        assert!(parse_bound(None).unwrap().is_none());
        assert!(parse_bound(Some("2024-01-02")).unwrap().is_some());
        assert!(parse_bound(Some("yesterday")).is_err());
    }

    #[test]
    fn prompts_need_a_terminal_on_both_ends() {
        assert!(is_interactive(true, true));
        assert!(!is_interactive(true, false));
        assert!(!is_interactive(false, true));
        assert!(!is_interactive(false, false));
    }
}
