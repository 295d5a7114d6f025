use std::fmt;

use crate::model::EntityId;
use crate::remote::RemoteError;
use crate::workflow::{EntityKind, InvalidTransition};

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MissingUser,
    ItemNotFound,
    InvalidStateTransition,
    InvalidEnumValue,
    EmptyContent,
    NoPendingTrash,
    RemoteRejected,
    FetchFailed,
    StoreUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::MissingUser => "E1004",
            Self::ItemNotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::InvalidEnumValue => "E2005",
            Self::EmptyContent => "E2006",
            Self::NoPendingTrash => "E2007",
            Self::RemoteRejected => "E4001",
            Self::FetchFailed => "E4002",
            Self::StoreUnavailable => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MissingUser => "No user id configured",
            Self::ItemNotFound => "Item not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::InvalidEnumValue => "Invalid stage/status value",
            Self::EmptyContent => "Report content is empty",
            Self::NoPendingTrash => "Nothing is waiting for trash confirmation",
            Self::RemoteRejected => "Remote store rejected the change",
            Self::FetchFailed => "Could not load collection",
            Self::StoreUnavailable => "Store could not be reached",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::MissingUser => {
                Some("Pass --user, set TALLY_USER, or set session.user_id in .tally/config.toml.")
            }
            Self::ItemNotFound => None,
            Self::InvalidStateTransition => Some("Pick a different target state."),
            Self::InvalidEnumValue => Some(
                "Stages: todo, in progress, completed. Statuses: Todo, In progress, Completed, Maintaining.",
            ),
            Self::EmptyContent => Some("Write something before submitting."),
            Self::NoPendingTrash => Some("Request a trash first, then confirm it."),
            Self::RemoteRejected | Self::FetchFailed => {
                Some("Nothing was retried automatically; run the command again.")
            }
            Self::StoreUnavailable => Some("Check the store path (or connection) and its permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every failure the engine reports.
///
/// None of these are fatal: after any of them the view holds a previously
/// valid state.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// Rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("no trash request is pending confirmation")]
    NoPendingTrash,

    /// A mutation failed remotely; any optimistic change was rolled back.
    #[error("{message}")]
    Remote {
        message: String,
        #[source]
        source: RemoteError,
    },

    /// A collection load failed; the view keeps an inline error.
    #[error("{message}")]
    Fetch {
        message: String,
        #[source]
        source: RemoteError,
    },
}

impl TallyError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::EmptyContent,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            Self::NoPendingTrash => ErrorCode::NoPendingTrash,
            Self::Remote {
                source: RemoteError::Transport(_),
                ..
            }
            | Self::Fetch {
                source: RemoteError::Transport(_),
                ..
            } => ErrorCode::StoreUnavailable,
            Self::Remote { .. } => ErrorCode::RemoteRejected,
            Self::Fetch { .. } => ErrorCode::FetchFailed,
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: &EntityId) -> Self {
        Self::NotFound {
            kind,
            id: id.clone(),
        }
    }
}
