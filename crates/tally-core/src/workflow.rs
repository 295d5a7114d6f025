//! Workflow states for tasks and reports.
//!
//! Tasks move through a [`Stage`] and reports through a [`ReportStatus`].
//! Both are closed sets. Stored values are kept verbatim in a
//! [`WorkflowField`] and normalized on read, so a value the core does not
//! recognize is displayed and filtered as the default member without being
//! dropped from storage.
//!
//! # Transitions
//!
//! Every member may currently move to every other member. The per-type
//! `FORBIDDEN_*` tables are the single place to add guarded transitions
//! (for example `completed -> todo`); call sites go through
//! [`WorkflowState::can_transition_to`] or [`is_valid_transition`] and do
//! not change when a guard is added.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

/// The two tracked entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Report,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkflowState trait
// ---------------------------------------------------------------------------

/// A closed workflow enum with a default member and a transition table.
pub trait WorkflowState:
    Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// The entity this workflow belongs to.
    const KIND: EntityKind;

    /// The member unrecognized or missing input normalizes to.
    const DEFAULT: Self;

    /// All members in display order.
    const ALL: &'static [Self];

    /// Canonical wire/display form.
    fn as_str(self) -> &'static str;

    /// Parse a raw value, returning `None` when it is not a member.
    fn parse(raw: &str) -> Option<Self>;

    /// Pairs `(from, to)` that are not allowed.
    fn forbidden() -> &'static [(Self, Self)];

    /// Parse a raw value, falling back to [`WorkflowState::DEFAULT`].
    fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::DEFAULT)
    }

    /// Validate whether a transition from `self` to `target` is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when the pair appears in the forbidden
    /// table.
    fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        if Self::forbidden().contains(&(self, target)) {
            return Err(InvalidTransition {
                kind: Self::KIND,
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
                reason: "transition not allowed by workflow rules",
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Task stage
// ---------------------------------------------------------------------------

/// Lifecycle stage of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Todo,
    InProgress,
    Completed,
}

const FORBIDDEN_STAGE: &[(Stage, Stage)] = &[];

impl WorkflowState for Stage {
    const KIND: EntityKind = EntityKind::Task;
    const DEFAULT: Self = Self::Todo;
    const ALL: &'static [Self] = &[Self::Todo, Self::InProgress, Self::Completed];

    fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "todo" | "to-do" => Some(Self::Todo),
            "in progress" | "in-progress" | "in_progress" | "inprogress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    fn forbidden() -> &'static [(Self, Self)] {
        FORBIDDEN_STAGE
    }
}

// ---------------------------------------------------------------------------
// Report status
// ---------------------------------------------------------------------------

/// Workflow status of a daily report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    Todo,
    InProgress,
    Completed,
    Maintaining,
}

const FORBIDDEN_STATUS: &[(ReportStatus, ReportStatus)] = &[];

impl WorkflowState for ReportStatus {
    const KIND: EntityKind = EntityKind::Report;
    const DEFAULT: Self = Self::Todo;
    const ALL: &'static [Self] = &[
        Self::Todo,
        Self::InProgress,
        Self::Completed,
        Self::Maintaining,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
            Self::Maintaining => "Maintaining",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "todo" => Some(Self::Todo),
            "in progress" | "in-progress" | "in_progress" | "inprogress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "maintaining" => Some(Self::Maintaining),
            _ => None,
        }
    }

    fn forbidden() -> &'static [(Self, Self)] {
        FORBIDDEN_STATUS
    }
}

fn normalize_token(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

macro_rules! workflow_text_impls {
    ($ty:ty, $expected:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty as WorkflowState>::parse(s).ok_or_else(|| ParseEnumError {
                    expected: $expected,
                    got: s.to_string(),
                })
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

workflow_text_impls!(Stage, "stage");
workflow_text_impls!(ReportStatus, "status");

// ---------------------------------------------------------------------------
// WorkflowField
// ---------------------------------------------------------------------------

/// A stored workflow value, kept exactly as received.
///
/// Reads go through [`WorkflowField::get`], which normalizes unknown or
/// empty input to the default member.
pub struct WorkflowField<S> {
    raw: String,
    _state: PhantomData<fn() -> S>,
}

impl<S: WorkflowState> WorkflowField<S> {
    /// Wrap a raw stored value without validating it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            _state: PhantomData,
        }
    }

    /// The normalized member.
    #[must_use]
    pub fn get(&self) -> S {
        S::normalize(&self.raw)
    }

    /// Overwrite with a canonical member.
    pub fn set(&mut self, state: S) {
        state.as_str().clone_into(&mut self.raw);
    }

    /// The value exactly as stored.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the stored value is a recognized member.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        S::parse(&self.raw).is_some()
    }
}

impl<S: WorkflowState> From<S> for WorkflowField<S> {
    fn from(state: S) -> Self {
        Self::from_raw(state.as_str())
    }
}

impl<S: WorkflowState> Default for WorkflowField<S> {
    fn default() -> Self {
        Self::from(S::DEFAULT)
    }
}

impl<S> Clone for WorkflowField<S> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _state: PhantomData,
        }
    }
}

impl<S> PartialEq for WorkflowField<S> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<S> Eq for WorkflowField<S> {}

impl<S> fmt::Debug for WorkflowField<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkflowField").field(&self.raw).finish()
    }
}

impl<S: WorkflowState> fmt::Display for WorkflowField<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.get().as_str())
    }
}

impl<S> Serialize for WorkflowField<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de, S: WorkflowState> Deserialize<'de> for WorkflowField<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or_else(Self::default, Self::from_raw))
    }
}

// ---------------------------------------------------------------------------
// Dynamic entry points
// ---------------------------------------------------------------------------

/// A normalized workflow value for either entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowValue {
    Stage(Stage),
    Status(ReportStatus),
}

impl fmt::Display for WorkflowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => stage.fmt(f),
            Self::Status(status) => status.fmt(f),
        }
    }
}

/// Map a raw (possibly missing) stored value to a workflow member.
#[must_use]
pub fn normalize(kind: EntityKind, raw: Option<&str>) -> WorkflowValue {
    let raw = raw.unwrap_or_default();
    match kind {
        EntityKind::Task => WorkflowValue::Stage(Stage::normalize(raw)),
        EntityKind::Report => WorkflowValue::Status(ReportStatus::normalize(raw)),
    }
}

/// Whether `from -> to` is a legal transition for `kind`.
///
/// `from` is normalized first; an unrecognized `to` is never legal.
#[must_use]
pub fn is_valid_transition(kind: EntityKind, from: &str, to: &str) -> bool {
    fn check<S: WorkflowState>(from: &str, to: &str) -> bool {
        S::parse(to).is_some_and(|target| S::normalize(from).can_transition_to(target).is_ok())
    }

    match kind {
        EntityKind::Task => check::<Stage>(from, to),
        EntityKind::Report => check::<ReportStatus>(from, to),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error returned when a workflow transition is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} transition from '{from}' to '{to}': {reason}")]
pub struct InvalidTransition {
    pub kind: EntityKind,
    pub from: String,
    pub to: String,
    pub reason: &'static str,
}

/// Error returned when parsing a workflow value from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected}: '{got}'")]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}
