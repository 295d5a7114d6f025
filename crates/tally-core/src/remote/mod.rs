//! Request/response contracts with the authoritative store.
//!
//! The transport is someone else's problem: [`RemoteStore`] is the seam, and
//! this crate ships two backends for it, [`memory::MemoryStore`] (in-process,
//! with failure injection) and [`file::FileStore`] (a JSON document on disk).
//!
//! | Operation | Method |
//! |---|---|
//! | List tasks | [`RemoteStore::list_tasks`] |
//! | List reports for user | [`RemoteStore::list_reports`] |
//! | Create report | [`RemoteStore::create_report`] |
//! | Update report | [`RemoteStore::update_report`] |
//! | Delete report | [`RemoteStore::delete_report`] |
//! | Soft-delete task | [`RemoteStore::soft_delete_task`] |
//! | Update task | [`RemoteStore::update_task`] |

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EntityId, Report, Task};
use crate::workflow::{ReportStatus, Stage};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Non-2xx response whose payload carried a message.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    /// Non-2xx response without a usable message.
    #[error("request failed with status {status}")]
    Status { status: u16 },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(what: &str, id: &EntityId) -> Self {
        Self::rejected(404, format!("{what} {id} not found"))
    }

    /// The message from the error payload, if the store sent one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Payload for creating a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub content: String,
    pub status: ReportStatus,
    pub date_time: DateTime<Utc>,
    pub user_id: String,
    pub remark: String,
}

impl NewReport {
    /// A fresh report: status `Todo`, no remark.
    #[must_use]
    pub fn new(user_id: impl Into<String>, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            status: ReportStatus::Todo,
            date_time: now,
            user_id: user_id.into(),
            remark: String::new(),
        }
    }
}

/// Fields to change on a report. Unset fields are left alone remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl ReportPatch {
    pub(crate) fn apply_to(&self, report: &mut Report) {
        if let Some(content) = &self.content {
            content.clone_into(&mut report.content);
        }
        if let Some(status) = self.status {
            report.status.set(status);
        }
        if let Some(remark) = &self.remark {
            remark.clone_into(&mut report.remark);
        }
    }
}

/// Fields to change on a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_trash: Option<bool>,
}

impl TaskPatch {
    pub(crate) fn apply_to(&self, task: &mut Task) {
        if let Some(stage) = self.stage {
            task.stage.set(stage);
        }
        if let Some(is_trash) = self.is_trash {
            task.is_trash = is_trash;
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response to a soft-delete: either the updated task or a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrashAck {
    Task(Box<Task>),
    Message { message: String },
}

/// A successful remote response that may carry a user-facing message.
pub trait RemoteAck {
    fn ack_message(&self) -> Option<&str> {
        None
    }
}

impl RemoteAck for () {}
impl RemoteAck for Report {}
impl RemoteAck for Task {}
impl RemoteAck for Option<Report> {}

impl RemoteAck for TrashAck {
    fn ack_message(&self) -> Option<&str> {
        match self {
            Self::Task(_) => None,
            Self::Message { message } => Some(message),
        }
    }
}

// ---------------------------------------------------------------------------
// The seam
// ---------------------------------------------------------------------------

/// The authoritative store behind every mutation.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_tag(&self) -> &'static str;

    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError>;

    async fn list_reports(&self, user_id: &str) -> Result<Vec<Report>, RemoteError>;

    /// Create a report; the store assigns its id.
    async fn create_report(&self, report: &NewReport) -> Result<Report, RemoteError>;

    /// Returns the updated report when the store echoes it back.
    async fn update_report(
        &self,
        id: &EntityId,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, RemoteError>;

    async fn delete_report(&self, id: &EntityId) -> Result<(), RemoteError>;

    async fn soft_delete_task(&self, id: &EntityId) -> Result<TrashAck, RemoteError>;

    async fn update_task(&self, id: &EntityId, patch: &TaskPatch) -> Result<Task, RemoteError>;
}
