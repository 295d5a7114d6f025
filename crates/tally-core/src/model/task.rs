use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::id::EntityId;
use crate::model::timestamp;
use crate::workflow::{Stage, WorkflowField};

/// Placeholder shown for a task without a title.
pub const UNTITLED: &str = "No title";

/// Lightweight summary of a team member, as embedded in a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    #[serde(alias = "_id")]
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl MemberSummary {
    /// Up to two initials for compact team rendering.
    #[must_use]
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// A work item assigned to a team.
///
/// Tasks are created and owned elsewhere; the core only changes `stage`
/// and `is_trash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(alias = "_id")]
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub stage: WorkflowField<Stage>,
    /// Assignment timestamp.
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    /// Due timestamp.
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub team: Vec<MemberSummary>,
    #[serde(default)]
    pub is_trash: bool,
}

impl Task {
    /// Create an untrashed task in the default stage.
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            stage: WorkflowField::default(),
            created_at: None,
            date: None,
            team: Vec::new(),
            is_trash: false,
        }
    }

    /// Title for display, falling back to [`UNTITLED`].
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(UNTITLED)
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage.set(stage);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.date = Some(due);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_server_document() {
        let json = r#"{
            "_id": "66a1",
            "title": "Ship onboarding",
            "stage": "in progress",
            "createdAt": "2024-01-03T09:30:00Z",
            "date": "2024-01-10T00:00:00Z",
            "team": [{"_id": "u1", "name": "Ada Lovelace", "title": "Engineer"}],
            "isTrash": false
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id.as_str(), "66a1");
        assert_eq!(task.stage.get(), Stage::InProgress);
        assert_eq!(task.team.len(), 1);
        assert_eq!(task.team[0].initials(), "AL");
        assert!(!task.is_trash);
    }

    #[test]
    fn missing_title_uses_placeholder() {
        let task = Task::new("1");
        assert_eq!(task.display_title(), UNTITLED);
        let blank = Task::new("2").with_title("   ");
        assert_eq!(blank.display_title(), UNTITLED);
    }

    #[test]
    fn unknown_stage_survives_round_trip() {
        let json = r#"{"id": "9", "stage": "blocked"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.stage.get(), Stage::Todo);
        let out = serde_json::to_value(&task).unwrap();
        assert_eq!(out["stage"], "blocked");
    }
}
