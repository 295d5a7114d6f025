use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::id::EntityId;
use crate::model::timestamp;
use crate::workflow::{ReportStatus, WorkflowField};

/// Placeholder shown for a report without an administrator remark.
pub const NO_REMARK: &str = "No remark yet";

/// A user's daily report.
///
/// Legacy documents carry the submission time as `createdAt`, `dateTime`,
/// or both; [`Report::timestamp`] treats them as one value, preferring
/// `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(alias = "_id")]
    pub id: EntityId,
    pub content: String,
    #[serde(default)]
    pub status: WorkflowField<ReportStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::lenient"
    )]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::lenient"
    )]
    pub created_at: Option<DateTime<Utc>>,
    pub user_id: String,
    /// Administrator annotation; empty when absent.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub remark: String,
    /// Unsubmitted remark edit. Never leaves the client.
    #[serde(skip)]
    pub draft_remark: String,
}

impl Report {
    #[must_use]
    pub fn new(id: impl Into<EntityId>, user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status: WorkflowField::default(),
            date_time: None,
            created_at: None,
            user_id: user_id.into(),
            remark: String::new(),
            draft_remark: String::new(),
        }
    }

    /// The canonical submission timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.date_time)
    }

    /// Remark for display, falling back to [`NO_REMARK`].
    #[must_use]
    pub fn display_remark(&self) -> &str {
        if self.remark.is_empty() {
            NO_REMARK
        } else {
            &self.remark
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: ReportStatus) -> Self {
        self.status.set(status);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_prefers_created_at() {
        let created = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        let submitted = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut report = Report::new("r1", "u1", "wrote tests");
        report.date_time = Some(submitted);
        assert_eq!(report.timestamp(), Some(submitted));
        report.created_at = Some(created);
        assert_eq!(report.timestamp(), Some(created));
    }

    #[test]
    fn null_remark_reads_as_empty() {
        let json = r#"{"_id": "r1", "content": "x", "userId": "u1", "remark": null}"#;
        let report: Report = serde_json::from_str(json).unwrap();
        assert_eq!(report.remark, "");
        assert_eq!(report.display_remark(), NO_REMARK);
        assert_eq!(report.status.get(), ReportStatus::Todo);
    }

    #[test]
    fn draft_is_never_serialized() {
        let mut report = Report::new("r1", "u1", "x");
        report.draft_remark = "half typed".to_string();
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("draftRemark").is_none());
        assert_eq!(value["userId"], "u1");
    }
}
