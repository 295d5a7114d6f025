//! JSON-document store on the local filesystem.
//!
//! The whole document (`{"tasks": [...], "reports": [...]}`) is read, changed
//! and written back for every call, under one async lock. Writes go to a
//! sibling temp file that is then renamed over the original.
//!
//! Records are kept as raw JSON. A write merges only the patched fields into
//! the one record it targets, so keys this crate does not model survive, as
//! does every other record.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{NewReport, RemoteError, RemoteStore, ReportPatch, TaskPatch, TrashAck};
use crate::model::{EntityId, Report, Task};

const TASKS: &str = "tasks";
const REPORTS: &str = "reports";

pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, RemoteError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => return Ok(Map::new()),
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(io_error(&self.path, &e)),
        };
        match serde_json::from_str(&raw) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(_) => Err(self.parse_error("top level is not an object")),
            Err(e) => Err(self.parse_error(&e.to_string())),
        }
    }

    async fn save(&self, doc: &Map<String, Value>) -> Result<(), RemoteError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        let data = serde_json::to_string_pretty(doc)
            .map_err(|e| RemoteError::Transport(format!("failed to encode store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        debug!(path = %self.path.display(), "store written");
        Ok(())
    }

    /// Load, apply `change`, and write back only when `change` succeeds.
    async fn modify<T: Send>(
        &self,
        change: impl FnOnce(&mut Map<String, Value>) -> Result<T, RemoteError> + Send,
    ) -> Result<T, RemoteError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let out = change(&mut doc)?;
        self.save(&doc).await?;
        Ok(out)
    }

    /// Every record under `key`, decoded.
    async fn list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, RemoteError> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        doc.get(key)
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .map(|record| self.decode(record))
            .collect()
    }

    fn decode<T: DeserializeOwned>(&self, record: &Value) -> Result<T, RemoteError> {
        T::deserialize(record).map_err(|e| self.parse_error(&e.to_string()))
    }

    fn parse_error(&self, detail: &str) -> RemoteError {
        RemoteError::Transport(format!("failed to parse {}: {detail}", self.path.display()))
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> RemoteError {
    RemoteError::Transport(format!("{}: {e}", path.display()))
}

/// The store's id for `record`, under either key older writers used.
fn record_id(record: &Value) -> Option<&str> {
    record
        .get("_id")
        .or_else(|| record.get("id"))
        .and_then(Value::as_str)
}

fn collection<'a>(
    doc: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Vec<Value>, RemoteError> {
    doc.entry(key)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| RemoteError::Transport(format!("store field '{key}' is not an array")))
}

fn find<'a>(records: &'a mut [Value], id: &EntityId) -> Option<&'a mut Value> {
    records
        .iter_mut()
        .find(|record| record_id(record) == Some(id.as_str()))
}

/// Overwrite the keys `patch` serializes, leaving the rest of `record` alone.
fn merge(record: &mut Value, patch: &impl Serialize) -> Result<(), RemoteError> {
    let encode = |e: serde_json::Error| RemoteError::Transport(format!("failed to encode patch: {e}"));
    let Value::Object(fields) = serde_json::to_value(patch).map_err(encode)? else {
        return Ok(());
    };
    if let Some(target) = record.as_object_mut() {
        target.extend(fields);
    }
    Ok(())
}

/// Short content-derived id, the way a server would mint one.
fn mint_id(report: &NewReport, salt: usize) -> EntityId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(report.user_id.as_bytes());
    hasher.update(report.content.as_bytes());
    hasher.update(report.date_time.to_rfc3339().as_bytes());
    hasher.update(&salt.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    EntityId::new(format!("rpt-{}", &hex.as_str()[..10]))
}

#[async_trait]
impl RemoteStore for FileStore {
    fn backend_tag(&self) -> &'static str {
        "file"
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        self.list(TASKS).await
    }

    async fn list_reports(&self, user_id: &str) -> Result<Vec<Report>, RemoteError> {
        let reports: Vec<Report> = self.list(REPORTS).await?;
        Ok(reports
            .into_iter()
            .filter(|report| report.user_id == user_id)
            .collect())
    }

    async fn create_report(&self, report: &NewReport) -> Result<Report, RemoteError> {
        if report.content.trim().is_empty() {
            return Err(RemoteError::rejected(400, "Report content is required."));
        }
        self.modify(|doc| {
            let reports = collection(doc, REPORTS)?;
            let mut salt = reports.len();
            let mut id = mint_id(report, salt);
            while reports.iter().any(|existing| record_id(existing) == Some(id.as_str())) {
                salt += 1;
                id = mint_id(report, salt);
            }
            let mut created = Report::new(id, report.user_id.clone(), report.content.clone())
                .with_status(report.status)
                .with_remark(report.remark.clone())
                .with_created_at(Utc::now());
            created.date_time = Some(report.date_time);
            let record = serde_json::to_value(&created)
                .map_err(|e| RemoteError::Transport(format!("failed to encode report: {e}")))?;
            reports.push(record);
            Ok(created)
        })
        .await
    }

    async fn update_report(
        &self,
        id: &EntityId,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, RemoteError> {
        self.modify(|doc| {
            let record = find(collection(doc, REPORTS)?, id)
                .ok_or_else(|| RemoteError::not_found("report", id))?;
            merge(record, patch)?;
            self.decode(record).map(Some)
        })
        .await
    }

    async fn delete_report(&self, id: &EntityId) -> Result<(), RemoteError> {
        self.modify(|doc| {
            let reports = collection(doc, REPORTS)?;
            let before = reports.len();
            reports.retain(|record| record_id(record) != Some(id.as_str()));
            if reports.len() == before {
                return Err(RemoteError::not_found("report", id));
            }
            Ok(())
        })
        .await
    }

    async fn soft_delete_task(&self, id: &EntityId) -> Result<TrashAck, RemoteError> {
        let patch = TaskPatch {
            is_trash: Some(true),
            ..TaskPatch::default()
        };
        let task = self.update_task(id, &patch).await?;
        Ok(TrashAck::Task(Box::new(task)))
    }

    async fn update_task(&self, id: &EntityId, patch: &TaskPatch) -> Result<Task, RemoteError> {
        self.modify(|doc| {
            let record = find(collection(doc, TASKS)?, id)
                .ok_or_else(|| RemoteError::not_found("task", id))?;
            merge(record, patch)?;
            self.decode(record)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::workflow::{ReportStatus, Stage};

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        assert!(store.list_tasks().await.unwrap().is_empty());
        assert!(store.list_reports("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reports_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.json");

        let created = FileStore::new(&path)
            .create_report(&NewReport::new("u1", "standup notes", Utc::now()))
            .await
            .unwrap();
        assert!(created.id.as_str().starts_with("rpt-"));

        let reopened = FileStore::new(&path);
        let patch = ReportPatch {
            status: Some(ReportStatus::Completed),
            ..ReportPatch::default()
        };
        reopened.update_report(&created.id, &patch).await.unwrap();

        let reports = reopened.list_reports("u1").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status.get(), ReportStatus::Completed);
        assert!(!path.with_extension("json.tmp").exists());
    }

    fn seed(path: &Path, doc: &Value) {
        std::fs::write(path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn task_changes_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        seed(&path, &json!({"tasks": [{"_id": "t1", "title": "Wire up login"}]}));

        let store = FileStore::new(&path);
        let patch = TaskPatch {
            stage: Some(Stage::Completed),
            ..TaskPatch::default()
        };
        store.update_task(&EntityId::from("t1"), &patch).await.unwrap();
        let ack = store.soft_delete_task(&EntityId::from("t1")).await.unwrap();
        assert!(matches!(ack, TrashAck::Task(ref t) if t.is_trash));

        let tasks = store.list_tasks().await.unwrap();
        assert_eq!(tasks[0].stage.get(), Stage::Completed);
        assert!(tasks[0].is_trash);
    }

    #[tokio::test]
    async fn writes_touch_only_the_patched_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let before = json!({
            "tasks": [
                {"_id": "t1", "title": "A", "stage": "todo", "priority": "high", "description": "keep me"},
                {"_id": "t2", "title": "B", "stage": "todo", "priority": "low",
                 "subTasks": [{"title": "step", "isCompleted": false}]}
            ],
            "reports": [
                {"_id": "r1", "content": "c", "userId": "u1", "attachment": "a.pdf"}
            ],
            "version": 3
        });
        seed(&path, &before);

        let store = FileStore::new(&path);
        let patch = TaskPatch {
            stage: Some(Stage::Completed),
            ..TaskPatch::default()
        };
        store.update_task(&EntityId::from("t1"), &patch).await.unwrap();

        let after = read(&path);
        assert_eq!(after["tasks"][1], before["tasks"][1]);
        assert_eq!(after["reports"], before["reports"]);
        assert_eq!(after["version"], 3);

        let mut expected = before["tasks"][0].clone();
        expected["stage"] = json!("completed");
        assert_eq!(after["tasks"][0], expected);
        assert!(after["tasks"][0].get("id").is_none());
    }

    #[tokio::test]
    async fn report_patch_leaves_missing_status_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        seed(
            &path,
            &json!({"reports": [
                {"_id": "r1", "content": "c", "userId": "u1"},
                {"_id": "r2", "content": "d", "userId": "u1", "attachment": "a.pdf"}
            ]}),
        );

        let store = FileStore::new(&path);
        let patch = ReportPatch {
            remark: Some("seen".into()),
            ..ReportPatch::default()
        };
        let updated = store
            .update_report(&EntityId::from("r2"), &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.remark, "seen");

        let after = read(&path);
        assert_eq!(after["reports"][0], json!({"_id": "r1", "content": "c", "userId": "u1"}));
        assert_eq!(after["reports"][1]["attachment"], "a.pdf");
        assert_eq!(after["reports"][1]["remark"], "seen");
    }

    #[tokio::test]
    async fn date_only_stamps_read_as_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        seed(
            &path,
            &json!({"tasks": [{"_id": "t1", "createdAt": "2024-01-03"}], "reports": []}),
        );

        let store = FileStore::new(&path);
        let tasks = store.list_tasks().await.unwrap();
        assert_eq!(
            tasks[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
        );

        let patch = TaskPatch {
            stage: Some(Stage::InProgress),
            ..TaskPatch::default()
        };
        store.update_task(&EntityId::from("t1"), &patch).await.unwrap();
        assert_eq!(read(&path)["tasks"][0]["createdAt"], "2024-01-03");
    }

    #[tokio::test]
    async fn unknown_ids_are_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::new(&path);
        let err = store.delete_report(&EntityId::from("nope")).await.unwrap_err();
        assert!(err.message().is_some());
        assert!(!path.exists());
    }
}
