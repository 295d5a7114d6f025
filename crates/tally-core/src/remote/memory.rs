use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};

use super::{NewReport, RemoteError, RemoteStore, ReportPatch, TaskPatch, TrashAck};
use crate::model::{EntityId, Report, Task};

/// Which remote operation a call or an injected failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListTasks,
    ListReports,
    CreateReport,
    UpdateReport,
    DeleteReport,
    SoftDeleteTask,
    UpdateTask,
}

impl StoreOp {
    const fn is_write(self) -> bool {
        !matches!(self, Self::ListTasks | Self::ListReports)
    }
}

/// One recorded call: the operation and the id or user it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub target: String,
}

/// In-process store for tests and demos.
///
/// Failures are queued per operation with [`MemoryStore::fail_next`]. Writes
/// can be held in flight with [`MemoryStore::hold_writes`] until
/// [`MemoryStore::release_writes`] is called.
pub struct MemoryStore {
    pub tasks: Mutex<Vec<Task>>,
    pub reports: Mutex<Vec<Report>>,
    failures: Mutex<HashMap<StoreOp, VecDeque<RemoteError>>>,
    calls: Mutex<Vec<StoreCall>>,
    next_id: AtomicU64,
    write_gate: watch::Sender<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            write_gate: watch::Sender::new(false),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reports(reports: Vec<Report>) -> Self {
        Self {
            reports: Mutex::new(reports),
            ..Self::default()
        }
    }

    /// Make the next call to `op` fail with `error`.
    pub async fn fail_next(&self, op: StoreOp, error: RemoteError) {
        self.failures
            .lock()
            .await
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    /// Number of calls made to `op`.
    pub async fn call_count(&self, op: StoreOp) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.op == op)
            .count()
    }

    /// Park every subsequent write until [`MemoryStore::release_writes`].
    pub fn hold_writes(&self) {
        self.write_gate.send_replace(true);
    }

    /// Let parked writes complete.
    pub fn release_writes(&self) {
        self.write_gate.send_replace(false);
    }

    async fn enter(&self, op: StoreOp, target: &str) -> Result<(), RemoteError> {
        self.calls.lock().await.push(StoreCall {
            op,
            target: target.to_string(),
        });

        if op.is_write() {
            let mut gate = self.write_gate.subscribe();
            gate.wait_for(|held| !held)
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
        }

        let injected = self
            .failures
            .lock()
            .await
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        injected.map_or(Ok(()), Err)
    }

    fn assign_id(&self) -> EntityId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        EntityId::new(format!("rpt-{n}"))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        self.enter(StoreOp::ListTasks, "*").await?;
        Ok(self.tasks.lock().await.clone())
    }

    async fn list_reports(&self, user_id: &str) -> Result<Vec<Report>, RemoteError> {
        self.enter(StoreOp::ListReports, user_id).await?;
        Ok(self
            .reports
            .lock()
            .await
            .iter()
            .filter(|report| report.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_report(&self, report: &NewReport) -> Result<Report, RemoteError> {
        self.enter(StoreOp::CreateReport, &report.user_id).await?;
        let mut created = Report::new(self.assign_id(), report.user_id.clone(), report.content.clone())
            .with_status(report.status)
            .with_remark(report.remark.clone());
        created.date_time = Some(report.date_time);
        created.created_at = Some(report.date_time);
        self.reports.lock().await.push(created.clone());
        Ok(created)
    }

    async fn update_report(
        &self,
        id: &EntityId,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, RemoteError> {
        self.enter(StoreOp::UpdateReport, id.as_str()).await?;
        let mut reports = self.reports.lock().await;
        let report = reports
            .iter_mut()
            .find(|report| &report.id == id)
            .ok_or_else(|| RemoteError::not_found("report", id))?;
        patch.apply_to(report);
        Ok(Some(report.clone()))
    }

    async fn delete_report(&self, id: &EntityId) -> Result<(), RemoteError> {
        self.enter(StoreOp::DeleteReport, id.as_str()).await?;
        let mut reports = self.reports.lock().await;
        let before = reports.len();
        reports.retain(|report| &report.id != id);
        if reports.len() == before {
            return Err(RemoteError::not_found("report", id));
        }
        Ok(())
    }

    async fn soft_delete_task(&self, id: &EntityId) -> Result<TrashAck, RemoteError> {
        self.enter(StoreOp::SoftDeleteTask, id.as_str()).await?;
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| RemoteError::not_found("task", id))?;
        task.is_trash = true;
        Ok(TrashAck::Message {
            message: "Task trashed successfully.".to_string(),
        })
    }

    async fn update_task(&self, id: &EntityId, patch: &TaskPatch) -> Result<Task, RemoteError> {
        self.enter(StoreOp::UpdateTask, id.as_str()).await?;
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| RemoteError::not_found("task", id))?;
        patch.apply_to(task);
        Ok(task.clone())
    }
}
