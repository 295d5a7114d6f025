//! The explicit state container shared by every flow.
//!
//! Components never hold their own copy of a collection. They receive a
//! [`SharedView`] and change it only through closures passed to
//! [`SharedView::update`], so every change (and every rollback) is one
//! synchronous transform of the current state.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TallyError;
use crate::filter::{self, Predicates};
use crate::model::{EntityId, Report, Task};
use crate::workflow::{EntityKind, ReportStatus, Stage};

/// The report input box and its editing target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    pub content: String,
    /// Report being edited; `None` means the next submit creates one.
    pub editing: Option<EntityId>,
    /// Inline validation message shown under the input.
    pub inline_error: Option<String>,
}

impl Composer {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub tasks: Vec<Task>,
    pub reports: Vec<Report>,
    pub task_filters: Predicates<Stage>,
    pub report_filters: Predicates<ReportStatus>,
    pub composer: Composer,
    /// Persistent inline error from the last failed task load.
    pub tasks_error: Option<String>,
    /// Persistent inline error from the last failed report load.
    pub reports_error: Option<String>,
}

impl ViewState {
    #[must_use]
    pub fn task(&self, id: &EntityId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// # Errors
    ///
    /// Returns [`TallyError::NotFound`] when no task has `id`.
    pub fn task_mut(&mut self, id: &EntityId) -> Result<&mut Task, TallyError> {
        self.tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| TallyError::not_found(EntityKind::Task, id))
    }

    #[must_use]
    pub fn report(&self, id: &EntityId) -> Option<&Report> {
        self.reports.iter().find(|report| &report.id == id)
    }

    /// # Errors
    ///
    /// Returns [`TallyError::NotFound`] when no report has `id`.
    pub fn report_mut(&mut self, id: &EntityId) -> Result<&mut Report, TallyError> {
        self.reports
            .iter_mut()
            .find(|report| &report.id == id)
            .ok_or_else(|| TallyError::not_found(EntityKind::Report, id))
    }

    /// Tasks passing the current task filters.
    #[must_use]
    pub fn visible_tasks(&self) -> Vec<Task> {
        filter::apply(&self.tasks, &self.task_filters)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Reports passing the current report filters.
    #[must_use]
    pub fn visible_reports(&self) -> Vec<Report> {
        filter::apply(&self.reports, &self.report_filters)
            .into_iter()
            .cloned()
            .collect()
    }
}

/// Cloneable handle to one [`ViewState`].
///
/// The lock is only held inside the closures given to [`SharedView::read`]
/// and [`SharedView::update`]; neither may be called across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedView(Arc<Mutex<ViewState>>);

impl SharedView {
    #[must_use]
    pub fn new(state: ViewState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    pub fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// A full copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.read(Clone::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_report_missing_ids() {
        let mut state = ViewState {
            tasks: vec![Task::new("t1")],
            ..ViewState::default()
        };
        assert!(state.task(&EntityId::from("t1")).is_some());
        let err = state.report_mut(&EntityId::from("r9")).unwrap_err();
        assert_eq!(err.to_string(), "report 'r9' not found");
    }

    #[test]
    fn visible_views_apply_filters() {
        let mut trashed = Task::new("t2");
        trashed.is_trash = true;
        let view = SharedView::new(ViewState {
            tasks: vec![Task::new("t1"), trashed],
            reports: vec![
                Report::new("r1", "u1", "a").with_status(ReportStatus::Completed),
                Report::new("r2", "u1", "b"),
            ],
            ..ViewState::default()
        });
        view.update(|state| state.report_filters.state = Some(ReportStatus::Completed));

        let (tasks, reports) = view.read(|s| (s.visible_tasks(), s.visible_reports()));
        assert_eq!(tasks.len(), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id.as_str(), "r1");
    }

    #[test]
    fn clones_share_state() {
        let view = SharedView::default();
        let other = view.clone();
        other.update(|state| state.composer.content = "draft".to_string());
        assert_eq!(view.snapshot().composer.content, "draft");
    }
}
