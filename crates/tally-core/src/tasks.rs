//! The team task board: load, restage, trash.
//!
//! Tasks are owned elsewhere. The board only moves a task between stages
//! and sends it to the trash, both through the optimistic coordinator.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::TallyError;
use crate::filter::Predicates;
use crate::model::{EntityId, Task};
use crate::remote::{RemoteStore, TaskPatch};
use crate::sync::{Notices, OptimisticMutationCoordinator};
use crate::trash::TrashLifecycle;
use crate::view::ViewState;
use crate::workflow::{Stage, WorkflowField, WorkflowState};

pub const FETCH_FAILURE: &str = "Error fetching tasks.";

/// The task dashboard: load, restage, trash.
pub struct TaskBoard {
    coordinator: OptimisticMutationCoordinator,
    store: Arc<dyn RemoteStore>,
    trash: TrashLifecycle,
}

impl TaskBoard {
    #[must_use]
    pub fn new(coordinator: OptimisticMutationCoordinator, store: Arc<dyn RemoteStore>) -> Self {
        let trash = TrashLifecycle::new(coordinator.clone(), Arc::clone(&store));
        Self {
            coordinator,
            store,
            trash,
        }
    }

    #[must_use]
    pub const fn trash(&self) -> &TrashLifecycle {
        &self.trash
    }

    /// Reload every task. Trashed ones are kept in the view (still
    /// addressable by id) and hidden by the filter.
    ///
    /// # Errors
    ///
    /// [`TallyError::Fetch`] when the store cannot be read; the previous list
    /// stays and an inline error is recorded.
    pub async fn fetch(&self) -> Result<usize, TallyError> {
        match self.store.list_tasks().await {
            Ok(tasks) => {
                let count = tasks.len();
                self.coordinator.view().update(|state| {
                    state.tasks = tasks;
                    state.tasks_error = None;
                });
                debug!(count, backend = self.store.backend_tag(), "tasks loaded");
                Ok(count)
            }
            Err(source) => {
                warn!(error = %source, "task fetch failed");
                self.coordinator
                    .view()
                    .update(|state| state.tasks_error = Some(FETCH_FAILURE.to_string()));
                Err(TallyError::Fetch {
                    message: FETCH_FAILURE.to_string(),
                    source,
                })
            }
        }
    }

    /// Move a task to `stage` optimistically.
    ///
    /// # Errors
    ///
    /// [`TallyError::NotFound`], [`TallyError::InvalidTransition`], or
    /// [`TallyError::Remote`] after rollback.
    pub async fn change_stage(&self, id: &EntityId, stage: Stage) -> Result<Task, TallyError> {
        let patch = TaskPatch {
            stage: Some(stage),
            ..TaskPatch::default()
        };
        let notices = Notices::new(format!("Stage updated to {stage}."), "Error updating stage.");
        self.coordinator
            .mutate(
                "change_stage",
                id.as_str(),
                &notices,
                |state| {
                    let task = state.task_mut(id)?;
                    task.stage.get().can_transition_to(stage)?;
                    let prior = task.stage.clone();
                    task.stage.set(stage);
                    Ok(prior)
                },
                || self.store.update_task(id, &patch),
                |state, prior: WorkflowField<Stage>| {
                    if let Ok(task) = state.task_mut(id) {
                        task.stage = prior;
                    }
                },
            )
            .await
    }

    pub fn set_filters(&self, predicates: Predicates<Stage>) {
        self.coordinator
            .view()
            .update(|state| state.task_filters = predicates);
    }

    pub fn clear_filters(&self) {
        self.coordinator.view().update(|state| state.task_filters.clear());
    }

    /// Untrashed tasks passing the current filters, in stored order.
    #[must_use]
    pub fn visible(&self) -> Vec<Task> {
        self.coordinator.view().read(ViewState::visible_tasks)
    }
}
