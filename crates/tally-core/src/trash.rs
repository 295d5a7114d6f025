//! Two-step soft delete for tasks.
//!
//! ```text
//! Idle --request_trash(id)--> ConfirmPending(id) --confirm()--> Idle
//!                                      |
//!                                      +--------cancel()------> Idle
//! ```
//!
//! Only one deletion is pending at a time; a second request replaces the
//! target. `confirm` returns the slot to `Idle` before the remote call, so
//! the outcome is reported through notifications and the returned result,
//! never through the slot.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::TallyError;
use crate::model::EntityId;
use crate::remote::{RemoteStore, TrashAck};
use crate::sync::{Notices, OptimisticMutationCoordinator};

pub const TRASH_SUCCESS: &str = "Task moved to trash successfully!";
pub const TRASH_FAILURE: &str = "Error occurred while deleting the task.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrashState {
    #[default]
    Idle,
    ConfirmPending(EntityId),
}

pub struct TrashLifecycle {
    coordinator: OptimisticMutationCoordinator,
    store: Arc<dyn RemoteStore>,
    slot: Mutex<TrashState>,
}

impl TrashLifecycle {
    #[must_use]
    pub fn new(coordinator: OptimisticMutationCoordinator, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            coordinator,
            store,
            slot: Mutex::new(TrashState::Idle),
        }
    }

    #[must_use]
    pub fn state(&self) -> TrashState {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The task awaiting confirmation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<EntityId> {
        match self.state() {
            TrashState::ConfirmPending(id) => Some(id),
            TrashState::Idle => None,
        }
    }

    /// Ask to trash `id`. Replaces any earlier pending request.
    pub fn request_trash(&self, id: impl Into<EntityId>) {
        let id = id.into();
        debug!(task = %id, "trash requested");
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = TrashState::ConfirmPending(id);
    }

    /// Drop the pending request without touching the task.
    pub fn cancel(&self) -> Option<EntityId> {
        let previous = std::mem::take(&mut *self.slot.lock().unwrap_or_else(PoisonError::into_inner));
        match previous {
            TrashState::ConfirmPending(id) => {
                debug!(task = %id, "trash cancelled");
                Some(id)
            }
            TrashState::Idle => None,
        }
    }

    /// Trash the pending task optimistically.
    ///
    /// # Errors
    ///
    /// [`TallyError::NoPendingTrash`] when nothing was requested,
    /// [`TallyError::NotFound`] when the task is not in the view, and
    /// [`TallyError::Remote`] when the store refuses (the flag is restored).
    pub async fn confirm(&self) -> Result<TrashAck, TallyError> {
        let TrashState::ConfirmPending(id) =
            std::mem::take(&mut *self.slot.lock().unwrap_or_else(PoisonError::into_inner))
        else {
            return Err(TallyError::NoPendingTrash);
        };

        let notices = Notices::new(TRASH_SUCCESS, TRASH_FAILURE);
        self.coordinator
            .mutate(
                "trash_task",
                id.as_str(),
                &notices,
                |state| {
                    let task = state.task_mut(&id)?;
                    Ok(std::mem::replace(&mut task.is_trash, true))
                },
                || self.store.soft_delete_task(&id),
                |state, prior| {
                    if let Ok(task) = state.task_mut(&id) {
                        task.is_trash = prior;
                    }
                },
            )
            .await
    }
}
