//! One signed-in user's view over a store.

use std::sync::Arc;

use crate::notify::Notifier;
use crate::remote::RemoteStore;
use crate::reports::ReportBoard;
use crate::sync::OptimisticMutationCoordinator;
use crate::tasks::TaskBoard;
use crate::view::SharedView;

/// Wires the shared view, coordinator and both boards together.
pub struct Session {
    view: SharedView,
    reports: ReportBoard,
    tasks: TaskBoard,
}

impl Session {
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        user_id: impl Into<String>,
    ) -> Self {
        let view = SharedView::default();
        let coordinator = OptimisticMutationCoordinator::new(view.clone(), notifier);
        Self {
            reports: ReportBoard::new(coordinator.clone(), Arc::clone(&store), user_id),
            tasks: TaskBoard::new(coordinator, store),
            view,
        }
    }

    #[must_use]
    pub const fn view(&self) -> &SharedView {
        &self.view
    }

    #[must_use]
    pub const fn reports(&self) -> &ReportBoard {
        &self.reports
    }

    #[must_use]
    pub const fn tasks(&self) -> &TaskBoard {
        &self.tasks
    }
}
