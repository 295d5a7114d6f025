//! Optimistic mutation coordinator.
//!
//! [`OptimisticMutationCoordinator::mutate`] applies a change to the shared
//! view synchronously, awaits the remote call, then either commits (the view
//! is already right) or runs the caller's rollback against the *current*
//! state. Exactly one of the two happens per call, and a notification is
//! emitted either way.
//!
//! Rollbacks restore only the fields the mutation touched, using the prior
//! values returned by the local apply. A concurrent mutation of a different
//! record is therefore never undone by this one. Two mutations of the same
//! record are not sequenced: whichever settles last wins.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::TallyError;
use crate::notify::{Notifier, NotifyKind};
use crate::remote::{RemoteAck, RemoteError};
use crate::view::{SharedView, ViewState};

/// Notification texts for one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notices {
    /// Shown on success unless the remote acknowledgement carries a message.
    pub success: String,
    /// Shown on failure when the remote error has no message of its own.
    pub failure: String,
}

impl Notices {
    #[must_use]
    pub fn new(success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            success: success.into(),
            failure: failure.into(),
        }
    }
}

#[derive(Clone)]
pub struct OptimisticMutationCoordinator {
    view: SharedView,
    notifier: Arc<dyn Notifier>,
}

impl OptimisticMutationCoordinator {
    #[must_use]
    pub fn new(view: SharedView, notifier: Arc<dyn Notifier>) -> Self {
        Self { view, notifier }
    }

    #[must_use]
    pub const fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn notify(&self, kind: NotifyKind, message: &str) {
        self.notifier.notify(kind, message);
    }

    /// Apply locally, call remotely, then commit or roll back.
    ///
    /// `local_apply` returns the prior values it overwrote; they are handed
    /// to `on_rollback` if the remote call fails. When `local_apply` itself
    /// fails nothing is sent and nothing is notified.
    ///
    /// # Errors
    ///
    /// Returns the error from `local_apply`, or [`TallyError::Remote`] after
    /// rolling back when the remote call fails.
    pub async fn mutate<P, T, Fut>(
        &self,
        label: &'static str,
        subject: &str,
        notices: &Notices,
        local_apply: impl FnOnce(&mut ViewState) -> Result<P, TallyError>,
        remote_call: impl FnOnce() -> Fut,
        on_rollback: impl FnOnce(&mut ViewState, P),
    ) -> Result<T, TallyError>
    where
        Fut: Future<Output = Result<T, RemoteError>>,
        T: RemoteAck,
    {
        let prior = self.view.update(local_apply)?;
        debug!(label, subject, "optimistic change applied");

        match remote_call().await {
            Ok(ack) => {
                info!(label, subject, "mutation committed");
                self.notify_success(notices, &ack);
                Ok(ack)
            }
            Err(source) => {
                self.view.update(|state| on_rollback(state, prior));
                warn!(label, subject, error = %source, "mutation rolled back");
                Err(self.notify_failure(notices, source))
            }
        }
    }

    /// Call remotely first and change the view only after success.
    ///
    /// Used where the local result cannot be known up front (a created
    /// record's id) or where the change must not be visible before the
    /// store agrees (removal).
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Remote`] when the remote call fails; the view is
    /// untouched in that case.
    pub async fn mutate_confirmed<T, Fut>(
        &self,
        label: &'static str,
        subject: &str,
        notices: &Notices,
        remote_call: impl FnOnce() -> Fut,
        on_commit: impl FnOnce(&mut ViewState, &T),
    ) -> Result<T, TallyError>
    where
        Fut: Future<Output = Result<T, RemoteError>>,
        T: RemoteAck,
    {
        match remote_call().await {
            Ok(ack) => {
                self.view.update(|state| on_commit(state, &ack));
                info!(label, subject, "mutation confirmed");
                self.notify_success(notices, &ack);
                Ok(ack)
            }
            Err(source) => {
                warn!(label, subject, error = %source, "mutation failed");
                Err(self.notify_failure(notices, source))
            }
        }
    }

    fn notify_success<T: RemoteAck>(&self, notices: &Notices, ack: &T) {
        let message = ack.ack_message().unwrap_or(notices.success.as_str());
        self.notifier.notify(NotifyKind::Success, message);
    }

    fn notify_failure(&self, notices: &Notices, source: RemoteError) -> TallyError {
        let message = source.message().unwrap_or(notices.failure.as_str()).to_string();
        self.notifier.notify(NotifyKind::Error, &message);
        TallyError::Remote { message, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, Report};
    use crate::notify::MemoryNotifier;
    use crate::remote::TrashAck;
    use crate::workflow::ReportStatus;

    fn setup() -> (OptimisticMutationCoordinator, Arc<MemoryNotifier>) {
        let view = SharedView::new(ViewState {
            reports: vec![Report::new("r1", "u1", "notes")],
            ..ViewState::default()
        });
        let notifier = Arc::new(MemoryNotifier::new());
        (
            OptimisticMutationCoordinator::new(view, notifier.clone()),
            notifier,
        )
    }

    fn set_status(
        state: &mut ViewState,
        status: ReportStatus,
    ) -> Result<ReportStatus, TallyError> {
        let report = state.report_mut(&EntityId::from("r1"))?;
        let prior = report.status.get();
        report.status.set(status);
        Ok(prior)
    }

    fn restore_status(state: &mut ViewState, prior: ReportStatus) {
        if let Ok(report) = state.report_mut(&EntityId::from("r1")) {
            report.status.set(prior);
        }
    }

    #[tokio::test]
    async fn success_commits_and_notifies() {
        let (coordinator, notifier) = setup();
        let notices = Notices::new("saved", "failed");
        coordinator
            .mutate(
                "status",
                "r1",
                &notices,
                |s| set_status(s, ReportStatus::Completed),
                || async { Ok::<_, RemoteError>(()) },
                restore_status,
            )
            .await
            .unwrap();

        let state = coordinator.view().snapshot();
        assert_eq!(state.reports[0].status.get(), ReportStatus::Completed);
        assert_eq!(notifier.last().unwrap().message, "saved");
        assert_eq!(notifier.count(NotifyKind::Error), 0);
    }

    #[tokio::test]
    async fn failure_rolls_back_exactly() {
        let (coordinator, notifier) = setup();
        let before = coordinator.view().snapshot();
        let notices = Notices::new("saved", "Error updating status.");
        let err = coordinator
            .mutate(
                "status",
                "r1",
                &notices,
                |s| set_status(s, ReportStatus::Maintaining),
                || async { Err::<(), _>(RemoteError::Status { status: 500 }) },
                restore_status,
            )
            .await
            .unwrap_err();

        assert_eq!(coordinator.view().snapshot(), before);
        assert_eq!(err.to_string(), "Error updating status.");
        assert_eq!(notifier.last().unwrap().kind, NotifyKind::Error);
    }

    #[tokio::test]
    async fn remote_message_wins_over_generic_text() {
        let (coordinator, notifier) = setup();
        let notices = Notices::new("saved", "generic");
        let _ = coordinator
            .mutate(
                "status",
                "r1",
                &notices,
                |s| set_status(s, ReportStatus::Completed),
                || async { Err::<(), _>(RemoteError::rejected(409, "Report is locked")) },
                restore_status,
            )
            .await;
        assert_eq!(notifier.last().unwrap().message, "Report is locked");

        coordinator
            .mutate(
                "trash",
                "r1",
                &notices,
                |_| Ok(()),
                || async {
                    Ok::<_, RemoteError>(TrashAck::Message {
                        message: "Moved.".to_string(),
                    })
                },
                |_, ()| {},
            )
            .await
            .unwrap();
        assert_eq!(notifier.last().unwrap().message, "Moved.");
    }

    #[tokio::test]
    async fn failed_local_apply_sends_nothing() {
        let (coordinator, notifier) = setup();
        let mut called = false;
        let err = coordinator
            .mutate(
                "status",
                "missing",
                &Notices::new("ok", "no"),
                |s| s.report_mut(&EntityId::from("missing")).map(|_| ()),
                || {
                    called = true;
                    async { Ok::<_, RemoteError>(()) }
                },
                |_, ()| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::NotFound { .. }));
        assert!(!called);
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn confirmed_mutation_waits_for_the_store() {
        let (coordinator, _) = setup();
        let notices = Notices::new("deleted", "not deleted");
        let _ = coordinator
            .mutate_confirmed(
                "delete",
                "r1",
                &notices,
                || async { Err::<(), _>(RemoteError::Transport("offline".into())) },
                |s, _| s.reports.clear(),
            )
            .await;
        assert_eq!(coordinator.view().snapshot().reports.len(), 1);

        coordinator
            .mutate_confirmed(
                "delete",
                "r1",
                &notices,
                || async { Ok::<_, RemoteError>(()) },
                |s, _| s.reports.clear(),
            )
            .await
            .unwrap();
        assert!(coordinator.view().snapshot().reports.is_empty());
    }
}
