//! A user's daily-report board: load, compose, edit, status, delete.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::TallyError;
use crate::filter::{self, Predicates};
use crate::model::{EntityId, Report};
use crate::notify::NotifyKind;
use crate::remark::{self, RemarkChannel};
use crate::remote::{NewReport, RemoteStore, ReportPatch};
use crate::sync::{Notices, OptimisticMutationCoordinator};
use crate::view::Composer;
use crate::workflow::{EntityKind, ReportStatus, WorkflowField, WorkflowState};

pub const FETCH_FAILURE: &str = "Error fetching reports.";
pub const EMPTY_CONTENT: &str = "Report content cannot be empty.";

/// What a successful [`ReportBoard::submit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Created(Report),
    Updated(EntityId),
}

#[derive(Clone)]
pub struct ReportBoard {
    coordinator: OptimisticMutationCoordinator,
    store: Arc<dyn RemoteStore>,
    user_id: String,
    remarks: RemarkChannel,
}

impl ReportBoard {
    #[must_use]
    pub fn new(
        coordinator: OptimisticMutationCoordinator,
        store: Arc<dyn RemoteStore>,
        user_id: impl Into<String>,
    ) -> Self {
        let remarks = RemarkChannel::new(coordinator.clone(), Arc::clone(&store));
        Self {
            coordinator,
            store,
            user_id: user_id.into(),
            remarks,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub const fn remarks(&self) -> &RemarkChannel {
        &self.remarks
    }

    /// Reload the user's reports, newest first, keeping unsent drafts.
    ///
    /// A failure leaves the current list in place and records a persistent
    /// inline error instead of notifying.
    ///
    /// # Errors
    ///
    /// [`TallyError::Fetch`] when the store cannot be read.
    pub async fn fetch(&self) -> Result<usize, TallyError> {
        match self.store.list_reports(&self.user_id).await {
            Ok(mut fetched) => {
                filter::newest_first(&mut fetched);
                let count = fetched.len();
                self.coordinator.view().update(|state| {
                    state.reports = remark::merge_refresh(&state.reports, fetched);
                    state.reports_error = None;
                });
                debug!(user = %self.user_id, count, "reports loaded");
                Ok(count)
            }
            Err(source) => {
                warn!(user = %self.user_id, error = %source, "report fetch failed");
                self.coordinator
                    .view()
                    .update(|state| state.reports_error = Some(FETCH_FAILURE.to_string()));
                Err(TallyError::Fetch {
                    message: FETCH_FAILURE.to_string(),
                    source,
                })
            }
        }
    }

    /// Replace the composer's text.
    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.coordinator.view().update(|state| {
            state.composer.content = content;
            state.composer.inline_error = None;
        });
    }

    /// Load an existing report into the composer for editing.
    ///
    /// # Errors
    ///
    /// [`TallyError::NotFound`] when the report is not in the view.
    pub fn begin_edit(&self, id: &EntityId) -> Result<(), TallyError> {
        self.coordinator.view().update(|state| {
            let content = state
                .report(id)
                .map(|report| report.content.clone())
                .ok_or_else(|| TallyError::not_found(EntityKind::Report, id))?;
            state.composer = Composer {
                content,
                editing: Some(id.clone()),
                inline_error: None,
            };
            Ok::<_, TallyError>(())
        })?;
        self.coordinator.notify(NotifyKind::Info, "Editing report.");
        Ok(())
    }

    pub fn cancel_edit(&self) {
        self.coordinator.view().update(|state| state.composer.reset());
    }

    /// Create a report from the composer, or save the edit in progress.
    ///
    /// Creation waits for the store (the id is server-assigned), then clears
    /// the composer and reloads the list. Edits change `content` optimistically
    /// and send only that field.
    ///
    /// # Errors
    ///
    /// [`TallyError::Validation`] for blank content (no remote call; an
    /// inline error is set), [`TallyError::Remote`] when the store refuses.
    pub async fn submit(&self) -> Result<Submitted, TallyError> {
        let composer = self.coordinator.view().update(|state| {
            state.composer.inline_error = None;
            state.composer.clone()
        });

        if composer.content.trim().is_empty() {
            self.coordinator
                .view()
                .update(|state| state.composer.inline_error = Some(EMPTY_CONTENT.to_string()));
            return Err(TallyError::Validation(EMPTY_CONTENT.to_string()));
        }

        match composer.editing {
            Some(id) => self.save_edit(&id, composer.content).await,
            None => self.create(composer.content).await,
        }
    }

    async fn create(&self, content: String) -> Result<Submitted, TallyError> {
        let request = NewReport::new(self.user_id.clone(), content, Utc::now());
        let notices = Notices::new("Report submitted successfully.", "Error submitting report.");
        let created = self
            .coordinator
            .mutate_confirmed(
                "create_report",
                &self.user_id,
                &notices,
                || self.store.create_report(&request),
                |state, _| state.composer.reset(),
            )
            .await?;

        if self.fetch().await.is_err() {
            debug!(report = %created.id, "created report not reloaded; list shows inline error");
        }
        Ok(Submitted::Created(created))
    }

    async fn save_edit(&self, id: &EntityId, content: String) -> Result<Submitted, TallyError> {
        let patch = ReportPatch {
            content: Some(content.clone()),
            ..ReportPatch::default()
        };
        let notices = Notices::new("Report updated successfully.", "Error updating report.");
        self.coordinator
            .mutate(
                "edit_report",
                id.as_str(),
                &notices,
                |state| {
                    let report = state.report_mut(id)?;
                    let prior_content = std::mem::replace(&mut report.content, content);
                    let prior_composer = std::mem::take(&mut state.composer);
                    Ok((prior_content, prior_composer))
                },
                || self.store.update_report(id, &patch),
                |state, (prior_content, prior_composer)| {
                    if let Ok(report) = state.report_mut(id) {
                        report.content = prior_content;
                    }
                    if state.composer == Composer::default() {
                        state.composer = prior_composer;
                    }
                },
            )
            .await?;
        Ok(Submitted::Updated(id.clone()))
    }

    /// Move a report to `status` optimistically.
    ///
    /// # Errors
    ///
    /// [`TallyError::NotFound`], [`TallyError::InvalidTransition`], or
    /// [`TallyError::Remote`] after rollback.
    pub async fn change_status(
        &self,
        id: &EntityId,
        status: ReportStatus,
    ) -> Result<Option<Report>, TallyError> {
        let patch = ReportPatch {
            status: Some(status),
            ..ReportPatch::default()
        };
        let notices = Notices::new(
            format!("Status updated to {status}."),
            "Error updating status.",
        );
        self.coordinator
            .mutate(
                "change_status",
                id.as_str(),
                &notices,
                |state| {
                    let report = state.report_mut(id)?;
                    report.status.get().can_transition_to(status)?;
                    let prior = report.status.clone();
                    report.status.set(status);
                    Ok(prior)
                },
                || self.store.update_report(id, &patch),
                |state, prior: WorkflowField<ReportStatus>| {
                    if let Ok(report) = state.report_mut(id) {
                        report.status = prior;
                    }
                },
            )
            .await
    }

    /// Remove a report once the store confirms. An edit targeting it is
    /// abandoned.
    ///
    /// # Errors
    ///
    /// [`TallyError::NotFound`] when the report is not in the view,
    /// [`TallyError::Remote`] when the store refuses (the list is unchanged).
    pub async fn delete(&self, id: &EntityId) -> Result<(), TallyError> {
        if self.coordinator.view().read(|state| state.report(id).is_none()) {
            return Err(TallyError::not_found(EntityKind::Report, id));
        }
        let notices = Notices::new("Report deleted successfully.", "Error deleting report.");
        self.coordinator
            .mutate_confirmed(
                "delete_report",
                id.as_str(),
                &notices,
                || self.store.delete_report(id),
                |state, _| {
                    state.reports.retain(|report| &report.id != id);
                    if state.composer.editing.as_ref() == Some(id) {
                        state.composer.reset();
                    }
                },
            )
            .await
    }

    pub fn set_filters(&self, predicates: Predicates<ReportStatus>) {
        self.coordinator
            .view()
            .update(|state| state.report_filters = predicates);
    }

    pub fn clear_filters(&self) {
        self.coordinator.view().update(|state| state.report_filters.clear());
    }

    /// Reports passing the current filters, newest first.
    #[must_use]
    pub fn visible(&self) -> Vec<Report> {
        self.coordinator.view().read(crate::view::ViewState::visible_reports)
    }
}
