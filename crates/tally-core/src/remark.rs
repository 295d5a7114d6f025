//! Administrator remarks on reports.
//!
//! A remark has two halves: the committed `remark` and a client-only
//! `draft_remark`. Drafts change locally through
//! [`RemarkChannel::update_draft`] and reach the store only through
//! [`RemarkChannel::submit_remark`]. A background refresh merges by field and
//! keeps any non-empty draft (see [`merge_refresh`]).

use std::sync::Arc;

use crate::error::TallyError;
use crate::model::{EntityId, Report};
use crate::remote::{RemoteStore, ReportPatch};
use crate::sync::{Notices, OptimisticMutationCoordinator};
use crate::workflow::EntityKind;

pub const REMARK_SUCCESS: &str = "Remark updated successfully.";
pub const REMARK_FAILURE: &str = "Error updating remark.";

struct PriorRemark {
    remark: String,
    draft: String,
}

#[derive(Clone)]
pub struct RemarkChannel {
    coordinator: OptimisticMutationCoordinator,
    store: Arc<dyn RemoteStore>,
}

impl RemarkChannel {
    #[must_use]
    pub fn new(coordinator: OptimisticMutationCoordinator, store: Arc<dyn RemoteStore>) -> Self {
        Self { coordinator, store }
    }

    /// Replace the unsent draft for `id`. Never touches the store.
    ///
    /// # Errors
    ///
    /// [`TallyError::NotFound`] when the report is not in the view.
    pub fn update_draft(&self, id: &EntityId, value: impl Into<String>) -> Result<(), TallyError> {
        let value = value.into();
        self.coordinator.view().update(|state| {
            state.report_mut(id)?.draft_remark = value;
            Ok(())
        })
    }

    /// Commit `value` as the remark for `id`.
    ///
    /// Locally the remark is set and the draft cleared before the store
    /// answers. On failure the remark is restored, and the submitted text
    /// goes back into the draft unless an earlier draft was already waiting.
    ///
    /// # Errors
    ///
    /// [`TallyError::NotFound`] when the report is not in the view,
    /// [`TallyError::Remote`] when the store refuses.
    pub async fn submit_remark(
        &self,
        id: &EntityId,
        value: impl Into<String>,
    ) -> Result<Option<Report>, TallyError> {
        let value = value.into();
        let patch = ReportPatch {
            remark: Some(value.clone()),
            ..ReportPatch::default()
        };
        let notices = Notices::new(REMARK_SUCCESS, REMARK_FAILURE);

        self.coordinator
            .mutate(
                "submit_remark",
                id.as_str(),
                &notices,
                |state| {
                    let report = state.report_mut(id)?;
                    Ok(PriorRemark {
                        remark: std::mem::replace(&mut report.remark, value.clone()),
                        draft: std::mem::take(&mut report.draft_remark),
                    })
                },
                || self.store.update_report(id, &patch),
                |state, prior| {
                    if let Ok(report) = state.report_mut(id) {
                        report.remark = prior.remark;
                        if report.draft_remark.is_empty() {
                            report.draft_remark = if prior.draft.is_empty() {
                                value.clone()
                            } else {
                                prior.draft
                            };
                        }
                    }
                },
            )
            .await
    }

    /// Submit whatever is currently in the draft for `id`.
    ///
    /// # Errors
    ///
    /// As [`RemarkChannel::submit_remark`].
    pub async fn submit_draft(&self, id: &EntityId) -> Result<Option<Report>, TallyError> {
        let draft = self.coordinator.view().read(|state| {
            state
                .report(id)
                .map(|report| report.draft_remark.clone())
                .ok_or_else(|| TallyError::not_found(EntityKind::Report, id))
        })?;
        self.submit_remark(id, draft).await
    }
}

/// Replace `current` with `fetched`, carrying over non-empty drafts.
///
/// Every other field comes from `fetched`; drafts for reports that are no
/// longer present are dropped.
#[must_use]
pub fn merge_refresh(current: &[Report], fetched: Vec<Report>) -> Vec<Report> {
    fetched
        .into_iter()
        .map(|mut report| {
            if let Some(local) = current
                .iter()
                .find(|local| local.id == report.id && !local.draft_remark.is_empty())
            {
                report.draft_remark.clone_from(&local.draft_remark);
            }
            report
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use crate::remote::memory::{MemoryStore, StoreOp};
    use crate::remote::RemoteError;
    use crate::view::{SharedView, ViewState};

    fn setup() -> (RemarkChannel, Arc<MemoryStore>, SharedView) {
        let reports = vec![Report::new("1", "u1", "standup")];
        let store = Arc::new(MemoryStore::with_reports(reports.clone()));
        let view = SharedView::new(ViewState {
            reports,
            ..ViewState::default()
        });
        let coordinator =
            OptimisticMutationCoordinator::new(view.clone(), Arc::new(MemoryNotifier::new()));
        (RemarkChannel::new(coordinator, store.clone()), store, view)
    }

    #[tokio::test]
    async fn draft_edits_stay_local() {
        let (channel, store, view) = setup();
        channel.update_draft(&EntityId::from("1"), "halfway").unwrap();
        assert_eq!(view.snapshot().reports[0].draft_remark, "halfway");
        assert!(store.calls().await.is_empty());
    }

    #[tokio::test]
    async fn submit_sets_remark_and_clears_draft() {
        let (channel, store, view) = setup();
        let id = EntityId::from("1");
        channel.update_draft(&id, "looks good").unwrap();
        channel.submit_draft(&id).await.unwrap();

        let report = view.snapshot().reports[0].clone();
        assert_eq!(report.remark, "looks good");
        assert!(report.draft_remark.is_empty());
        assert_eq!(store.reports.lock().await[0].remark, "looks good");
    }

    #[tokio::test]
    async fn failed_submit_returns_text_to_draft() {
        let (channel, store, view) = setup();
        store
            .fail_next(StoreOp::UpdateReport, RemoteError::Transport("offline".into()))
            .await;
        let id = EntityId::from("1");
        channel.submit_remark(&id, "looks good").await.unwrap_err();

        let report = view.snapshot().reports[0].clone();
        assert_eq!(report.remark, "");
        assert_eq!(report.draft_remark, "looks good");
    }

    #[test]
    fn refresh_keeps_non_empty_drafts_only() {
        let mut a = Report::new("a", "u1", "old a");
        a.draft_remark = "typing".to_string();
        let b = Report::new("b", "u1", "old b");
        let current = vec![a, b];

        let fetched = vec![
            Report::new("a", "u1", "new a").with_remark("from admin"),
            Report::new("b", "u1", "new b"),
            Report::new("c", "u1", "new c"),
        ];
        let merged = merge_refresh(&current, fetched);

        assert_eq!(merged[0].content, "new a");
        assert_eq!(merged[0].remark, "from admin");
        assert_eq!(merged[0].draft_remark, "typing");
        assert!(merged[1].draft_remark.is_empty());
        assert_eq!(merged.len(), 3);
    }
}
