//! Compound client-side filters over in-memory collections.
//!
//! A [`Predicates`] value is a conjunction of an optional inclusive date
//! range and an optional workflow-state match. Unset predicates are
//! vacuously true. [`apply`] is a stable filter: matching items keep their
//! input order. Trashed items never pass, whatever the predicates say.

use chrono::{DateTime, Utc};

use crate::model::{Report, Task, timestamp};
use crate::workflow::{EntityKind, ReportStatus, Stage, WorkflowState};

/// Something the filter engine can evaluate.
pub trait Filterable {
    type State: WorkflowState;

    /// Creation timestamp compared against the date bounds.
    fn timestamp(&self) -> Option<DateTime<Utc>>;

    /// Normalized workflow state.
    fn workflow_state(&self) -> Self::State;

    fn is_trashed(&self) -> bool {
        false
    }
}

impl Filterable for Task {
    type State = Stage;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn workflow_state(&self) -> Stage {
        self.stage.get()
    }

    fn is_trashed(&self) -> bool {
        self.is_trash
    }
}

impl Filterable for Report {
    type State = ReportStatus;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Self::timestamp(self)
    }

    fn workflow_state(&self) -> ReportStatus {
        self.status.get()
    }
}

/// Filter configuration for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicates<S> {
    /// Inclusive lower bound.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end_date: Option<DateTime<Utc>>,
    /// Exact match on the normalized state; `None` means all.
    pub state: Option<S>,
}

impl<S> Default for Predicates<S> {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            state: None,
        }
    }
}

impl<S: WorkflowState> Predicates<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    #[must_use]
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    #[must_use]
    pub fn in_state(mut self, state: S) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.state.is_none()
    }

    pub fn clear_dates(&mut self) {
        self.start_date = None;
        self.end_date = None;
    }

    pub fn clear_state(&mut self) {
        self.state = None;
    }

    /// Reset every predicate.
    pub fn clear(&mut self) {
        self.clear_dates();
        self.clear_state();
    }

    /// Whether `item` passes every set predicate.
    ///
    /// An item with no timestamp is not excluded by the date bounds.
    pub fn matches<T: Filterable<State = S>>(&self, item: &T) -> bool {
        if item.is_trashed() {
            return false;
        }
        if let Some(stamp) = item.timestamp() {
            if self.start_date.is_some_and(|start| stamp < start) {
                return false;
            }
            if self.end_date.is_some_and(|end| stamp > end) {
                return false;
            }
        }
        self.state
            .is_none_or(|state| item.workflow_state() == state)
    }

    /// Empty-state text for a filtered view with no rows.
    #[must_use]
    pub fn no_match_message(&self) -> &'static str {
        match S::KIND {
            EntityKind::Task => "No tasks match the current filters.",
            EntityKind::Report => "No reports match the current filters.",
        }
    }
}

/// Items passing `predicates`, in input order.
pub fn apply<'a, T: Filterable>(items: &'a [T], predicates: &Predicates<T::State>) -> Vec<&'a T> {
    items.iter().filter(|item| predicates.matches(*item)).collect()
}

/// Stable newest-first ordering; undated items go last.
pub fn newest_first<T: Filterable>(items: &mut [T]) {
    items.sort_by(|a, b| match (a.timestamp(), b.timestamp()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Parse a date bound: `YYYY-MM-DD` (midnight UTC) or RFC 3339.
///
/// # Errors
///
/// Returns a description of the accepted formats when `raw` matches neither.
pub fn parse_date_bound(raw: &str) -> Result<DateTime<Utc>, String> {
    timestamp::parse(raw)
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn tasks() -> Vec<Task> {
        vec![
            Task::new("1").with_created_at(day(1)).with_stage(Stage::Completed),
            Task::new("2").with_created_at(day(2)).with_stage(Stage::InProgress),
            Task::new("3").with_created_at(day(3)).with_stage(Stage::Completed),
        ]
    }

    fn task_ids<'a>(items: &[&'a Task]) -> Vec<&'a str> {
        items.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn unset_predicates_keep_everything_in_order() {
        let all = tasks();
        let out = apply(&all, &Predicates::new());
        assert_eq!(task_ids(&out), vec!["1", "2", "3"]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let all = tasks();
        let p = Predicates::new().since(day(2)).until(day(3));
        assert_eq!(task_ids(&apply(&all, &p)), vec!["2", "3"]);
    }

    #[test]
    fn predicates_compose_by_and() {
        let all = tasks();
        let p = Predicates::new().since(day(2)).in_state(Stage::Completed);
        assert_eq!(task_ids(&apply(&all, &p)), vec!["3"]);
    }

    #[test]
    fn trashed_tasks_never_pass() {
        let mut all = tasks();
        all[1].is_trash = true;
        assert_eq!(task_ids(&apply(&all, &Predicates::new())), vec!["1", "3"]);
    }

    #[test]
    fn undated_items_pass_date_bounds() {
        let all = vec![Task::new("x")];
        let p = Predicates::new().since(day(2)).until(day(3));
        assert_eq!(apply(&all, &p).len(), 1);
    }

    #[test]
    fn unknown_stage_filters_as_default() {
        let mut task = Task::new("odd");
        task.stage = crate::workflow::WorkflowField::from_raw("blocked");
        let all = vec![task];
        assert_eq!(apply(&all, &Predicates::new().in_state(Stage::Todo)).len(), 1);
        assert!(apply(&all, &Predicates::new().in_state(Stage::Completed)).is_empty());
    }

    #[test]
    fn clear_restores_everything() {
        let all = tasks();
        let mut p = Predicates::new().since(day(3)).in_state(Stage::InProgress);
        assert!(apply(&all, &p).is_empty());
        p.clear_dates();
        assert_eq!(task_ids(&apply(&all, &p)), vec!["2"]);
        p.clear();
        assert!(p.is_empty());
        assert_eq!(apply(&all, &p).len(), 3);
    }

    #[test]
    fn newest_first_uses_either_timestamp() {
        let mut a = Report::new("a", "u", "a");
        a.date_time = Some(day(1));
        let b = Report::new("b", "u", "b").with_created_at(day(3));
        let c = Report::new("c", "u", "c");
        let mut d = Report::new("d", "u", "d");
        d.date_time = Some(day(2));

        let mut reports = vec![a, c, b, d];
        newest_first(&mut reports);
        let order: Vec<_> = reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);
    }

    #[test]
    fn date_bound_formats() {
        assert_eq!(parse_date_bound("2024-01-02").unwrap(), day(2));
        assert_eq!(
            parse_date_bound("2024-01-02T12:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
        );
        assert!(parse_date_bound("yesterday").is_err());
    }

    #[test]
    fn empty_state_message_names_the_collection() {
        assert_eq!(
            Predicates::<ReportStatus>::new().no_match_message(),
            "No reports match the current filters."
        );
    }
}
