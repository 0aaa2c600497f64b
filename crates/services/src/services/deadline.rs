//! Due-date classification and presentation ordering for tasks and issues.
//!
//! Every consumer (list endpoints, the deadline watch sweeps, clients
//! reading the annotated payloads) goes through this module instead of
//! re-deriving the date arithmetic locally. `now` is always injected so the
//! results are deterministic under test.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use db::models::{
    issue::{Issue, IssuePriority, IssueStatus},
    task::{Task, TaskPriority, TaskStatus},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Days before a due date within which a non-overdue item is flagged for
/// attention.
pub const DEFAULT_WARNING_HORIZON_DAYS: i64 = 3;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    #[default]
    Normal,
    Medium,
    High,
    Urgent,
    Critical,
}

/// Derived urgency annotation for one item at one instant. Recomputed on
/// every read, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Classification {
    pub urgency: UrgencyLevel,
    pub days_until_due: Option<i64>,
    pub days_overdue: Option<i64>,
    pub is_overdue: bool,
    pub is_warning: bool,
}

impl Classification {
    fn normal() -> Self {
        Self {
            urgency: UrgencyLevel::Normal,
            days_until_due: None,
            days_overdue: None,
            is_overdue: false,
            is_warning: false,
        }
    }
}

/// Relative rank of the `Urgent` task priority, which issues do not have.
/// The original ordering table omitted it entirely, which dropped urgent
/// tasks to the bottom of the list; both deliberate readings are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrgentRank {
    /// `Urgent` outranks `High`.
    #[default]
    AboveHigh,
    /// `Urgent` ties with `High`.
    WithHigh,
}

/// An item with a deadline and a workflow state.
pub trait Trackable {
    fn due_date(&self) -> Option<DateTime<Utc>>;
    fn is_terminal(&self) -> bool;
    /// Lower rank sorts first.
    fn priority_rank(&self, urgent: UrgentRank) -> i8;
    /// Position in the workflow sequence; lower sorts first.
    fn workflow_rank(&self) -> u8;
}

impl Trackable for Task {
    fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn priority_rank(&self, urgent: UrgentRank) -> i8 {
        match self.priority {
            TaskPriority::Urgent => match urgent {
                UrgentRank::AboveHigh => -1,
                UrgentRank::WithHigh => 0,
            },
            TaskPriority::High => 0,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 2,
        }
    }

    fn workflow_rank(&self) -> u8 {
        match self.status {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Cancelled => 3,
        }
    }
}

impl Trackable for Issue {
    fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn priority_rank(&self, _urgent: UrgentRank) -> i8 {
        match self.priority {
            IssuePriority::High => 0,
            IssuePriority::Medium => 1,
            IssuePriority::Low => 2,
        }
    }

    fn workflow_rank(&self) -> u8 {
        match self.status {
            IssueStatus::New => 0,
            IssueStatus::InProgress => 1,
            IssueStatus::Resolved => 2,
            IssueStatus::Closed => 3,
        }
    }
}

/// Classify `item` against `now`.
///
/// Terminal items and items without a due date are always `Normal`. The
/// overdue boundary is strict (`due < now`); an item due exactly now is a
/// warning, not overdue. Fractional days round up toward the boundary, so
/// "due in one hour" reports one day remaining.
pub fn classify(item: &impl Trackable, now: DateTime<Utc>, warning_horizon_days: i64) -> Classification {
    let due = match item.due_date() {
        Some(due) if !item.is_terminal() => due,
        _ => return Classification::normal(),
    };

    if due < now {
        return Classification {
            urgency: UrgencyLevel::Critical,
            days_until_due: None,
            days_overdue: Some(ceil_days(now - due)),
            is_overdue: true,
            is_warning: false,
        };
    }

    let days_until_due = ceil_days(due - now);
    if days_until_due <= warning_horizon_days {
        let urgency = match days_until_due {
            0 => UrgencyLevel::Urgent,
            1 => UrgencyLevel::High,
            _ => UrgencyLevel::Medium,
        };
        Classification {
            urgency,
            days_until_due: Some(days_until_due),
            days_overdue: None,
            is_overdue: false,
            is_warning: true,
        }
    } else {
        Classification {
            urgency: UrgencyLevel::Normal,
            days_until_due: Some(days_until_due),
            days_overdue: None,
            is_overdue: false,
            is_warning: false,
        }
    }
}

pub fn is_overdue(item: &impl Trackable, now: DateTime<Utc>) -> bool {
    match item.due_date() {
        Some(due) => !item.is_terminal() && due < now,
        None => false,
    }
}

/// Presentation order: overdue first, then priority (high to low), then
/// workflow position. Ties keep their incoming order under a stable sort.
pub fn display_order<T: Trackable>(
    a: &T,
    b: &T,
    now: DateTime<Utc>,
    urgent: UrgentRank,
) -> Ordering {
    let a_overdue = is_overdue(a, now);
    let b_overdue = is_overdue(b, now);
    b_overdue
        .cmp(&a_overdue)
        .then(a.priority_rank(urgent).cmp(&b.priority_rank(urgent)))
        .then(a.workflow_rank().cmp(&b.workflow_rank()))
}

pub fn sort_for_display<T: Trackable>(items: &mut [T], now: DateTime<Utc>, urgent: UrgentRank) {
    items.sort_by(|a, b| display_order(a, b, now, urgent));
}

fn ceil_days(span: Duration) -> i64 {
    span.num_milliseconds().max(0).div_ceil(MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn task(status: TaskStatus, priority: TaskPriority, due: Option<DateTime<Utc>>) -> Task {
        let now = fixed_now();
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "fixture".to_string(),
            description: None,
            status,
            priority,
            assignee_id: None,
            due_date: due,
            created_at: now,
            updated_at: now,
        }
    }

    fn issue(status: IssueStatus, priority: IssuePriority, due: Option<DateTime<Utc>>) -> Issue {
        let now = fixed_now();
        Issue {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "fixture".to_string(),
            description: None,
            status,
            priority,
            assignee_id: None,
            due_date: due,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn terminal_items_are_never_overdue_or_warning() {
        let now = fixed_now();
        for status in [TaskStatus::Completed, TaskStatus::Cancelled] {
            let t = task(status, TaskPriority::High, Some(now - Duration::days(400)));
            let c = classify(&t, now, DEFAULT_WARNING_HORIZON_DAYS);
            assert!(!c.is_overdue);
            assert!(!c.is_warning);
            assert_eq!(c.urgency, UrgencyLevel::Normal);
            assert_eq!(c.days_until_due, None);
        }
        let i = issue(
            IssueStatus::Resolved,
            IssuePriority::High,
            Some(now - Duration::days(1)),
        );
        assert_eq!(
            classify(&i, now, DEFAULT_WARNING_HORIZON_DAYS).urgency,
            UrgencyLevel::Normal
        );
    }

    #[test]
    fn items_without_deadline_are_normal_in_any_status() {
        let now = fixed_now();
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed] {
            let c = classify(&task(status, TaskPriority::Low, None), now, 3);
            assert!(!c.is_overdue);
            assert!(!c.is_warning);
            assert_eq!(c.days_until_due, None);
            assert_eq!(c.urgency, UrgencyLevel::Normal);
        }
    }

    #[test]
    fn overdue_and_warning_are_mutually_exclusive() {
        let now = fixed_now();
        let offsets = [
            -Duration::days(10),
            -Duration::hours(1),
            Duration::zero(),
            Duration::hours(1),
            Duration::days(2),
            Duration::days(5),
        ];
        for offset in offsets {
            let c = classify(
                &task(TaskStatus::Todo, TaskPriority::Medium, Some(now + offset)),
                now,
                DEFAULT_WARNING_HORIZON_DAYS,
            );
            assert!(!(c.is_overdue && c.is_warning), "offset {offset:?}");
        }
    }

    #[test]
    fn due_exactly_now_is_warning_not_overdue() {
        let now = fixed_now();
        let c = classify(
            &task(TaskStatus::Todo, TaskPriority::Medium, Some(now)),
            now,
            DEFAULT_WARNING_HORIZON_DAYS,
        );
        assert!(c.is_warning);
        assert!(!c.is_overdue);
        assert_eq!(c.days_until_due, Some(0));

        let c = classify(
            &task(
                TaskStatus::Todo,
                TaskPriority::Medium,
                Some(now - Duration::microseconds(1)),
            ),
            now,
            DEFAULT_WARNING_HORIZON_DAYS,
        );
        assert!(c.is_overdue);
    }

    #[test]
    fn classification_matches_observed_windows() {
        let now = fixed_now();
        let horizon = DEFAULT_WARNING_HORIZON_DAYS;

        let c = classify(
            &task(
                TaskStatus::InProgress,
                TaskPriority::Medium,
                Some(now - Duration::days(2)),
            ),
            now,
            horizon,
        );
        assert!(c.is_overdue);
        assert_eq!(c.days_overdue, Some(2));
        assert_eq!(c.urgency, UrgencyLevel::Critical);

        let c = classify(
            &issue(IssueStatus::New, IssuePriority::Medium, Some(now + Duration::days(1))),
            now,
            horizon,
        );
        assert!(c.is_warning);
        assert_eq!(c.days_until_due, Some(1));
        assert_eq!(c.urgency, UrgencyLevel::High);

        let c = classify(
            &issue(IssueStatus::New, IssuePriority::Medium, Some(now + Duration::days(3))),
            now,
            horizon,
        );
        assert!(c.is_warning);
        assert_eq!(c.days_until_due, Some(3));
        assert_eq!(c.urgency, UrgencyLevel::Medium);

        let c = classify(
            &issue(IssueStatus::New, IssuePriority::Medium, Some(now + Duration::days(4))),
            now,
            horizon,
        );
        assert!(!c.is_warning);
        assert_eq!(c.urgency, UrgencyLevel::Normal);
    }

    #[test]
    fn fractional_days_round_up() {
        let now = fixed_now();
        let c = classify(
            &task(TaskStatus::Todo, TaskPriority::Medium, Some(now + Duration::hours(1))),
            now,
            DEFAULT_WARNING_HORIZON_DAYS,
        );
        assert_eq!(c.days_until_due, Some(1));

        let c = classify(
            &task(
                TaskStatus::Todo,
                TaskPriority::Medium,
                Some(now + Duration::hours(25)),
            ),
            now,
            DEFAULT_WARNING_HORIZON_DAYS,
        );
        assert_eq!(c.days_until_due, Some(2));
    }

    #[test]
    fn classify_is_pure() {
        let now = fixed_now();
        let t = task(
            TaskStatus::InProgress,
            TaskPriority::High,
            Some(now + Duration::days(2)),
        );
        assert_eq!(classify(&t, now, 3), classify(&t, now, 3));
    }

    #[test]
    fn overdue_sorts_before_priority() {
        let now = fixed_now();
        let mut items = vec![
            issue(IssueStatus::New, IssuePriority::Low, None),
            issue(
                IssueStatus::New,
                IssuePriority::High,
                Some(now - Duration::days(1)),
            ),
            issue(IssueStatus::New, IssuePriority::High, None),
        ];
        sort_for_display(&mut items, now, UrgentRank::AboveHigh);
        assert!(is_overdue(&items[0], now));
        assert_eq!(items[0].priority, IssuePriority::High);
        assert_eq!(items[1].priority, IssuePriority::High);
        assert!(!is_overdue(&items[1], now));
        assert_eq!(items[2].priority, IssuePriority::Low);
    }

    #[test]
    fn equal_priority_falls_back_to_workflow_order() {
        let now = fixed_now();
        let mut items = vec![
            issue(IssueStatus::Closed, IssuePriority::Medium, None),
            issue(IssueStatus::Resolved, IssuePriority::Medium, None),
            issue(IssueStatus::InProgress, IssuePriority::Medium, None),
            issue(IssueStatus::New, IssuePriority::Medium, None),
        ];
        sort_for_display(&mut items, now, UrgentRank::AboveHigh);
        let statuses: Vec<_> = items.iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            vec![
                IssueStatus::New,
                IssueStatus::InProgress,
                IssueStatus::Resolved,
                IssueStatus::Closed,
            ]
        );
    }

    #[test]
    fn urgent_rank_is_configurable() {
        let now = fixed_now();
        let urgent = task(TaskStatus::Todo, TaskPriority::Urgent, None);
        let high = task(TaskStatus::Todo, TaskPriority::High, None);

        assert_eq!(
            display_order(&urgent, &high, now, UrgentRank::AboveHigh),
            Ordering::Less
        );
        // The other reading ties on priority, then ties on workflow order.
        assert_eq!(
            display_order(&urgent, &high, now, UrgentRank::WithHigh),
            Ordering::Equal
        );
    }

    #[test]
    fn stable_sort_preserves_order_on_full_ties() {
        let now = fixed_now();
        let a = task(TaskStatus::Todo, TaskPriority::Medium, None);
        let b = task(TaskStatus::Todo, TaskPriority::Medium, None);
        let (id_a, id_b) = (a.id, b.id);
        let mut items = vec![a, b];
        sort_for_display(&mut items, now, UrgentRank::AboveHigh);
        assert_eq!(items[0].id, id_a);
        assert_eq!(items[1].id, id_b);
    }
}
