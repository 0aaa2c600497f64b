//! Background sweeps that warn assignees about overdue and upcoming work.
//!
//! The overdue and upcoming sweeps run on independent intervals. Each tick
//! re-queries the store, classifies what it finds and asks the notification
//! service for delivery. One item failing never stops the rest of the sweep;
//! a store failure ends the tick and the next tick retries.

use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use db::{
    DBService,
    models::{
        issue::Issue,
        notification::{CreateNotification, NotificationPriority, NotificationType},
        project::Project,
        task::Task,
    },
};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    deadline::{DEFAULT_WARNING_HORIZON_DAYS, classify},
    notification::NotificationService,
};

/// Lookahead for the task half of the upcoming sweep.
pub const TASK_UPCOMING_WINDOW_HOURS: i64 = 24;
/// Lookahead for the issue half of the upcoming sweep.
pub const ISSUE_UPCOMING_WINDOW_DAYS: i64 = 3;

const HIGH_PRIORITY_CUTOFF_HOURS: i64 = 6;

#[derive(Debug, Error)]
pub enum DeadlineWatchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Counters for one sweep tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub examined: usize,
    pub notified: usize,
    pub skipped: usize,
}

/// Background service running both deadline sweeps.
pub struct DeadlineWatchService {
    db: DBService,
    notifications: NotificationService,
    overdue_interval: Duration,
    upcoming_interval: Duration,
}

impl DeadlineWatchService {
    pub async fn spawn(
        db: DBService,
        notifications: NotificationService,
        overdue_interval: Duration,
        upcoming_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Self {
            db,
            notifications,
            overdue_interval,
            upcoming_interval,
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting deadline watch with overdue interval {:?}, upcoming interval {:?}",
            self.overdue_interval, self.upcoming_interval
        );

        let mut overdue = interval(self.overdue_interval);
        let mut upcoming = interval(self.upcoming_interval);

        loop {
            tokio::select! {
                _ = overdue.tick() => {
                    match run_overdue_sweep(&self.db.pool, &self.notifications, Utc::now()).await {
                        Ok(stats) => debug!(?stats, "overdue sweep complete"),
                        Err(e) => error!("overdue sweep failed: {}", e),
                    }
                }
                _ = upcoming.tick() => {
                    match run_upcoming_sweep(&self.db.pool, &self.notifications, Utc::now()).await {
                        Ok(stats) => debug!(?stats, "upcoming sweep complete"),
                        Err(e) => error!("upcoming sweep failed: {}", e),
                    }
                }
            }
        }
    }
}

/// Notify assignees of every non-terminal item whose due date has passed.
pub async fn run_overdue_sweep(
    pool: &SqlitePool,
    notifications: &NotificationService,
    now: DateTime<Utc>,
) -> Result<SweepStats, DeadlineWatchError> {
    let mut stats = SweepStats::default();

    for task in Task::find_overdue(pool, now).await? {
        stats.examined += 1;
        let Some(assignee_id) = task.assignee_id else {
            stats.skipped += 1;
            continue;
        };
        let classification = classify(&task, now, DEFAULT_WARNING_HORIZON_DAYS);
        let days_overdue = classification.days_overdue.unwrap_or(0);
        let project = project_label(pool, task.project_id).await;
        let data = CreateNotification {
            user_id: assignee_id,
            notification_type: NotificationType::TaskOverdue,
            title: format!("Task overdue: {}", task.title),
            message: format!(
                "Task '{}' in project {} is {} day(s) overdue (priority {}).",
                task.title, project, days_overdue, task.priority
            ),
            priority: NotificationPriority::Critical,
            related_id: Some(task.id),
            related_type: Some("task".to_string()),
            data: item_data(task.due_date, Some(days_overdue), None),
        };
        deliver(notifications, data, task.id, "task", &mut stats).await;
    }

    for issue in Issue::find_overdue(pool, now).await? {
        stats.examined += 1;
        let Some(assignee_id) = issue.assignee_id else {
            stats.skipped += 1;
            continue;
        };
        let classification = classify(&issue, now, DEFAULT_WARNING_HORIZON_DAYS);
        let days_overdue = classification.days_overdue.unwrap_or(0);
        let project = project_label(pool, issue.project_id).await;
        let data = CreateNotification {
            user_id: assignee_id,
            notification_type: NotificationType::IssueOverdue,
            title: format!("Issue overdue: {}", issue.title),
            message: format!(
                "Issue '{}' in project {} is {} day(s) overdue (priority {}).",
                issue.title, project, days_overdue, issue.priority
            ),
            priority: NotificationPriority::Critical,
            related_id: Some(issue.id),
            related_type: Some("issue".to_string()),
            data: item_data(issue.due_date, Some(days_overdue), None),
        };
        deliver(notifications, data, issue.id, "issue", &mut stats).await;
    }

    Ok(stats)
}

/// Notify assignees of non-terminal items approaching their due date:
/// tasks inside a 24-hour window, issues inside a 3-day window.
pub async fn run_upcoming_sweep(
    pool: &SqlitePool,
    notifications: &NotificationService,
    now: DateTime<Utc>,
) -> Result<SweepStats, DeadlineWatchError> {
    let mut stats = SweepStats::default();

    let task_window_end = now + TimeDelta::hours(TASK_UPCOMING_WINDOW_HOURS);
    for task in Task::find_due_between(pool, now, task_window_end).await? {
        stats.examined += 1;
        let (Some(assignee_id), Some(due)) = (task.assignee_id, task.due_date) else {
            stats.skipped += 1;
            continue;
        };
        let hours_left = ceil_hours(due - now);
        let project = project_label(pool, task.project_id).await;
        let data = CreateNotification {
            user_id: assignee_id,
            notification_type: NotificationType::TaskDueSoon,
            title: format!("Task due soon: {}", task.title),
            message: format!(
                "Task '{}' in project {} is due in {} hour(s) (priority {}).",
                task.title, project, hours_left, task.priority
            ),
            priority: upcoming_priority(hours_left),
            related_id: Some(task.id),
            related_type: Some("task".to_string()),
            data: item_data(task.due_date, None, Some(hours_left)),
        };
        deliver(notifications, data, task.id, "task", &mut stats).await;
    }

    let issue_window_end = now + TimeDelta::days(ISSUE_UPCOMING_WINDOW_DAYS);
    for issue in Issue::find_due_between(pool, now, issue_window_end).await? {
        stats.examined += 1;
        let (Some(assignee_id), Some(due)) = (issue.assignee_id, issue.due_date) else {
            stats.skipped += 1;
            continue;
        };
        let hours_left = ceil_hours(due - now);
        let days_left = classify(&issue, now, ISSUE_UPCOMING_WINDOW_DAYS)
            .days_until_due
            .unwrap_or(0);
        let project = project_label(pool, issue.project_id).await;
        let data = CreateNotification {
            user_id: assignee_id,
            notification_type: NotificationType::IssueDueSoon,
            title: format!("Issue due soon: {}", issue.title),
            message: format!(
                "Issue '{}' in project {} is due in {} day(s) (priority {}).",
                issue.title, project, days_left, issue.priority
            ),
            priority: upcoming_priority(hours_left),
            related_id: Some(issue.id),
            related_type: Some("issue".to_string()),
            data: item_data(issue.due_date, None, Some(hours_left)),
        };
        deliver(notifications, data, issue.id, "issue", &mut stats).await;
    }

    Ok(stats)
}

async fn deliver(
    notifications: &NotificationService,
    data: CreateNotification,
    item_id: Uuid,
    item_kind: &str,
    stats: &mut SweepStats,
) {
    match notifications.notify_user(data).await {
        Ok(_) => stats.notified += 1,
        Err(e) => {
            warn!(
                item_id = %item_id,
                item_kind = item_kind,
                error = %e,
                "deadline notification failed"
            );
            stats.skipped += 1;
        }
    }
}

fn upcoming_priority(hours_left: i64) -> NotificationPriority {
    if hours_left <= HIGH_PRIORITY_CUTOFF_HOURS {
        NotificationPriority::High
    } else {
        NotificationPriority::Medium
    }
}

async fn project_label(pool: &SqlitePool, project_id: Uuid) -> String {
    match Project::find_by_id(pool, project_id).await {
        Ok(Some(project)) => project.name,
        _ => project_id.to_string(),
    }
}

fn item_data(
    due_date: Option<DateTime<Utc>>,
    days_overdue: Option<i64>,
    hours_left: Option<i64>,
) -> Option<String> {
    let value = serde_json::json!({
        "due_date": due_date,
        "days_overdue": days_overdue,
        "hours_left": hours_left,
    });
    Some(value.to_string())
}

fn ceil_hours(span: TimeDelta) -> i64 {
    span.num_minutes().max(0).div_ceil(60)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as TimeDelta;
    use db::models::{
        issue::{CreateIssue, IssuePriority, IssueStatus},
        notification::Notification,
        project::CreateProject,
        task::{CreateTask, TaskPriority, TaskStatus},
        user::{CreateUser, User},
    };

    use super::*;
    use crate::services::notification::test_support::{FailingMailer, RecordingMailer};

    struct Fixture {
        db: DBService,
        project: Project,
        assignee: User,
    }

    async fn fixture() -> Fixture {
        let db = DBService::new_in_memory().await.unwrap();
        let project = Project::create(
            &db.pool,
            &CreateProject {
                name: "Riverside Tower".to_string(),
                code: "RT-01".to_string(),
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let assignee = User::create(
            &db.pool,
            &CreateUser {
                email: "foreman@example.com".to_string(),
                name: "Foreman".to_string(),
                role: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Fixture {
            db,
            project,
            assignee,
        }
    }

    async fn seed_task(
        f: &Fixture,
        title: &str,
        status: TaskStatus,
        due: Option<DateTime<Utc>>,
        assignee: Option<Uuid>,
    ) -> Task {
        Task::create(
            &f.db.pool,
            &CreateTask {
                project_id: f.project.id,
                title: title.to_string(),
                description: None,
                status: Some(status),
                priority: Some(TaskPriority::High),
                assignee_id: assignee,
                due_date: due,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    async fn seed_issue(
        f: &Fixture,
        title: &str,
        status: IssueStatus,
        due: Option<DateTime<Utc>>,
        assignee: Option<Uuid>,
    ) -> Issue {
        Issue::create(
            &f.db.pool,
            &CreateIssue {
                project_id: f.project.id,
                title: title.to_string(),
                description: None,
                status: Some(status),
                priority: Some(IssuePriority::High),
                assignee_id: assignee,
                due_date: due,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn overdue_sweep_notifies_assignees_and_skips_the_rest() {
        let f = fixture().await;
        let now = Utc::now();
        seed_task(
            &f,
            "pour footing",
            TaskStatus::InProgress,
            Some(now - TimeDelta::days(2)),
            Some(f.assignee.id),
        )
        .await;
        seed_task(
            &f,
            "unassigned and late",
            TaskStatus::Todo,
            Some(now - TimeDelta::days(1)),
            None,
        )
        .await;
        seed_task(
            &f,
            "late but completed",
            TaskStatus::Completed,
            Some(now - TimeDelta::days(5)),
            Some(f.assignee.id),
        )
        .await;
        seed_task(
            &f,
            "not due yet",
            TaskStatus::Todo,
            Some(now + TimeDelta::days(2)),
            Some(f.assignee.id),
        )
        .await;
        seed_issue(
            &f,
            "leaking pipe",
            IssueStatus::InProgress,
            Some(now - TimeDelta::days(3)),
            Some(f.assignee.id),
        )
        .await;

        let mailer = Arc::new(RecordingMailer::default());
        let notifications = NotificationService::new(f.db.clone(), mailer.clone());
        let stats = run_overdue_sweep(&f.db.pool, &notifications, now)
            .await
            .unwrap();

        assert_eq!(stats.examined, 3);
        assert_eq!(stats.notified, 2);
        assert_eq!(stats.skipped, 1);

        let rows = Notification::find_by_user(&f.db.pool, f.assignee.id, true, 50)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|n| n.priority == NotificationPriority::Critical));
        assert!(
            rows.iter()
                .any(|n| n.notification_type == NotificationType::TaskOverdue
                    && n.message.contains("2 day(s) overdue")
                    && n.message.contains("Riverside Tower"))
        );
        assert!(
            rows.iter()
                .any(|n| n.notification_type == NotificationType::IssueOverdue)
        );
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upcoming_sweep_windows_and_priorities() {
        let f = fixture().await;
        let now = Utc::now();
        seed_task(
            &f,
            "crane inspection",
            TaskStatus::Todo,
            Some(now + TimeDelta::hours(3)),
            Some(f.assignee.id),
        )
        .await;
        seed_task(
            &f,
            "deliver steel",
            TaskStatus::Todo,
            Some(now + TimeDelta::hours(20)),
            Some(f.assignee.id),
        )
        .await;
        seed_task(
            &f,
            "outside task window",
            TaskStatus::Todo,
            Some(now + TimeDelta::hours(30)),
            Some(f.assignee.id),
        )
        .await;
        seed_issue(
            &f,
            "permit question",
            IssueStatus::New,
            Some(now + TimeDelta::days(2)),
            Some(f.assignee.id),
        )
        .await;
        seed_issue(
            &f,
            "outside issue window",
            IssueStatus::New,
            Some(now + TimeDelta::days(5)),
            Some(f.assignee.id),
        )
        .await;

        let notifications =
            NotificationService::new(f.db.clone(), Arc::new(RecordingMailer::default()));
        let stats = run_upcoming_sweep(&f.db.pool, &notifications, now)
            .await
            .unwrap();

        assert_eq!(stats.examined, 3);
        assert_eq!(stats.notified, 3);

        let rows = Notification::find_by_user(&f.db.pool, f.assignee.id, true, 50)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);

        let soon = rows
            .iter()
            .find(|n| n.title.contains("crane inspection"))
            .unwrap();
        assert_eq!(soon.priority, NotificationPriority::High);
        assert_eq!(soon.notification_type, NotificationType::TaskDueSoon);

        let later = rows.iter().find(|n| n.title.contains("deliver steel")).unwrap();
        assert_eq!(later.priority, NotificationPriority::Medium);

        let issue_row = rows
            .iter()
            .find(|n| n.title.contains("permit question"))
            .unwrap();
        assert_eq!(issue_row.notification_type, NotificationType::IssueDueSoon);
        assert!(issue_row.message.contains("2 day(s)"));
    }

    #[tokio::test]
    async fn mail_outage_does_not_stop_the_sweep() {
        let f = fixture().await;
        let now = Utc::now();
        seed_task(
            &f,
            "first late task",
            TaskStatus::Todo,
            Some(now - TimeDelta::days(1)),
            Some(f.assignee.id),
        )
        .await;
        seed_task(
            &f,
            "second late task",
            TaskStatus::Todo,
            Some(now - TimeDelta::days(2)),
            Some(f.assignee.id),
        )
        .await;

        let notifications = NotificationService::new(f.db.clone(), Arc::new(FailingMailer));
        let stats = run_overdue_sweep(&f.db.pool, &notifications, now)
            .await
            .unwrap();

        // In-app rows are still written when the gateway is down.
        assert_eq!(stats.notified, 2);
        let rows = Notification::find_by_user(&f.db.pool, f.assignee.id, true, 50)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}
