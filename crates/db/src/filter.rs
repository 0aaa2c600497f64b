//! Translation of list-endpoint query parameters into SQL predicates.
//!
//! Absent parameters contribute no constraint. The `overdue` and `upcoming`
//! flags force their own due-date window and override any independently
//! supplied range.

use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{
    issue::{Issue, IssuePriority, IssueStatus},
    task::{Task, TaskPriority, TaskStatus},
};

/// Days ahead covered by the `upcoming` flag.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

// Tasks and issues share the same trackable-item column set.
const ITEM_COLUMNS: &str =
    "id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at";

const TASK_TERMINAL: &str = "('completed', 'cancelled')";
const ISSUE_TERMINAL: &str = "('resolved', 'closed')";

/// Visibility scope layered under every list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectScope {
    /// Admins see every project.
    All,
    /// Members see only projects they belong to. An empty membership set
    /// yields an empty result, not an error.
    MemberOf(Uuid),
}

impl ProjectScope {
    fn apply(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let ProjectScope::MemberOf(user_id) = self {
            qb.push(" AND project_id IN (SELECT project_id FROM project_members WHERE user_id = ");
            qb.push_bind(*user_id);
            qb.push(")");
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub search: Option<String>,
    pub due_after: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub upcoming: bool,
}

impl TaskFilter {
    pub async fn fetch(
        &self,
        pool: &SqlitePool,
        scope: &ProjectScope,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let mut qb = QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM tasks WHERE 1 = 1"));

        if let Some(status) = self.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(priority) = self.priority {
            qb.push(" AND priority = ");
            qb.push_bind(priority);
        }
        push_common(
            &mut qb,
            TASK_TERMINAL,
            self.assignee_id,
            self.project_id,
            self.search.as_deref(),
            self.due_after,
            self.due_before,
            self.overdue,
            self.upcoming,
            now,
        );
        scope.apply(&mut qb);
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<Task>().fetch_all(pool).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub search: Option<String>,
    pub due_after: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub upcoming: bool,
}

impl IssueFilter {
    pub async fn fetch(
        &self,
        pool: &SqlitePool,
        scope: &ProjectScope,
        now: DateTime<Utc>,
    ) -> Result<Vec<Issue>, sqlx::Error> {
        let mut qb = QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM issues WHERE 1 = 1"));

        if let Some(status) = self.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(priority) = self.priority {
            qb.push(" AND priority = ");
            qb.push_bind(priority);
        }
        push_common(
            &mut qb,
            ISSUE_TERMINAL,
            self.assignee_id,
            self.project_id,
            self.search.as_deref(),
            self.due_after,
            self.due_before,
            self.overdue,
            self.upcoming,
            now,
        );
        scope.apply(&mut qb);
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<Issue>().fetch_all(pool).await
    }
}

#[allow(clippy::too_many_arguments)]
fn push_common(
    qb: &mut QueryBuilder<'_, Sqlite>,
    terminal: &str,
    assignee_id: Option<Uuid>,
    project_id: Option<Uuid>,
    search: Option<&str>,
    due_after: Option<DateTime<Utc>>,
    due_before: Option<DateTime<Utc>>,
    overdue: bool,
    upcoming: bool,
    now: DateTime<Utc>,
) {
    if let Some(assignee_id) = assignee_id {
        qb.push(" AND assignee_id = ");
        qb.push_bind(assignee_id);
    }
    if let Some(project_id) = project_id {
        qb.push(" AND project_id = ");
        qb.push_bind(project_id);
    }
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        // Fans out across the item's own text, the assignee's name and the
        // owning project's name/code.
        let needle = format!("%{}%", search.to_lowercase());
        qb.push(" AND (lower(title) LIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR lower(coalesce(description, '')) LIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR EXISTS (SELECT 1 FROM users u WHERE u.id = assignee_id AND lower(u.name) LIKE ");
        qb.push_bind(needle.clone());
        qb.push(") OR EXISTS (SELECT 1 FROM projects p WHERE p.id = project_id AND (lower(p.name) LIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR lower(p.code) LIKE ");
        qb.push_bind(needle);
        qb.push(")))");
    }

    if overdue {
        qb.push(" AND due_date IS NOT NULL AND datetime(due_date) < datetime(");
        qb.push_bind(now);
        qb.push(format!(") AND status NOT IN {terminal}"));
    } else if upcoming {
        qb.push(" AND due_date IS NOT NULL AND datetime(due_date) >= datetime(");
        qb.push_bind(now);
        qb.push(") AND datetime(due_date) <= datetime(");
        qb.push_bind(now + Duration::days(UPCOMING_WINDOW_DAYS));
        qb.push(format!(") AND status NOT IN {terminal}"));
    } else {
        if let Some(after) = due_after {
            qb.push(" AND due_date IS NOT NULL AND datetime(due_date) >= datetime(");
            qb.push_bind(after);
            qb.push(")");
        }
        if let Some(before) = due_before {
            qb.push(" AND due_date IS NOT NULL AND datetime(due_date) <= datetime(");
            qb.push_bind(before);
            qb.push(")");
        }
    }
}
