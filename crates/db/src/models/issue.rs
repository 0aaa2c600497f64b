use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "issue_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    New,
    InProgress,
    Resolved,
    Closed,
}

impl IssueStatus {
    /// Terminal issues can never become overdue, whatever their due date.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueStatus::Resolved | IssueStatus::Closed)
    }
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "issue_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Issue {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateIssue {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Issue {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            r#"SELECT id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at
               FROM issues
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateIssue,
        issue_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.unwrap_or_default();
        let priority = data.priority.unwrap_or_default();
        sqlx::query_as::<_, Issue>(
            r#"INSERT INTO issues (id, project_id, title, description, status, priority, assignee_id, due_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at"#,
        )
        .bind(issue_id)
        .bind(data.project_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(status)
        .bind(priority)
        .bind(data.assignee_id)
        .bind(data.due_date)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        title: String,
        description: Option<String>,
        status: IssueStatus,
        priority: IssuePriority,
        assignee_id: Option<Uuid>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            r#"UPDATE issues
               SET title = $2, description = $3, status = $4, priority = $5, assignee_id = $6, due_date = $7, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(priority)
        .bind(assignee_id)
        .bind(due_date)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM issues WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Non-terminal issues whose due date has passed.
    pub async fn find_overdue(
        pool: &SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            r#"SELECT id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at
               FROM issues
               WHERE due_date IS NOT NULL
                 AND datetime(due_date) < datetime($1)
                 AND status NOT IN ('resolved', 'closed')
               ORDER BY due_date ASC"#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Non-terminal issues due inside the window `[from, to]`.
    pub async fn find_due_between(
        pool: &SqlitePool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            r#"SELECT id, project_id, title, description, status, priority, assignee_id, due_date, created_at, updated_at
               FROM issues
               WHERE due_date IS NOT NULL
                 AND datetime(due_date) >= datetime($1)
                 AND datetime(due_date) <= datetime($2)
                 AND status NOT IN ('resolved', 'closed')
               ORDER BY due_date ASC"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }
}
