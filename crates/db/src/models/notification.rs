use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskDueSoon,
    TaskOverdue,
    IssueAssigned,
    IssueDueSoon,
    IssueOverdue,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "notification_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// In-app notification row. `data` carries an optional JSON payload the
/// frontend uses for deep links; it is stored verbatim.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub data: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub data: Option<String>,
}

impl Notification {
    pub fn parsed_data(&self) -> Option<serde_json::Value> {
        self.data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateNotification,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications (id, user_id, notification_type, title, message, priority, related_id, related_type, data)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, user_id, notification_type, title, message, priority, related_id, related_type, data, read, created_at"#,
        )
        .bind(id)
        .bind(data.user_id)
        .bind(data.notification_type)
        .bind(&data.title)
        .bind(&data.message)
        .bind(data.priority)
        .bind(data.related_id)
        .bind(&data.related_type)
        .bind(&data.data)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = if unread_only {
            r#"SELECT id, user_id, notification_type, title, message, priority, related_id, related_type, data, read, created_at
               FROM notifications
               WHERE user_id = $1 AND read = 0
               ORDER BY created_at DESC
               LIMIT $2"#
        } else {
            r#"SELECT id, user_id, notification_type, title, message, priority, related_id, related_type, data, read, created_at
               FROM notifications
               WHERE user_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#
        };
        sqlx::query_as::<_, Notification>(sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark one of the user's notifications read. Returns rows affected so
    /// callers can distinguish "not yours" from "done".
    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1 WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_unread(pool: &SqlitePool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = 0",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
