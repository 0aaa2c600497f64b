//! Task endpoints: filtered listing with deadline annotation, plus CRUD.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{DateTime, Utc};
use db::{
    filter::TaskFilter,
    models::{
        notification::{CreateNotification, NotificationPriority, NotificationType},
        task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
    },
};
use serde::{Deserialize, Serialize};
use services::services::deadline::{self, Classification};
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{Principal, ensure_project_access},
    error::ApiError,
};

/// Raw query parameters for task listing. Values that fail to parse
/// contribute no constraint instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<String>,
    pub project_id: Option<String>,
    pub search: Option<String>,
    pub due_after: Option<String>,
    pub due_before: Option<String>,
    pub overdue: Option<String>,
    pub upcoming: Option<String>,
}

impl TaskListQuery {
    fn into_filter(self) -> TaskFilter {
        TaskFilter {
            status: self
                .status
                .as_deref()
                .and_then(|s| s.parse::<TaskStatus>().ok()),
            priority: self
                .priority
                .as_deref()
                .and_then(|s| s.parse::<TaskPriority>().ok()),
            assignee_id: parse_uuid(self.assignee_id.as_deref()),
            project_id: parse_uuid(self.project_id.as_deref()),
            search: self.search,
            due_after: parse_date(self.due_after.as_deref()),
            due_before: parse_date(self.due_before.as_deref()),
            overdue: parse_flag(self.overdue.as_deref()),
            upcoming: parse_flag(self.upcoming.as_deref()),
        }
    }
}

pub(crate) fn parse_uuid(value: Option<&str>) -> Option<Uuid> {
    value.and_then(|s| Uuid::parse_str(s).ok())
}

pub(crate) fn parse_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

pub(crate) fn parse_flag(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}

/// Task annotated with its deadline classification at read time.
#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskWithDeadline {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub deadline: Classification,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<TaskListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskWithDeadline>>>, ApiError> {
    let now = Utc::now();
    let filter = query.into_filter();
    let mut tasks = filter
        .fetch(&state.db.pool, &principal.scope(), now)
        .await?;

    deadline::sort_for_display(&mut tasks, now, state.config.urgent_rank);

    let horizon = state.config.warning_horizon_days;
    let annotated = tasks
        .into_iter()
        .map(|task| {
            let deadline = deadline::classify(&task, now, horizon);
            TaskWithDeadline { task, deadline }
        })
        .collect();

    Ok(ResponseJson(ApiResponse::success(annotated)))
}

pub async fn create_task(
    State(state): State<AppState>,
    principal: Principal,
    axum::Json(payload): axum::Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<TaskWithDeadline>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    ensure_project_access(&state, &principal, payload.project_id, "project").await?;

    let task = Task::create(&state.db.pool, &payload, Uuid::new_v4()).await?;

    if let Some(assignee_id) = task.assignee_id {
        notify_assignment(&state, &task, assignee_id).await;
    }

    let deadline = deadline::classify(&task, Utc::now(), state.config.warning_horizon_days);
    Ok(ResponseJson(ApiResponse::success(TaskWithDeadline {
        task,
        deadline,
    })))
}

pub async fn get_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskWithDeadline>>, ApiError> {
    let task = Task::find_by_id(&state.db.pool, task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    ensure_project_access(&state, &principal, task.project_id, "task").await?;

    let deadline = deadline::classify(&task, Utc::now(), state.config.warning_horizon_days);
    Ok(ResponseJson(ApiResponse::success(TaskWithDeadline {
        task,
        deadline,
    })))
}

pub async fn update_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<TaskWithDeadline>>, ApiError> {
    let existing = Task::find_by_id(&state.db.pool, task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    ensure_project_access(&state, &principal, existing.project_id, "task").await?;

    let title = payload.title.unwrap_or(existing.title);
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    let description = payload.description.or(existing.description);
    let status = payload.status.unwrap_or(existing.status);
    let priority = payload.priority.unwrap_or(existing.priority);
    let assignee_id = payload.assignee_id.or(existing.assignee_id);
    let due_date = payload.due_date.or(existing.due_date);

    let task = Task::update(
        &state.db.pool,
        task_id,
        title,
        description,
        status,
        priority,
        assignee_id,
        due_date,
    )
    .await?;

    if let Some(new_assignee) = task.assignee_id {
        if existing.assignee_id != Some(new_assignee) {
            notify_assignment(&state, &task, new_assignee).await;
        }
    }

    let deadline = deadline::classify(&task, Utc::now(), state.config.warning_horizon_days);
    Ok(ResponseJson(ApiResponse::success(TaskWithDeadline {
        task,
        deadline,
    })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let existing = Task::find_by_id(&state.db.pool, task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    ensure_project_access(&state, &principal, existing.project_id, "task").await?;

    Task::delete(&state.db.pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

async fn notify_assignment(state: &AppState, task: &Task, assignee_id: Uuid) {
    let data = CreateNotification {
        user_id: assignee_id,
        notification_type: NotificationType::TaskAssigned,
        title: format!("Task assigned: {}", task.title),
        message: format!("You have been assigned task '{}'.", task.title),
        priority: match task.priority {
            TaskPriority::Urgent | TaskPriority::High => NotificationPriority::High,
            _ => NotificationPriority::Medium,
        },
        related_id: Some(task.id),
        related_type: Some("task".to_string()),
        data: None,
    };
    if let Err(e) = state.notifications.notify_user(data).await {
        warn!(task_id = %task.id, error = %e, "assignment notification failed");
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_values_degrade_to_no_constraint() {
        let query = TaskListQuery {
            status: Some("not-a-status".to_string()),
            priority: Some("urgent".to_string()),
            assignee_id: Some("not-a-uuid".to_string()),
            overdue: Some("yes".to_string()),
            upcoming: Some("true".to_string()),
            ..Default::default()
        };
        let filter = query.into_filter();
        assert_eq!(filter.status, None);
        assert_eq!(filter.priority, Some(TaskPriority::Urgent));
        assert_eq!(filter.assignee_id, None);
        assert!(!filter.overdue);
        assert!(filter.upcoming);
    }

    #[test]
    fn date_parameters_accept_rfc3339() {
        let parsed = parse_date(Some("2025-06-02T12:00:00Z"));
        assert!(parsed.is_some());
        assert_eq!(parse_date(Some("next tuesday")), None);
    }
}
