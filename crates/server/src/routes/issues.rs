//! Issue endpoints, mirroring the task surface.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::Utc;
use db::{
    filter::IssueFilter,
    models::{
        issue::{CreateIssue, Issue, IssuePriority, IssueStatus, UpdateIssue},
        notification::{CreateNotification, NotificationPriority, NotificationType},
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
    routes::tasks::{parse_date, parse_flag, parse_uuid},
};

#[derive(Debug, Default, Deserialize)]
pub struct IssueListQuery {
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

impl IssueListQuery {
    fn into_filter(self) -> IssueFilter {
        IssueFilter {
            status: self
                .status
                .as_deref()
                .and_then(|s| s.parse::<IssueStatus>().ok()),
            priority: self
                .priority
                .as_deref()
                .and_then(|s| s.parse::<IssuePriority>().ok()),
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

/// Issue annotated with its deadline classification at read time.
#[derive(Debug, Clone, Serialize, TS)]
pub struct IssueWithDeadline {
    #[serde(flatten)]
    #[ts(flatten)]
    pub issue: Issue,
    pub deadline: Classification,
}

pub async fn list_issues(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<IssueListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<IssueWithDeadline>>>, ApiError> {
    let now = Utc::now();
    let filter = query.into_filter();
    let mut issues = filter
        .fetch(&state.db.pool, &principal.scope(), now)
        .await?;

    deadline::sort_for_display(&mut issues, now, state.config.urgent_rank);

    let horizon = state.config.warning_horizon_days;
    let annotated = issues
        .into_iter()
        .map(|issue| {
            let deadline = deadline::classify(&issue, now, horizon);
            IssueWithDeadline { issue, deadline }
        })
        .collect();

    Ok(ResponseJson(ApiResponse::success(annotated)))
}

pub async fn create_issue(
    State(state): State<AppState>,
    principal: Principal,
    axum::Json(payload): axum::Json<CreateIssue>,
) -> Result<ResponseJson<ApiResponse<IssueWithDeadline>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    ensure_project_access(&state, &principal, payload.project_id, "project").await?;

    let issue = Issue::create(&state.db.pool, &payload, Uuid::new_v4()).await?;

    if let Some(assignee_id) = issue.assignee_id {
        notify_assignment(&state, &issue, assignee_id).await;
    }

    let deadline = deadline::classify(&issue, Utc::now(), state.config.warning_horizon_days);
    Ok(ResponseJson(ApiResponse::success(IssueWithDeadline {
        issue,
        deadline,
    })))
}

pub async fn get_issue(
    State(state): State<AppState>,
    principal: Principal,
    Path(issue_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<IssueWithDeadline>>, ApiError> {
    let issue = Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("issue"))?;
    ensure_project_access(&state, &principal, issue.project_id, "issue").await?;

    let deadline = deadline::classify(&issue, Utc::now(), state.config.warning_horizon_days);
    Ok(ResponseJson(ApiResponse::success(IssueWithDeadline {
        issue,
        deadline,
    })))
}

pub async fn update_issue(
    State(state): State<AppState>,
    principal: Principal,
    Path(issue_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateIssue>,
) -> Result<ResponseJson<ApiResponse<IssueWithDeadline>>, ApiError> {
    let existing = Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("issue"))?;
    ensure_project_access(&state, &principal, existing.project_id, "issue").await?;

    let title = payload.title.unwrap_or(existing.title);
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    let description = payload.description.or(existing.description);
    let status = payload.status.unwrap_or(existing.status);
    let priority = payload.priority.unwrap_or(existing.priority);
    let assignee_id = payload.assignee_id.or(existing.assignee_id);
    let due_date = payload.due_date.or(existing.due_date);

    let issue = Issue::update(
        &state.db.pool,
        issue_id,
        title,
        description,
        status,
        priority,
        assignee_id,
        due_date,
    )
    .await?;

    if let Some(new_assignee) = issue.assignee_id {
        if existing.assignee_id != Some(new_assignee) {
            notify_assignment(&state, &issue, new_assignee).await;
        }
    }

    let deadline = deadline::classify(&issue, Utc::now(), state.config.warning_horizon_days);
    Ok(ResponseJson(ApiResponse::success(IssueWithDeadline {
        issue,
        deadline,
    })))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    principal: Principal,
    Path(issue_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let existing = Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("issue"))?;
    ensure_project_access(&state, &principal, existing.project_id, "issue").await?;

    Issue::delete(&state.db.pool, issue_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

async fn notify_assignment(state: &AppState, issue: &Issue, assignee_id: Uuid) {
    let data = CreateNotification {
        user_id: assignee_id,
        notification_type: NotificationType::IssueAssigned,
        title: format!("Issue assigned: {}", issue.title),
        message: format!("You have been assigned issue '{}'.", issue.title),
        priority: match issue.priority {
            IssuePriority::High => NotificationPriority::High,
            _ => NotificationPriority::Medium,
        },
        related_id: Some(issue.id),
        related_type: Some("issue".to_string()),
        data: None,
    };
    if let Err(e) = state.notifications.notify_user(data).await {
        warn!(issue_id = %issue.id, error = %e, "assignment notification failed");
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues).post(create_issue))
        .route(
            "/issues/{issue_id}",
            get(get_issue).put(update_issue).delete(delete_issue),
        )
}
