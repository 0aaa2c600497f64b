//! In-app notification endpoints. Callers only ever see their own rows.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::notification::Notification;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::Principal, error::ApiError};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<NotificationListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200);
    let notifications = Notification::find_by_user(
        &state.db.pool,
        principal.id,
        query.unread_only.unwrap_or(false),
        limit,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    let count = Notification::count_unread(&state.db.pool, principal.id).await?;
    Ok(ResponseJson(ApiResponse::success(count)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    principal: Principal,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let updated = Notification::mark_read(&state.db.pool, notification_id, principal.id).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("notification"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/{notification_id}/read", post(mark_read))
}
