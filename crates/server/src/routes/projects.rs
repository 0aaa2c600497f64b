//! Project endpoints. Listing honors the caller's membership scope; project
//! creation and membership management are admin operations.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::project::{CreateProject, Project, ProjectMember};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{Principal, ensure_project_access},
    error::ApiError,
};

pub async fn list_projects(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = if principal.is_admin() {
        Project::find_all(&state.db.pool).await?
    } else {
        Project::find_for_member(&state.db.pool, principal.id).await?
    };
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn create_project(
    State(state): State<AppState>,
    principal: Principal,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if !principal.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if payload.name.trim().is_empty() || payload.code.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and code must not be empty".to_string(),
        ));
    }
    let project = Project::create(&state.db.pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::find_by_id(&state.db.pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    ensure_project_access(&state, &principal, project.id, "project").await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Option<String>,
}

pub async fn add_member(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<AddMemberRequest>,
) -> Result<ResponseJson<ApiResponse<ProjectMember>>, ApiError> {
    if !principal.is_admin() {
        return Err(ApiError::Forbidden);
    }
    Project::find_by_id(&state.db.pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;

    let role = payload.role.as_deref().unwrap_or("member");
    let member = ProjectMember::add(&state.db.pool, project_id, payload.user_id, role).await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

pub async fn list_members(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectMember>>>, ApiError> {
    ensure_project_access(&state, &principal, project_id, "project").await?;
    let members = ProjectMember::find_by_project(&state.db.pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/{project_id}", get(get_project))
        .route(
            "/projects/{project_id}/members",
            get(list_members).post(add_member),
        )
}
