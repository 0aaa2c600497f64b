pub mod issues;
pub mod notifications;
pub mod projects;
pub mod tasks;

use axum::{Json, Router, routing::get};
use utils::response::ApiResponse;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .route("/health", get(health))
                .merge(projects::router())
                .merge(tasks::router())
                .merge(issues::router())
                .merge(notifications::router()),
        )
        .with_state(state)
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}
