//! Principal resolution.
//!
//! Session handling lives upstream; by the time a request reaches these
//! handlers the authenticating proxy has attached `X-User-Id`. This
//! extractor turns that header into a `Principal` and is the single seam
//! where a real session layer would plug in.

use axum::{extract::FromRequestParts, http::request::Parts};
use db::{
    filter::ProjectScope,
    models::{
        project::ProjectMember,
        user::{User, UserRole},
    },
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Visibility scope for list queries.
    pub fn scope(&self) -> ProjectScope {
        match self.role {
            UserRole::Admin => ProjectScope::All,
            UserRole::Member => ProjectScope::MemberOf(self.id),
        }
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let user_id = Uuid::parse_str(header).map_err(|_| ApiError::Unauthorized)?;
        let user = User::find_by_id(&state.db.pool, user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(Self {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

/// Direct-access check for single-item endpoints. Non-members get a 404 so
/// project existence is not leaked.
pub async fn ensure_project_access(
    state: &AppState,
    principal: &Principal,
    project_id: Uuid,
    kind: &'static str,
) -> Result<(), ApiError> {
    if principal.is_admin() {
        return Ok(());
    }
    if ProjectMember::is_member(&state.db.pool, project_id, principal.id).await? {
        return Ok(());
    }
    Err(ApiError::NotFound(kind))
}
