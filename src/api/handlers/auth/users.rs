use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use crate::token::Role;

use super::{
    error::AuthError,
    principal::{require_auth, require_role},
    state::AuthState,
    types::{ErrorResponse, UserProfile, UsersResponse},
};

#[utoipa::path(
    get,
    path = "/api/auth/users",
    responses(
        (status = 200, description = "All accounts, newest first", body = UsersResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Caller is not SUPER_ADMIN", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn users(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    let identity = require_auth(&headers, &auth_state)?;
    require_role(&identity, Role::SuperAdmin)?;

    let users = auth_state
        .store()
        .list_users()
        .await
        .map_err(|err| AuthError::internal("failed to list users", err))?;

    Ok(Json(UsersResponse {
        success: true,
        users: users.iter().map(UserProfile::from).collect(),
    }))
}
