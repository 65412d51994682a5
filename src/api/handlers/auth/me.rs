use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{
    error::AuthError,
    principal::require_auth,
    state::AuthState,
    types::{ErrorResponse, UserProfile, UserResponse},
};

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn me(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    let identity = require_auth(&headers, &auth_state)?;

    let user = auth_state
        .store()
        .find_by_id(identity.user_id)
        .await
        .map_err(|err| AuthError::internal("failed to lookup user", err))?
        .ok_or(AuthError::Unauthorized)?;

    Ok(Json(UserResponse {
        success: true,
        user: UserProfile::from(&user),
    }))
}
