use axum::{extract::Extension, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::token::Identity;

use super::{
    error::AuthError,
    password::verify_password,
    state::AuthState,
    types::{ErrorResponse, LoginRequest, UserProfile, UserResponse},
    utils::normalize_email,
};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; accessToken and refreshToken cookies set", body = UserResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::BadRequest("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(AuthError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = auth_state
        .store()
        .find_by_email(&email)
        .await
        .map_err(|err| AuthError::internal("failed to lookup user", err))?;

    let verified = verify_password(
        request.password,
        user.as_ref().map(|u| u.password_hash.clone()),
    )
    .await
    .map_err(|err| AuthError::internal("failed to verify password", err))?;

    let user = match user {
        Some(user) if verified => user,
        _ => return Err(AuthError::InvalidCredentials),
    };

    let pair = auth_state.issue_token_pair(&Identity::from(&user)).await?;
    let cookies = auth_state.session_cookies(&pair)?;

    info!(user_id = %user.id, role = %user.role, "user logged in");

    Ok((
        cookies,
        Json(UserResponse {
            success: true,
            user: UserProfile::from(&user),
        }),
    ))
}
