use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::token::Role;

use super::{
    error::AuthError,
    password::hash_password,
    state::AuthState,
    storage::{InsertOutcome, NewUser},
    types::{ErrorResponse, RegisterRequest, RegisterResponse},
    utils::{normalize_email, valid_email, valid_password, MIN_PASSWORD_LEN},
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::BadRequest("Missing payload".to_string()));
    };

    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    if name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(AuthError::BadRequest(
            "Name, email and password are required".to_string(),
        ));
    }
    if !valid_email(&email) {
        return Err(AuthError::BadRequest("Invalid email address".to_string()));
    }
    if !valid_password(&request.password) {
        return Err(AuthError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(request.password)
        .await
        .map_err(|err| AuthError::internal("failed to hash password", err))?;

    // Self-registration always yields USER; SUPER_ADMIN is provisioned out of band.
    let outcome = auth_state
        .store()
        .insert_user(NewUser {
            name,
            email,
            password_hash,
            role: Role::User,
        })
        .await
        .map_err(|err| AuthError::internal("failed to insert user", err))?;

    match outcome {
        InsertOutcome::Created(user_id) => {
            info!(%user_id, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse {
                    success: true,
                    user_id,
                }),
            ))
        }
        InsertOutcome::Conflict => Err(AuthError::Conflict(
            "User with this email already exists".to_string(),
        )),
    }
}
