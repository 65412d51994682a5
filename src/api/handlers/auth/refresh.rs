use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::token::cookies;

use super::{
    error::AuthError,
    state::AuthState,
    types::{ErrorResponse, RefreshResponse},
};

#[utoipa::path(
    post,
    path = "/api/auth/refresh-token",
    responses(
        (status = 200, description = "Rotated; both cookies re-set", body = RefreshResponse),
        (status = 401, description = "Refresh token missing, expired or already used; both cookies cleared", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh_token(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let result = match cookies::refresh_token(&headers) {
        Some(presented) => auth_state.refresh_token_pair(&presented).await,
        None => {
            debug!("refresh requested without a refresh cookie");
            Err(AuthError::RefreshFailed)
        }
    };

    let pair = match result {
        Ok(pair) => pair,
        Err(AuthError::RefreshFailed) => {
            return (auth_state.cleared_cookies(), AuthError::RefreshFailed).into_response();
        }
        Err(err) => return err.into_response(),
    };

    match auth_state.session_cookies(&pair) {
        Ok(cookies) => (
            cookies,
            Json(RefreshResponse {
                success: true,
                access_token: pair.access_token,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
