use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::token::{self, cookies};

use super::{state::AuthState, types::MessageResponse};

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session revoked and cookies cleared", body = MessageResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(user_id) = session_owner(&headers, &auth_state).await {
        match auth_state.revoke_session(user_id).await {
            Ok(()) => info!(%user_id, "session revoked"),
            Err(err) => error!("Failed to revoke session: {err}"),
        }
    }

    // Always clear the cookies, even if no session was found.
    (
        auth_state.cleared_cookies(),
        Json(MessageResponse {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    )
}

/// The access token names the user; an expired one falls back to the refresh cookie.
async fn session_owner(headers: &HeaderMap, auth_state: &AuthState) -> Option<Uuid> {
    if let Some(identity) = cookies::access_token(headers)
        .and_then(|token| auth_state.tokens().verify_access_token(&token).ok())
    {
        return Some(identity.user_id);
    }

    let presented = cookies::refresh_token(headers)?;
    match auth_state
        .store()
        .find_by_refresh_token(&token::hash_refresh_token(&presented))
        .await
    {
        Ok(user) => user.map(|u| u.id),
        Err(err) => {
            error!("Failed to lookup refresh token owner: {err}");
            None
        }
    }
}
