//! Authenticated principal extraction and role checks.
//!
//! The access credential is read from the `accessToken` cookie, falling back to
//! `Authorization: Bearer`, and verified locally without touching storage.

use axum::http::HeaderMap;

use crate::token::{cookies, Identity, Role};

use super::{error::AuthError, state::AuthState};

/// Resolve the request's access credential into an identity.
///
/// # Errors
/// [`AuthError::Unauthorized`] when no credential is presented,
/// [`AuthError::TokenInvalid`] when verification fails.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Identity, AuthError> {
    let token = cookies::access_token(headers).ok_or(AuthError::Unauthorized)?;
    auth_state
        .tokens()
        .verify_access_token(&token)
        .map_err(|_| AuthError::TokenInvalid)
}

/// # Errors
/// [`AuthError::Forbidden`] when the identity does not hold `role`.
pub fn require_role(identity: &Identity, role: Role) -> Result<(), AuthError> {
    if identity.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
