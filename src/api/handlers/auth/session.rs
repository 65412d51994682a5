//! Token-pair lifecycle: issue at login, rotate on refresh, revoke at logout.

use axum::http::{header::SET_COOKIE, HeaderMap};
use tracing::{debug, error};
use uuid::Uuid;

use crate::token::{
    self,
    cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    Identity,
};

use super::{error::AuthError, state::AuthState, storage::UserRecord};

/// Raw credentials, only ever written to `Set-Cookie`.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPair(***)")
    }
}

impl From<&UserRecord> for Identity {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.id,
            email: record.email.clone(),
            role: record.role,
        }
    }
}

impl AuthState {
    /// Mint a pair and persist the refresh hash, replacing any previous one.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if signing or storage fails.
    pub async fn issue_token_pair(&self, identity: &Identity) -> Result<TokenPair, AuthError> {
        let access_token = self
            .tokens()
            .issue_access_token(identity)
            .map_err(|err| AuthError::internal("failed to sign access token", err))?;
        let refresh_token = token::generate_refresh_token()
            .map_err(|err| AuthError::internal("failed to generate refresh token", err))?;

        self.store()
            .store_refresh_token(
                identity.user_id,
                &token::hash_refresh_token(&refresh_token),
                self.config().refresh_token_ttl_seconds(),
            )
            .await
            .map_err(|err| AuthError::internal("failed to store refresh token", err))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a presented refresh token for a new pair.
    ///
    /// # Errors
    /// Returns [`AuthError::RefreshFailed`] when the token is unknown, expired,
    /// already rotated or revoked.
    pub async fn refresh_token_pair(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let refresh_token = token::generate_refresh_token()
            .map_err(|err| AuthError::internal("failed to generate refresh token", err))?;

        let rotated = self
            .store()
            .rotate_refresh_token(
                &token::hash_refresh_token(presented),
                &token::hash_refresh_token(&refresh_token),
                self.config().refresh_token_ttl_seconds(),
            )
            .await
            .map_err(|err| AuthError::internal("failed to rotate refresh token", err))?;

        let Some(user) = rotated else {
            debug!("refresh token not found, expired or already rotated");
            return Err(AuthError::RefreshFailed);
        };

        let access_token = self
            .tokens()
            .issue_access_token(&Identity::from(&user))
            .map_err(|err| AuthError::internal("failed to sign access token", err))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Drop the stored refresh reference. Issued access tokens stay valid
    /// until they expire.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if storage fails.
    pub async fn revoke_session(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store()
            .clear_refresh_token(user_id)
            .await
            .map_err(|err| AuthError::internal("failed to clear refresh token", err))
    }

    /// `Set-Cookie` headers carrying both credentials.
    pub(super) fn session_cookies(&self, pair: &TokenPair) -> Result<HeaderMap, AuthError> {
        let policy = self.config().cookie_policy();
        let access = policy
            .set_cookie(
                ACCESS_TOKEN_COOKIE,
                &pair.access_token,
                self.config().access_token_ttl_seconds(),
            )
            .map_err(|err| AuthError::internal("failed to build access cookie", err))?;
        let refresh = policy
            .set_cookie(
                REFRESH_TOKEN_COOKIE,
                &pair.refresh_token,
                self.config().refresh_token_ttl_seconds(),
            )
            .map_err(|err| AuthError::internal("failed to build refresh cookie", err))?;

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, access);
        headers.append(SET_COOKIE, refresh);
        Ok(headers)
    }

    /// `Set-Cookie` headers expiring both credentials. Empty if they cannot be built.
    pub(super) fn cleared_cookies(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self.config().cookie_policy().clear_credentials() {
            Ok(cookies) => {
                for cookie in cookies {
                    headers.append(SET_COOKIE, cookie);
                }
            }
            Err(err) => error!("failed to build clearing cookies: {err}"),
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::handlers::auth::{
            storage::{InsertOutcome, NewUser, UserStore},
            AuthConfig, MemoryUserStore,
        },
        token::Role,
    };
    use anyhow::{anyhow, Result};
    use secrecy::SecretString;
    use std::sync::Arc;

    async fn state_with_user() -> Result<(Arc<AuthState>, Identity)> {
        let store = Arc::new(MemoryUserStore::new());
        let InsertOutcome::Created(user_id) = store
            .insert_user(NewUser {
                name: "Ana".to_string(),
                email: "ana@atelier.shop".to_string(),
                password_hash: "unused".to_string(),
                role: Role::User,
            })
            .await?
        else {
            return Err(anyhow!("expected a new user"));
        };
        let state = AuthState::new(
            AuthConfig::new("http://localhost:3000".to_string()),
            &SecretString::from("k".repeat(48)),
            store,
        )?;
        let identity = Identity {
            user_id,
            email: "ana@atelier.shop".to_string(),
            role: Role::User,
        };
        Ok((Arc::new(state), identity))
    }

    #[tokio::test]
    async fn issued_access_token_verifies() -> Result<()> {
        let (state, identity) = state_with_user().await?;
        let pair = state.issue_token_pair(&identity).await?;
        assert_eq!(state.tokens().verify_access_token(&pair.access_token)?, identity);
        Ok(())
    }

    #[tokio::test]
    async fn rotated_token_cannot_be_reused() -> Result<()> {
        let (state, identity) = state_with_user().await?;
        let first = state.issue_token_pair(&identity).await?;
        let second = state.refresh_token_pair(&first.refresh_token).await?;
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(matches!(
            state.refresh_token_pair(&first.refresh_token).await,
            Err(AuthError::RefreshFailed)
        ));
        assert!(state.refresh_token_pair(&second.refresh_token).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn new_login_replaces_previous_refresh_token() -> Result<()> {
        let (state, identity) = state_with_user().await?;
        let first = state.issue_token_pair(&identity).await?;
        let _second = state.issue_token_pair(&identity).await?;
        assert!(matches!(
            state.refresh_token_pair(&first.refresh_token).await,
            Err(AuthError::RefreshFailed)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_blocks_refresh_but_not_access() -> Result<()> {
        let (state, identity) = state_with_user().await?;
        let pair = state.issue_token_pair(&identity).await?;
        state.revoke_session(identity.user_id).await?;
        assert!(matches!(
            state.refresh_token_pair(&pair.refresh_token).await,
            Err(AuthError::RefreshFailed)
        ));
        assert!(state.tokens().verify_access_token(&pair.access_token).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_refresh_has_one_winner() -> Result<()> {
        let (state, identity) = state_with_user().await?;
        let pair = state.issue_token_pair(&identity).await?;
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                let presented = pair.refresh_token.clone();
                tokio::spawn(async move { state.refresh_token_pair(&presented).await.is_ok() })
            })
            .collect();
        let mut winners = 0;
        for task in tasks {
            if task.await? {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        Ok(())
    }

    #[tokio::test]
    async fn session_cookies_carry_both_credentials() -> Result<()> {
        let (state, identity) = state_with_user().await?;
        let pair = state.issue_token_pair(&identity).await?;
        let headers = state.session_cookies(&pair)?;
        let cookies: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("accessToken="));
        assert!(cookies[0].contains("Max-Age=900"));
        assert!(cookies[1].starts_with("refreshToken="));
        assert!(cookies[1].contains("Max-Age=604800"));
        assert_eq!(state.cleared_cookies().get_all(SET_COOKIE).iter().count(), 2);
        Ok(())
    }
}
