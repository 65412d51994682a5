use anyhow::{anyhow, Context, Result};
use reqwest::{redirect, Client};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::{
    token::{
        cookies::{CookiePolicy, Environment},
        TokenAuthority, DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
    },
    APP_USER_AGENT,
};

use super::policy::RoutePolicy;

const UPSTREAM_TIMEOUT_SECONDS: u64 = 30;

/// Shared, read-only state of the edge gateway.
pub struct EdgeState {
    tokens: TokenAuthority,
    policy: RoutePolicy,
    client: Client,
    backend_url: String,
    frontend_url: String,
    cookie_policy: CookiePolicy,
}

fn base_url(value: &str, what: &str) -> Result<String> {
    let parsed = Url::parse(value).with_context(|| format!("Invalid {what} URL: {value}"))?;
    if parsed.host_str().is_none() {
        return Err(anyhow!("{what} URL must include a host: {value}"));
    }
    Ok(value.trim_end_matches('/').to_string())
}

impl EdgeState {
    /// # Errors
    /// Returns an error if a URL is invalid, the secret is too short, or the
    /// HTTP client cannot be built.
    pub fn new(
        jwt_secret: &SecretString,
        backend_url: &str,
        frontend_url: &str,
        environment: Environment,
    ) -> Result<Self> {
        // The edge only verifies; the TTL is unused here.
        let tokens = TokenAuthority::new(jwt_secret, DEFAULT_ACCESS_TOKEN_TTL_SECONDS)?;

        // Redirects belong to the browser, never follow them here.
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            tokens,
            policy: RoutePolicy::default(),
            client,
            backend_url: base_url(backend_url, "backend")?,
            frontend_url: base_url(frontend_url, "frontend")?,
            cookie_policy: CookiePolicy::for_environment(environment),
        })
    }

    pub(super) fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    pub(super) fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub(super) fn cookie_policy(&self) -> CookiePolicy {
        self.cookie_policy
    }

    /// Absolute backend URL for a path that already starts with `/`.
    pub(super) fn backend(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.backend_url)
    }

    pub(super) fn frontend(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.frontend_url)
    }
}

impl std::fmt::Debug for EdgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeState")
            .field("backend_url", &self.backend_url)
            .field("frontend_url", &self.frontend_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("e".repeat(32))
    }

    #[test]
    fn urls_are_joined_without_double_slash() -> Result<()> {
        let state = EdgeState::new(
            &secret(),
            "http://127.0.0.1:4000/",
            "http://127.0.0.1:3000",
            Environment::Development,
        )?;
        assert_eq!(
            state.backend("/api/auth/refresh-token"),
            "http://127.0.0.1:4000/api/auth/refresh-token"
        );
        assert_eq!(state.frontend("/home?tab=1"), "http://127.0.0.1:3000/home?tab=1");
        Ok(())
    }

    #[test]
    fn invalid_upstream_rejected() {
        assert!(EdgeState::new(
            &secret(),
            "not a url",
            "http://127.0.0.1:3000",
            Environment::Development
        )
        .is_err());
    }

    #[test]
    fn weak_secret_rejected() {
        assert!(EdgeState::new(
            &SecretString::from("short".to_string()),
            "http://127.0.0.1:4000",
            "http://127.0.0.1:3000",
            Environment::Production
        )
        .is_err());
    }
}
