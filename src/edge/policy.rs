//! Which paths need a session, and which role may see them.

use crate::token::Role;

const LOGIN_PATH: &str = "/auth/login";

/// Outcome of evaluating a navigation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Forward to the frontend.
    Allow,
    /// Send the browser elsewhere, keeping its cookies.
    Redirect(&'static str),
    /// Send the browser to the login page and clear both credentials.
    Login,
}

#[derive(Clone, Debug)]
pub struct RoutePolicy {
    public_paths: Vec<String>,
    bypass_prefixes: Vec<String>,
    restricted: Vec<(String, Role)>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            public_paths: vec![LOGIN_PATH.to_string(), "/auth/register".to_string()],
            bypass_prefixes: vec![
                "/api".to_string(),
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/favicon.ico".to_string(),
            ],
            restricted: vec![
                ("/super-admin".to_string(), Role::SuperAdmin),
                ("/home".to_string(), Role::User),
            ],
        }
    }
}

/// `/home` matches `/home` and `/home/orders`, not `/homepage`.
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl RoutePolicy {
    #[must_use]
    pub const fn login_path() -> &'static str {
        LOGIN_PATH
    }

    /// Static assets and API calls are never guarded.
    #[must_use]
    pub fn bypasses(&self, path: &str) -> bool {
        self.bypass_prefixes.iter().any(|prefix| under(path, prefix))
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| public == path)
    }

    /// Decision for a request carrying a verified credential.
    #[must_use]
    pub fn authorize(&self, path: &str, role: Role) -> Decision {
        if self.is_public(path) {
            return Decision::Redirect(role.home_path());
        }
        let mismatch = self
            .restricted
            .iter()
            .any(|(prefix, required)| *required != role && under(path, prefix));
        if mismatch {
            Decision::Redirect(role.home_path())
        } else {
            Decision::Allow
        }
    }

    /// Decision for a request without a usable credential.
    #[must_use]
    pub fn anonymous(&self, path: &str) -> Decision {
        if self.is_public(path) {
            Decision::Allow
        } else {
            Decision::Login
        }
    }
}
