//! Cookie transport for the credential pair.
//!
//! The access token travels in the `accessToken` cookie; API clients that
//! cannot hold cookies may send `Authorization: Bearer` instead. The refresh
//! token only ever travels in the `refreshToken` cookie.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use std::str::FromStr;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Deployment mode; decides the cookie attributes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Attributes applied to every credential cookie.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CookiePolicy {
    secure: bool,
    same_site: &'static str,
}

impl CookiePolicy {
    /// Production cookies are cross-site (`SameSite=None`), which browsers only
    /// accept together with `Secure`.
    #[must_use]
    pub const fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self {
                secure: true,
                same_site: "None",
            },
            Environment::Development => Self {
                secure: false,
                same_site: "Lax",
            },
        }
    }

    /// Build a `Set-Cookie` value for a credential.
    ///
    /// # Errors
    /// Returns an error if the value contains bytes not allowed in a header.
    pub fn set_cookie(
        &self,
        name: &str,
        value: &str,
        max_age_seconds: i64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{name}={value}; Path=/; HttpOnly; SameSite={}; Max-Age={max_age_seconds}",
            self.same_site
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Build a `Set-Cookie` value that expires the cookie immediately.
    ///
    /// # Errors
    /// Returns an error if `name` is not a valid header value.
    pub fn clear_cookie(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.set_cookie(name, "", 0)
    }

    /// `Set-Cookie` values clearing both credentials.
    ///
    /// # Errors
    /// Returns an error if a header value cannot be built.
    pub fn clear_credentials(&self) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
        Ok([
            self.clear_cookie(ACCESS_TOKEN_COOKIE)?,
            self.clear_cookie(REFRESH_TOKEN_COOKIE)?,
        ])
    }
}

/// Read a cookie by name from every `Cookie` header of the request.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

/// Extract the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Access credential: cookie first, bearer header as fallback.
#[must_use]
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, ACCESS_TOKEN_COOKIE).or_else(|| bearer_token(headers))
}

#[must_use]
pub fn refresh_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, REFRESH_TOKEN_COOKIE)
}

/// Value of `name` if this `Set-Cookie` line sets it.
#[must_use]
pub fn set_cookie_value<'a>(set_cookie: &'a str, name: &str) -> Option<&'a str> {
    let pair = set_cookie.split(';').next()?;
    let (key, value) = pair.trim().split_once('=')?;
    (key.trim() == name).then(|| value.trim())
}

/// Rewrite a `Cookie` header so `name` carries `value`, appending it if absent.
#[must_use]
pub fn replace_cookie(cookie_header: &str, name: &str, value: &str) -> String {
    let mut replaced = false;
    let mut pairs: Vec<String> = cookie_header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.trim() == name => {
                replaced = true;
                format!("{name}={value}")
            }
            _ => pair.to_string(),
        })
        .collect();
    if !replaced {
        pairs.push(format!("{name}={value}"));
    }
    pairs.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("production".parse(), Ok(Environment::Production));
        assert_eq!("PROD".parse(), Ok(Environment::Production));
        assert_eq!("dev".parse(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn production_cookies_are_secure_cross_site() -> Result<()> {
        let policy = CookiePolicy::for_environment(Environment::Production);
        let cookie = policy.set_cookie(ACCESS_TOKEN_COOKIE, "abc", 900)?;
        assert_eq!(
            cookie.to_str()?,
            "accessToken=abc; Path=/; HttpOnly; SameSite=None; Max-Age=900; Secure"
        );
        Ok(())
    }

    #[test]
    fn development_cookies_are_lax() -> Result<()> {
        let policy = CookiePolicy::for_environment(Environment::Development);
        let cookie = policy.clear_cookie(REFRESH_TOKEN_COOKIE)?;
        assert_eq!(
            cookie.to_str()?,
            "refreshToken=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
        Ok(())
    }

    #[test]
    fn cookie_value_reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=aaa ; refreshToken=rrr"),
        );
        assert_eq!(cookie_value(&headers, "accessToken"), Some("aaa".to_string()));
        assert_eq!(refresh_token(&headers), Some("rrr".to_string()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn cookie_value_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("accessToken="));
        assert_eq!(cookie_value(&headers, ACCESS_TOKEN_COOKIE), None);
    }

    #[test]
    fn access_token_prefers_cookie_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(access_token(&headers), Some("header-token".to_string()));

        headers.insert(COOKIE, HeaderValue::from_static("accessToken=cookie-token"));
        assert_eq!(access_token(&headers), Some("cookie-token".to_string()));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn set_cookie_value_reads_first_pair_only() {
        let line = "refreshToken=new; Path=/; HttpOnly";
        assert_eq!(set_cookie_value(line, REFRESH_TOKEN_COOKIE), Some("new"));
        assert_eq!(set_cookie_value(line, ACCESS_TOKEN_COOKIE), None);
        assert_eq!(set_cookie_value("Path=/", REFRESH_TOKEN_COOKIE), None);
    }

    #[test]
    fn replace_cookie_rewrites_or_appends() {
        assert_eq!(
            replace_cookie("theme=dark; accessToken=old", ACCESS_TOKEN_COOKIE, "new"),
            "theme=dark; accessToken=new"
        );
        assert_eq!(
            replace_cookie("theme=dark", ACCESS_TOKEN_COOKIE, "new"),
            "theme=dark; accessToken=new"
        );
        assert_eq!(replace_cookie("", ACCESS_TOKEN_COOKIE, "new"), "accessToken=new");
    }
}
