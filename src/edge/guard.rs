//! Navigation guard in front of the frontend.
//!
//! Per request: verify the access credential; if that fails, try exactly one
//! refresh against the backend; then allow, redirect by role, or send the
//! browser to the login page with both cookies cleared.

use axum::{
    body::Bytes,
    extract::{Extension, Request},
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument, Instrument};

use crate::token::{
    cookies::{self, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    Identity,
};

use super::{
    policy::{Decision, RoutePolicy},
    proxy::{bad_gateway, filter_headers, forward, passthrough_header, read_body},
    state::EdgeState,
};

const REFRESH_PATH: &str = "/api/auth/refresh-token";

/// A successful refresh as seen from the edge.
struct Refreshed {
    identity: Identity,
    access_token: String,
    refresh_token: Option<String>,
    set_cookies: Vec<HeaderValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    access_token: Option<String>,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn guard(Extension(state): Extension<Arc<EdgeState>>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let body = match read_body(body).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let path = parts.uri.path().to_string();
    let policy = state.policy();

    if policy.bypasses(&path) {
        return pass_through(&state, parts, body, Vec::new()).await;
    }

    // 1. presented access credential
    if let Some(token) = cookies::access_token(&parts.headers) {
        match state.tokens().verify_access_token(&token) {
            Ok(identity) => {
                return match policy.authorize(&path, identity.role) {
                    Decision::Allow => pass_through(&state, parts, body, Vec::new()).await,
                    Decision::Redirect(location) => redirect(location, Vec::new()),
                    Decision::Login => login(&state),
                };
            }
            Err(err) => debug!("access credential rejected: {err}"),
        }
    }

    // 2. exactly one refresh attempt
    if let Some(presented) = cookies::refresh_token(&parts.headers) {
        if let Some(refreshed) = refresh(&state, &presented).await {
            debug!(user_id = %refreshed.identity.user_id, "session refreshed at the edge");
            return match policy.authorize(&path, refreshed.identity.role) {
                Decision::Allow => {
                    substitute_credentials(&mut parts.headers, &refreshed);
                    pass_through(&state, parts, body, refreshed.set_cookies).await
                }
                Decision::Redirect(location) => redirect(location, refreshed.set_cookies),
                Decision::Login => login(&state),
            };
        }
    }

    // 3. no usable credential
    match policy.anonymous(&path) {
        Decision::Allow => pass_through(&state, parts, body, Vec::new()).await,
        Decision::Redirect(location) => redirect(location, Vec::new()),
        Decision::Login => login(&state),
    }
}

/// Ask the backend to rotate the presented refresh token.
async fn refresh(state: &EdgeState, presented: &str) -> Option<Refreshed> {
    let url = state.backend(REFRESH_PATH);
    let span = tracing::info_span!("http.upstream", http.method = "POST", url = %url);
    let response = match state
        .client()
        .post(&url)
        .header(COOKIE, format!("{REFRESH_TOKEN_COOKIE}={presented}"))
        .send()
        .instrument(span)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!("Refresh request failed: {err}");
            return None;
        }
    };

    if !response.status().is_success() {
        debug!("refresh rejected with {}", response.status());
        return None;
    }

    let set_cookies: Vec<HeaderValue> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .cloned()
        .collect();
    let from_cookie = |name: &str| {
        set_cookies
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|line| cookies::set_cookie_value(line, name))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let cookie_access = from_cookie(ACCESS_TOKEN_COOKIE);
    let refresh_token = from_cookie(REFRESH_TOKEN_COOKIE);

    let body_access = response
        .json::<RefreshBody>()
        .await
        .ok()
        .and_then(|body| body.access_token);
    let access_token = cookie_access.or(body_access)?;

    // The edge trusts only what it can verify itself.
    match state.tokens().verify_access_token(&access_token) {
        Ok(identity) => Some(Refreshed {
            identity,
            access_token,
            refresh_token,
            set_cookies,
        }),
        Err(err) => {
            error!("Backend issued an access token the edge cannot verify: {err}");
            None
        }
    }
}

/// Rewrite the upstream `Cookie` header so the frontend sees the new credentials.
/// A stale bearer header is rewritten too.
fn substitute_credentials(headers: &mut HeaderMap, refreshed: &Refreshed) {
    let current = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    let mut rewritten =
        cookies::replace_cookie(&current, ACCESS_TOKEN_COOKIE, &refreshed.access_token);
    if let Some(refresh_token) = &refreshed.refresh_token {
        rewritten = cookies::replace_cookie(&rewritten, REFRESH_TOKEN_COOKIE, refresh_token);
    }
    match HeaderValue::from_str(&rewritten) {
        Ok(value) => {
            headers.remove(COOKIE);
            headers.insert(COOKIE, value);
        }
        Err(err) => error!("Failed to rewrite Cookie header: {err}"),
    }

    if headers.contains_key(AUTHORIZATION) {
        headers.remove(AUTHORIZATION);
        match HeaderValue::from_str(&format!("Bearer {}", refreshed.access_token)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(err) => error!("Failed to rewrite Authorization header: {err}"),
        }
    }
}

/// Redirect, carrying any cookies minted by a refresh.
fn redirect(location: &str, set_cookies: Vec<HeaderValue>) -> Response {
    let mut response = Redirect::temporary(location).into_response();
    append_set_cookies(&mut response, set_cookies);
    response
}

/// Redirect to the login page and expire both credentials.
fn login(state: &EdgeState) -> Response {
    let cleared = match state.cookie_policy().clear_credentials() {
        Ok(cleared) => cleared.to_vec(),
        Err(err) => {
            error!("Failed to build clearing cookies: {err}");
            Vec::new()
        }
    };
    redirect(RoutePolicy::login_path(), cleared)
}

/// Forward the navigation request to the frontend.
async fn pass_through(
    state: &EdgeState,
    parts: Parts,
    body: Bytes,
    set_cookies: Vec<HeaderValue>,
) -> Response {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let url = state.frontend(path_and_query);
    let headers = filter_headers(&parts.headers, passthrough_header);

    match forward(state, parts.method, url, headers, body, passthrough_header).await {
        Ok(mut response) => {
            append_set_cookies(&mut response, set_cookies);
            response
        }
        Err(err) => {
            error!("Frontend request failed: {err}");
            bad_gateway()
        }
    }
}

fn append_set_cookies(response: &mut Response, set_cookies: Vec<HeaderValue>) {
    for cookie in set_cookies {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::token::Role;

    fn refreshed(refresh_token: Option<&str>) -> Refreshed {
        Refreshed {
            identity: Identity {
                user_id: Uuid::nil(),
                email: "ana@atelier.shop".to_string(),
                role: Role::User,
            },
            access_token: "new-access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            set_cookies: Vec::new(),
        }
    }

    #[test]
    fn substitute_rewrites_both_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=old; refreshToken=old-r"),
        );
        substitute_credentials(&mut headers, &refreshed(Some("new-r")));
        assert_eq!(
            headers.get(COOKIE).and_then(|v| v.to_str().ok()),
            Some("theme=dark; accessToken=new-access; refreshToken=new-r")
        );
    }

    #[test]
    fn substitute_merges_split_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("refreshToken=old-r"));
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        substitute_credentials(&mut headers, &refreshed(None));
        assert_eq!(headers.get_all(COOKIE).iter().count(), 1);
        assert_eq!(
            headers.get(COOKIE).and_then(|v| v.to_str().ok()),
            Some("refreshToken=old-r; theme=dark; accessToken=new-access")
        );
    }

    #[test]
    fn substitute_replaces_stale_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refreshToken=old-r"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer expired"));
        substitute_credentials(&mut headers, &refreshed(Some("new-r")));
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(
            headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer new-access")
        );
    }

    #[test]
    fn substitute_does_not_invent_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refreshToken=old-r"));
        substitute_credentials(&mut headers, &refreshed(None));
        assert!(headers.get(AUTHORIZATION).is_none());
    }
}
