//! Auth handler tests against the in-memory store.

use super::{AuthConfig, AuthState, MemoryUserStore};
use crate::{api, token::cookies::Environment};
use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(environment: Environment) -> Result<Router> {
    let state = AuthState::new(
        AuthConfig::new("http://localhost:3000".to_string()).with_environment(environment),
        &SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
        Arc::new(MemoryUserStore::new()),
    )?;
    api::router(Arc::new(state))
}

fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Vec<String>, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, cookies, body))
}

fn register_body(email: &str) -> Value {
    json!({"name": "Ana", "email": email, "password": "correct-horse"})
}

#[tokio::test]
async fn register_creates_user() -> Result<()> {
    let app = app(Environment::Development)?;
    let (status, cookies, body) = send(
        &app,
        post_json("/api/auth/register", &register_body("ana@atelier.shop"))?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["userId"].as_str().is_some());
    assert!(cookies.is_empty());
    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_after_normalization() -> Result<()> {
    let app = app(Environment::Development)?;
    send(
        &app,
        post_json("/api/auth/register", &register_body("ana@atelier.shop"))?,
    )
    .await?;
    let (status, _, body) = send(
        &app,
        post_json("/api/auth/register", &register_body("  ANA@Atelier.shop "))?,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn register_validates_input() -> Result<()> {
    let app = app(Environment::Development)?;
    for payload in [
        json!({"name": "", "email": "ana@atelier.shop", "password": "correct-horse"}),
        json!({"name": "Ana", "email": "not-an-email", "password": "correct-horse"}),
        json!({"name": "Ana", "email": "ana@atelier.shop", "password": "short"}),
    ] {
        let (status, _, body) = send(&app, post_json("/api/auth/register", &payload)?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["success"], false);
    }

    let missing = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register")
        .body(Body::empty())?;
    let (status, _, _) = send(&app, missing).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn login_accepts_differently_cased_email() -> Result<()> {
    let app = app(Environment::Development)?;
    send(
        &app,
        post_json("/api/auth/register", &register_body("ana@atelier.shop"))?,
    )
    .await?;
    let (status, cookies, body) = send(
        &app,
        post_json(
            "/api/auth/login",
            &json!({"email": "Ana@Atelier.Shop", "password": "correct-horse"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@atelier.shop");
    assert_eq!(body["user"]["role"], "USER");
    assert!(body.get("accessToken").is_none());
    assert!(body.get("refreshToken").is_none());
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("SameSite=Lax")));
    Ok(())
}

#[tokio::test]
async fn production_login_sets_secure_cross_site_cookies() -> Result<()> {
    let app = app(Environment::Production)?;
    send(
        &app,
        post_json("/api/auth/register", &register_body("ana@atelier.shop"))?,
    )
    .await?;
    let (_, cookies, _) = send(
        &app,
        post_json(
            "/api/auth/login",
            &json!({"email": "ana@atelier.shop", "password": "correct-horse"}),
        )?,
    )
    .await?;
    assert_eq!(cookies.len(), 2);
    assert!(cookies
        .iter()
        .all(|c| c.contains("SameSite=None") && c.contains("Secure") && c.contains("HttpOnly")));
    Ok(())
}

#[tokio::test]
async fn unknown_email_is_invalid_credentials() -> Result<()> {
    let app = app(Environment::Development)?;
    let (status, cookies, body) = send(
        &app,
        post_json(
            "/api/auth/login",
            &json!({"email": "ghost@atelier.shop", "password": "correct-horse"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
    assert!(cookies.is_empty());
    Ok(())
}

#[tokio::test]
async fn me_requires_credential() -> Result<()> {
    let app = app(Environment::Development)?;
    let request = Request::builder().uri("/api/auth/me").body(Body::empty())?;
    let (status, _, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(COOKIE, "accessToken=forged")
        .body(Body::empty())?;
    let (status, _, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn me_returns_profile_from_cookie() -> Result<()> {
    let app = app(Environment::Development)?;
    send(
        &app,
        post_json("/api/auth/register", &register_body("ana@atelier.shop"))?,
    )
    .await?;
    let (_, cookies, _) = send(
        &app,
        post_json(
            "/api/auth/login",
            &json!({"email": "ana@atelier.shop", "password": "correct-horse"}),
        )?,
    )
    .await?;
    let access = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .and_then(|c| c.split(';').next())
        .context("missing access cookie")?;

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(COOKIE, access)
        .body(Body::empty())?;
    let (status, _, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ana");
    assert!(body["user"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn logout_without_session_still_clears_cookies() -> Result<()> {
    let app = app(Environment::Development)?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .body(Body::empty())?;
    let (status, cookies, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_and_echoed() -> Result<()> {
    let app = app(Environment::Development)?;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty())?)
        .await?;
    let generated = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .context("missing x-request-id")?;
    assert_eq!(generated.len(), 26);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("x-request-id", "req-42")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
    Ok(())
}
