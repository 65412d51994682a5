//! Vault AppRole login, KV secrets, dynamic database credentials and lease
//! renewal.

pub mod database;
pub mod kv;
pub mod renew;

use crate::APP_USER_AGENT;
use anyhow::{anyhow, Result};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info_span, instrument, Instrument};
use url::Url;

pub(crate) fn client() -> Result<Client> {
    Ok(Client::builder().user_agent(APP_USER_AGENT).build()?)
}

fn vault_error_message(json_response: &Value) -> &str {
    json_response
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Turn a non-success response into an error carrying Vault's first message.
pub(crate) async fn check_response(url: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let json_response: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        return Err(anyhow!(
            "{} - {}, {}",
            url,
            status,
            vault_error_message(&json_response)
        ));
    }

    Ok(json_response)
}

/// Base of `url` (scheme, host, port) joined with `path`.
///
/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or uses an unsupported scheme.
pub fn endpoint_url(url: &str, path: &str) -> Result<String> {
    let url = Url::parse(url)?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
        },
    };

    let endpoint_url = format!("{scheme}://{host}:{port}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}

/// Unwrap a response-wrapped secret id.
/// Create one with:
/// vault write -wrap-ttl=300s -f auth/approle/role/atelier/secret-id
///
/// # Errors
/// Returns an error if the request fails or the response has no `secret_id`.
#[instrument(skip(token))]
pub async fn unwrap(url: &str, token: &str) -> Result<String> {
    let unwrap_url = endpoint_url(url, "/v1/sys/wrapping/unwrap")?;

    let span = info_span!("vault.unwrap", http.method = "POST", url = %unwrap_url);
    let response = client()?
        .post(&unwrap_url)
        .header("X-Vault-Token", token)
        .send()
        .instrument(span)
        .await?;

    let json_response = check_response(&unwrap_url, response).await?;

    json_response
        .get("data")
        .and_then(|data| data.get("secret_id"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no secret_id found"))
}

/// Log in with AppRole; `url` is the full login URL.
///
/// Returns the client token and its lease duration.
///
/// # Errors
/// Returns an error if the request fails or the response has no `client_token`.
#[instrument(skip(sid))]
pub async fn approle_login(url: &str, sid: &str, rid: &str) -> Result<(String, u64)> {
    let login_payload = json!({
        "role_id": rid,
        "secret_id": sid
    });

    let span = info_span!("vault.approle_login", http.method = "POST", url = %url);
    let response = client()?
        .post(url)
        .json(&login_payload)
        .send()
        .instrument(span)
        .await?;

    let json_response = check_response(url, response).await?;

    let token = json_response
        .get("auth")
        .and_then(|auth| auth.get("client_token"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no client_token found"))?;

    let lease_duration = json_response
        .get("auth")
        .and_then(|auth| auth.get("lease_duration"))
        .and_then(Value::as_u64)
        .unwrap_or(1800);

    Ok((token.to_string(), lease_duration))
}

/// Renew our own token; returns the new lease duration.
///
/// # Errors
/// Returns an error if Vault refuses the renewal.
#[instrument(skip(token))]
pub async fn renew_token(url: &str, token: &SecretString, increment: Option<u64>) -> Result<u64> {
    let renew_url = endpoint_url(url, "/v1/auth/token/renew-self")?;

    let payload = json!({
        "increment": increment.unwrap_or(0)
    });

    let span = info_span!("vault.renew_token", http.method = "POST", url = %renew_url);
    let response = client()?
        .post(&renew_url)
        .json(&payload)
        .header("X-Vault-Token", token.expose_secret())
        .send()
        .instrument(span)
        .await?;

    let json_response = check_response(&renew_url, response).await?;

    json_response
        .get("auth")
        .and_then(|auth| auth.get("lease_duration"))
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no lease_duration found"))
}

/// Renew the dynamic database credential lease.
///
/// # Errors
/// Returns an error if Vault refuses the renewal.
#[instrument(skip(token))]
pub async fn renew_db_lease(
    url: &str,
    token: &SecretString,
    lease_id: &str,
    increment: u64,
) -> Result<u64> {
    let renew_url = endpoint_url(url, "/v1/sys/leases/renew")?;

    let payload = json!({
        "increment": increment,
        "lease_id": lease_id
    });

    let span = info_span!("vault.renew_db_lease", http.method = "POST", url = %renew_url);
    let response = client()?
        .post(&renew_url)
        .json(&payload)
        .header("X-Vault-Token", token.expose_secret())
        .send()
        .instrument(span)
        .await?;

    let json_response = check_response(&renew_url, response).await?;

    json_response
        .get("lease_duration")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no lease_duration found"))
}
