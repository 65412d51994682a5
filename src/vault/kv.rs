use crate::{cli::globals::GlobalArgs, token::MIN_SECRET_LEN, vault};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{info_span, instrument, Instrument};

const JWT_SECRET_FIELD: &str = "jwt_secret";

/// Read the access-token signing secret from a KV-v2 mount.
///
/// # Errors
/// Returns an error if the request fails, the field is missing, or the secret
/// is too short to sign with.
#[instrument(skip(globals))]
pub async fn read_jwt_secret(
    globals: &GlobalArgs,
    kv_mount: &str,
    kv_path: &str,
) -> Result<SecretString> {
    let path = format!("/v1/{kv_mount}/data/{kv_path}");
    let url = vault::endpoint_url(&globals.vault_url, &path)?;

    let span = info_span!("vault.kv.read", http.method = "GET", url = %url);
    let response = vault::client()?
        .get(&url)
        .header("X-Vault-Token", globals.vault_token.expose_secret())
        .send()
        .instrument(span)
        .await?;

    let json = vault::check_response(&url, response).await?;

    let secret = json
        .get("data")
        .and_then(|data| data.get("data"))
        .and_then(|data| data.get(JWT_SECRET_FIELD))
        .and_then(Value::as_str)
        .context("jwt secret missing from vault response")?;

    if secret.len() < MIN_SECRET_LEN {
        return Err(anyhow!(
            "jwt secret from vault is {} bytes, expected at least {MIN_SECRET_LEN}",
            secret.len()
        ));
    }

    Ok(SecretString::from(secret.to_string()))
}
