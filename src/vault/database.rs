use crate::{cli::globals::GlobalArgs, vault};
use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{info_span, instrument, Instrument};

pub const DB_CREDS_PATH: &str = "/v1/database/creds/atelier";

fn field<'a>(json: &'a Value, pointer: &str, name: &str) -> Result<&'a Value> {
    json.pointer(pointer)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no {name} found"))
}

/// Fetch dynamic database credentials and record them, with their lease, in
/// `globals`.
///
/// # Errors
/// Returns an error if the request fails or the response is missing fields.
#[instrument(skip(globals))]
pub async fn database_creds(globals: &mut GlobalArgs) -> Result<()> {
    let db_creds = vault::endpoint_url(&globals.vault_url, DB_CREDS_PATH)?;

    let span = info_span!("vault.database_creds", http.method = "GET", url = %db_creds);
    let response = vault::client()?
        .get(&db_creds)
        .header("X-Vault-Token", globals.vault_token.expose_secret())
        .send()
        .instrument(span)
        .await?;

    let json_response = vault::check_response(&db_creds, response).await?;

    let lease_id = field(&json_response, "/lease_id", "lease_id")?
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing JSON response: lease_id is not a string"))?;
    let lease_duration = field(&json_response, "/lease_duration", "lease_duration")?
        .as_u64()
        .ok_or_else(|| anyhow!("Error parsing JSON response: lease_duration is not a number"))?;
    let username = field(&json_response, "/data/username", "username")?
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing JSON response: username is not a string"))?;
    let password = field(&json_response, "/data/password", "password")?
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing JSON response: password is not a string"))?;

    globals.vault_db_lease_id = lease_id.to_string();
    globals.vault_db_lease_duration = lease_duration;
    globals.vault_db_username = username.to_string();
    globals.vault_db_password = SecretString::from(password.to_string());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    #[tokio::test]
    async fn creds_are_stored_in_globals() -> Result<()> {
        let router = Router::new().route(
            DB_CREDS_PATH,
            get(|| async {
                Json(json!({
                    "lease_id": "database/creds/atelier/abc",
                    "lease_duration": 3600,
                    "data": {"username": "v-atelier-abc", "password": "pw"}
                }))
            }),
        );
        let base = vault::test_support::serve(router).await?;

        let mut globals = GlobalArgs::new(format!("{base}/v1/auth/approle/login"));
        globals.set_token(SecretString::from("s.token".to_string()));
        database_creds(&mut globals).await?;

        assert_eq!(globals.vault_db_lease_id, "database/creds/atelier/abc");
        assert_eq!(globals.vault_db_lease_duration, 3600);
        assert_eq!(globals.vault_db_username, "v-atelier-abc");
        assert_eq!(globals.vault_db_password.expose_secret(), "pw");
        Ok(())
    }

    #[tokio::test]
    async fn missing_password_is_an_error() -> Result<()> {
        let router = Router::new().route(
            DB_CREDS_PATH,
            get(|| async {
                Json(json!({
                    "lease_id": "l",
                    "lease_duration": 1,
                    "data": {"username": "u"}
                }))
            }),
        );
        let base = vault::test_support::serve(router).await?;

        let mut globals = GlobalArgs::new(base);
        let result = database_creds(&mut globals).await;
        assert!(result.is_err());
        assert!(globals.vault_db_username.is_empty());
        Ok(())
    }
}
