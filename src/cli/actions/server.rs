use crate::{
    api::{self, AuthConfig, AuthState, PgUserStore},
    cli::{commands::vault::Options as VaultOptions, globals::GlobalArgs},
    token::cookies::Environment,
    vault,
};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: Option<SecretString>,
    pub environment: Environment,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub vault: Option<VaultOptions>,
}

/// Log in with AppRole; a wrapped token is unwrapped into the secret id first.
async fn vault_login(options: &VaultOptions) -> Result<GlobalArgs> {
    let mut globals = GlobalArgs::new(options.url.clone());

    let secret_id = if let Some(wrapped) = &options.wrapped_token {
        vault::unwrap(&globals.vault_url, wrapped).await?
    } else {
        options
            .secret_id
            .clone()
            .ok_or_else(|| anyhow!("Vault secret-id is required"))?
    };

    let (token, _) = vault::approle_login(&globals.vault_url, &secret_id, &options.role_id).await?;
    globals.set_token(SecretString::from(token));

    Ok(globals)
}

/// Put the Vault-issued database username and password into the DSN.
fn inject_db_credentials(dsn: &str, globals: &GlobalArgs) -> Result<String> {
    let mut dsn = Url::parse(dsn).context("invalid database DSN")?;

    dsn.set_username(&globals.vault_db_username)
        .map_err(|()| anyhow!("Error setting username"))?;

    dsn.set_password(Some(globals.vault_db_password.expose_secret()))
        .map_err(|()| anyhow!("Error setting password"))?;

    Ok(dsn.to_string())
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if Vault login fails, the signing secret or the database
/// credentials cannot be obtained, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    // The sender must outlive the server: a closed channel reads as shutdown.
    let (tx, rx) = mpsc::unbounded_channel();

    let (dsn, jwt_secret) = if let Some(options) = &args.vault {
        let mut globals = vault_login(options).await?;

        let jwt_secret = match args.jwt_secret {
            Some(secret) => secret,
            None => vault::kv::read_jwt_secret(&globals, &options.kv_mount, &options.kv_path)
                .await
                .context("Could not read the JWT signing secret from Vault")?,
        };

        vault::database::database_creds(&mut globals)
            .await
            .context("Could not get database username and password")?;

        debug!("Global args: {:?}", globals);

        vault::renew::try_renew(&globals, tx.clone()).await?;

        (inject_db_credentials(&args.dsn, &globals)?, jwt_secret)
    } else {
        let jwt_secret = args
            .jwt_secret
            .context("missing required argument: --jwt-secret")?;
        (args.dsn, jwt_secret)
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let config = AuthConfig::new(args.frontend_base_url)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_environment(args.environment);

    info!(environment = ?args.environment, "starting token authority");

    let store = Arc::new(PgUserStore::new(pool.clone()));
    let auth_state = Arc::new(
        AuthState::new(config, &jwt_secret, store).context("Invalid JWT signing secret")?,
    );

    let result = api::new(args.port, pool, auth_state, rx).await;
    drop(tx);
    result
}
