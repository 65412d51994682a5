use crate::{edge, token::cookies::Environment};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub frontend_url: String,
    pub jwt_secret: SecretString,
    pub environment: Environment,
}

/// Execute the edge action.
///
/// # Errors
/// Returns an error if the upstream URLs or the secret are invalid, or the
/// listener fails.
pub async fn execute(args: Args) -> Result<()> {
    let state = edge::EdgeState::new(
        &args.jwt_secret,
        &args.backend_url,
        &args.frontend_url,
        args.environment,
    )
    .context("Failed to configure the edge gateway")?;

    info!(
        backend = %args.backend_url,
        frontend = %args.frontend_url,
        "starting edge gateway"
    );

    edge::new(args.port, Arc::new(state)).await
}
