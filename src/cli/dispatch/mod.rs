//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{edge, server, Action};
use crate::cli::commands::{auth, edge as edge_command, vault};
use anyhow::{anyhow, Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("server", sub_m)) => server_action(sub_m),
        Some(("edge", sub_m)) => edge_action(sub_m),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn server_action(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let vault_opts = vault::Options::parse(matches)?;

    // Without Vault the signing secret has to come from the command line.
    if vault_opts.is_none() && auth_opts.secrets.jwt_secret.is_none() {
        return Err(anyhow!(
            "missing required argument: --{} (or configure Vault)",
            auth::ARG_JWT_SECRET
        ));
    }

    Ok(Action::Server(server::Args {
        port,
        dsn,
        jwt_secret: auth_opts.secrets.jwt_secret,
        environment: auth_opts.secrets.environment,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        vault: vault_opts,
    }))
}

fn edge_action(matches: &clap::ArgMatches) -> Result<Action> {
    let options = edge_command::Options::parse(matches)?;
    let jwt_secret = options
        .secrets
        .jwt_secret
        .with_context(|| format!("missing required argument: --{}", auth::ARG_JWT_SECRET))?;

    Ok(Action::Edge(edge::Args {
        port: options.port,
        backend_url: options.backend_url,
        frontend_url: options.frontend_url,
        jwt_secret,
        environment: options.secrets.environment,
    }))
}
