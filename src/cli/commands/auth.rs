use crate::token::cookies::Environment;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

fn parse_environment(value: &str) -> Result<Environment, String> {
    value.parse()
}

/// Signing secret and deployment mode, shared by `server` and `edge`.
#[must_use]
pub fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing secret for access tokens (at least 32 bytes)")
                .env("ATELIER_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment mode: production sends Secure, SameSite=None cookies")
                .env("ATELIER_ENVIRONMENT")
                .default_value("development")
                .value_parser(parse_environment),
        )
}

/// Token lifetimes and the browser origin of the storefront.
#[must_use]
pub fn with_args(command: Command) -> Command {
    with_secret_args(command)
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token TTL in seconds")
                .env("ATELIER_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token TTL in seconds")
                .env("ATELIER_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Browser origin allowed by CORS (the edge URL)")
                .env("ATELIER_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
}

#[derive(Debug)]
pub struct SecretOptions {
    pub jwt_secret: Option<SecretString>,
    pub environment: Environment,
}

impl SecretOptions {
    /// # Errors
    /// Returns an error if the environment is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            jwt_secret: matches
                .get_one::<String>(ARG_JWT_SECRET)
                .map(|secret| SecretString::from(secret.clone())),
            environment: matches
                .get_one::<Environment>(ARG_ENVIRONMENT)
                .copied()
                .context("missing required argument: --environment")?,
        })
    }
}

#[derive(Debug)]
pub struct Options {
    pub secrets: SecretOptions,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub frontend_base_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            secrets: SecretOptions::parse(matches)?,
            access_token_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .context("missing required argument: --access-token-ttl-seconds")?,
            refresh_token_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .context("missing required argument: --refresh-token-ttl-seconds")?,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
        })
    }
}
