use super::auth;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_FRONTEND_URL: &str = "frontend-url";

/// `atelier edge`: the gateway in front of the API and the frontend.
#[must_use]
pub fn command() -> Command {
    let command = Command::new("edge")
        .about("Route guard and API proxy in front of the storefront")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("3000")
                .env("ATELIER_EDGE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Base URL of the token authority API")
                .env("ATELIER_BACKEND_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Base URL of the storefront frontend")
                .env("ATELIER_FRONTEND_URL")
                .default_value("http://localhost:3001"),
        );

    auth::with_secret_args(command)
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub backend_url: String,
    pub frontend_url: String,
    pub secrets: auth::SecretOptions,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            port: matches.get_one::<u16>("port").copied().unwrap_or(3000),
            backend_url: matches
                .get_one::<String>(ARG_BACKEND_URL)
                .cloned()
                .context("missing required argument: --backend-url")?,
            frontend_url: matches
                .get_one::<String>(ARG_FRONTEND_URL)
                .cloned()
                .context("missing required argument: --frontend-url")?,
            secrets: auth::SecretOptions::parse(matches)?,
        })
    }
}
