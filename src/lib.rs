//! # Atelier (Session & Token Authority)
//!
//! `atelier` issues and rotates the credentials of the Atelier storefront and
//! guards navigation to the storefront frontend.
//!
//! ## Binaries
//!
//! - `atelier server`: the token authority API (`/api/auth/*`) backed by
//!   PostgreSQL.
//! - `atelier edge`: the gateway browsers talk to. It proxies `/api/*` to the
//!   server and puts a role-aware route guard in front of the frontend.
//!
//! ## Credentials
//!
//! A short-lived HS256 access token and a long-lived opaque refresh token, both
//! in `HttpOnly` cookies. Each user holds at most one live refresh token;
//! every refresh rotates it in a single conditional `UPDATE`, so a reused or
//! raced token is rejected. Access tokens are not revocable and stay valid
//! until they expire.

pub mod api;
pub mod cli;
pub mod edge;
pub mod token;
pub mod vault;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
