//! Auth handlers and supporting modules.
//!
//! This module owns the session lifecycle: registration, password login,
//! refresh-token rotation, logout and role-gated reads.
//!
//! ## Credentials
//!
//! - **Access token:** HS256 JWT, 15 minutes by default, in the `accessToken`
//!   cookie or `Authorization: Bearer`. Verified locally, never revoked.
//! - **Refresh token:** opaque, 7 days by default, in the `refreshToken`
//!   cookie. Only its SHA-256 hash is stored, on the user row, so each user has
//!   at most one live refresh token. Every refresh rotates it.
//!
//! Neither token is ever written to a response body at login.

pub(crate) mod error;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod me;
mod memory;
mod password;
pub(crate) mod principal;
pub(crate) mod refresh;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
pub(crate) mod users;
mod utils;

pub use error::AuthError;
pub use memory::MemoryUserStore;
pub use session::TokenPair;
pub use state::{AuthConfig, AuthState};
pub use storage::{InsertOutcome, NewUser, PgUserStore, UserRecord, UserStore};

#[cfg(test)]
mod tests;
