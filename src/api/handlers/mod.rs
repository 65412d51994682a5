//! API handlers for the token authority.

pub mod auth;
pub mod health;
