//! # wayrapp_core
//!
//! Security core for the WayrApp API: credential tokens, password hashing,
//! role/permission decisions, input sanitization and security event logging.
//!
//! Nothing in this crate knows about HTTP. `wayrapp_api` wires these pieces
//! into axum middleware.

pub mod auth;
pub mod config;
pub mod migrate;
pub mod models;
pub mod sanitize;
pub mod security_log;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
