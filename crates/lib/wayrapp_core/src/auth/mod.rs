//! Authentication and authorization logic.
//!
//! Provides token signing/verification, password hashing, the role
//! permission table, authorization decisions and revoked-token storage that
//! `wayrapp_api` composes into its request pipeline.

pub mod gates;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod queries;
pub mod revocation;

use thiserror::Error;

use crate::config::ConfigError;

/// Authentication and authorization errors. Every variant denies.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential (401).
    #[error("{0}")]
    Authentication(String),

    /// Valid credential, not allowed (403).
    #[error("{0}")]
    Authorization(String),

    /// Operator misconfiguration. The message is for the server log only.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for AuthError {
    fn from(e: ConfigError) -> Self {
        AuthError::Configuration(e.to_string())
    }
}
