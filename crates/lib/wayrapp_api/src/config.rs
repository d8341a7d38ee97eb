//! API server configuration.

use wayrapp_core::config::{ConfigError, SecurityConfig};

/// Default cap on buffered JSON bodies (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// PostgreSQL connection URL. Without it revoked tokens are kept in memory.
    pub database_url: Option<String>,
    /// Largest request body the sanitizer will buffer.
    pub max_body_bytes: usize,
    /// Take the client address from `X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Token and password settings.
    pub security: SecurityConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable         | Default            |
    /// |------------------|--------------------|
    /// | `BIND_ADDR`      | `127.0.0.1:3000`   |
    /// | `DATABASE_URL`   | unset (in-memory)  |
    /// | `MAX_BODY_BYTES` | `1048576`          |
    /// | `TRUST_PROXY`    | `false`            |
    ///
    /// Security variables are documented on [`SecurityConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_body_bytes = match std::env::var("MAX_BODY_BYTES") {
            Err(_) => DEFAULT_MAX_BODY_BYTES,
            Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "MAX_BODY_BYTES",
                reason: format!("'{raw}' is not a byte count"),
            })?,
        };

        let trust_forwarded_for = match std::env::var("TRUST_PROXY") {
            Err(_) => false,
            Ok(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: "TRUST_PROXY",
                reason: format!("'{raw}' is not a boolean"),
            })?,
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into()),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            max_body_bytes,
            trust_forwarded_for,
            security: SecurityConfig::from_env()?,
        })
    }

    /// Configuration for tests and embedding: given secrets, defaults elsewhere.
    pub fn with_secrets(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            trust_forwarded_for: false,
            security: SecurityConfig::with_secrets(access, refresh),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
