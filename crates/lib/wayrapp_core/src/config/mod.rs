//! Security configuration: signing secrets, token lifetimes, bcrypt cost.
//!
//! Read once at process start and shared immutably afterwards.

pub mod validation;

use std::fmt;

use chrono::Duration;
use thiserror::Error;

use self::validation::parse_lifetime;

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: &str = "15m";

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: &str = "7d";

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Environment variable holding the access-token signing secret.
pub const ACCESS_SECRET_VAR: &str = "JWT_SECRET";

/// Environment variable holding the refresh-token signing secret.
pub const REFRESH_SECRET_VAR: &str = "JWT_REFRESH_SECRET";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingSecret(&'static str),

    #[error("JWT_SECRET and JWT_REFRESH_SECRET must differ")]
    SharedSecret,

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// A signing secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Token and password settings for the security core.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Access-token signing secret (`JWT_SECRET`).
    pub access_secret: Option<Secret>,
    /// Refresh-token signing secret (`JWT_REFRESH_SECRET`).
    pub refresh_secret: Option<Secret>,
    /// Access-token lifetime.
    pub access_token_lifetime: Duration,
    /// Refresh-token lifetime.
    pub refresh_token_lifetime: Duration,
    /// bcrypt cost factor.
    pub bcrypt_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            access_secret: None,
            refresh_secret: None,
            access_token_lifetime: Duration::minutes(15),
            refresh_token_lifetime: Duration::days(7),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl SecurityConfig {
    /// Build a config with both secrets set and default lifetimes.
    pub fn with_secrets(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_secret: Some(Secret::new(access)),
            refresh_secret: Some(Secret::new(refresh)),
            ..Self::default()
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                 | Default |
    /// |--------------------------|---------|
    /// | `JWT_SECRET`             | unset   |
    /// | `JWT_REFRESH_SECRET`     | unset   |
    /// | `JWT_EXPIRES_IN`         | `15m`   |
    /// | `JWT_REFRESH_EXPIRES_IN` | `7d`    |
    /// | `BCRYPT_ROUNDS`          | `12`    |
    ///
    /// Missing secrets are not an error here; call [`SecurityConfig::validate`]
    /// before serving traffic.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`SecurityConfig::from_env`] but reads through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .map(Secret::new)
        };

        let access_lifetime = lookup("JWT_EXPIRES_IN")
            .unwrap_or_else(|| DEFAULT_ACCESS_TOKEN_LIFETIME.into());
        let refresh_lifetime = lookup("JWT_REFRESH_EXPIRES_IN")
            .unwrap_or_else(|| DEFAULT_REFRESH_TOKEN_LIFETIME.into());

        let bcrypt_cost = match lookup("BCRYPT_ROUNDS") {
            None => DEFAULT_BCRYPT_COST,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "BCRYPT_ROUNDS",
                reason: format!("'{raw}' is not an integer"),
            })?,
        };

        Ok(Self {
            access_secret: secret(ACCESS_SECRET_VAR),
            refresh_secret: secret(REFRESH_SECRET_VAR),
            access_token_lifetime: parse_lifetime("JWT_EXPIRES_IN", &access_lifetime)?,
            refresh_token_lifetime: parse_lifetime("JWT_REFRESH_EXPIRES_IN", &refresh_lifetime)?,
            bcrypt_cost,
        })
    }

    /// Startup check: both secrets present and distinct, lifetimes usable,
    /// bcrypt cost in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let access = self
            .access_secret
            .as_ref()
            .ok_or(ConfigError::MissingSecret(ACCESS_SECRET_VAR))?;
        let refresh = self
            .refresh_secret
            .as_ref()
            .ok_or(ConfigError::MissingSecret(REFRESH_SECRET_VAR))?;
        if access == refresh {
            return Err(ConfigError::SharedSecret);
        }
        validation::check_lifetime("JWT_EXPIRES_IN", self.access_token_lifetime)?;
        validation::check_lifetime("JWT_REFRESH_EXPIRES_IN", self.refresh_token_lifetime)?;
        validation::check_bcrypt_cost(self.bcrypt_cost)?;
        Ok(())
    }
}
