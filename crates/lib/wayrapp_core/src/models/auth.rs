//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! bodies (which use camelCase on the wire).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    ContentCreator,
    Admin,
}

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Role; 3] = [Role::Student, Role::ContentCreator, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::ContentCreator => "content_creator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Which of the two credential kinds a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived, presented on every request.
    Access,
    /// Long-lived, only exchanged for a new pair.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Identity data signed into a new token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub subject_id: String,
    pub email: String,
    pub role: Role,
}

/// JWT claims embedded in both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    /// User email.
    pub email: String,
    /// User role.
    pub role: Role,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Token ID, consulted by the revoked-token store.
    pub jti: String,
}

/// The authenticated identity attached to a request.
///
/// Only produced by [`crate::auth::jwt::TokenCodec::verify`]; there is no
/// public constructor taking raw fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject_id: String,
    email: String,
    role: Role,
    issued_at: i64,
    expires_at: i64,
    token_id: String,
}

impl Principal {
    pub(crate) fn from_claims(claims: TokenClaims) -> Self {
        Self {
            subject_id: claims.sub,
            email: claims.email,
            role: claims.role,
            issued_at: claims.iat,
            expires_at: claims.exp,
            token_id: claims.jti,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Issued at (unix seconds).
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Expiry (unix seconds).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// The payload needed to mint a fresh token for the same identity.
    pub fn payload(&self) -> TokenPayload {
        TokenPayload {
            subject_id: self.subject_id.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// An access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
