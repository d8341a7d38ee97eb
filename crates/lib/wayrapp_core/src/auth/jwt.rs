//! JWT token generation and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets.
//! The codec is stateless; revocation is checked by callers through
//! [`super::revocation::RevokedTokenStore`].

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use crate::config::{ACCESS_SECRET_VAR, REFRESH_SECRET_VAR, Secret, SecurityConfig};
use crate::models::auth::{Principal, TokenClaims, TokenKind, TokenPair, TokenPayload};

/// `iss` claim on every token.
pub const ISSUER: &str = "wayrapp-api";

/// `aud` claim on every token.
pub const AUDIENCE: &str = "wayrapp-client";

/// Signs and verifies access/refresh tokens.
#[derive(Clone, Debug)]
pub struct TokenCodec {
    access_secret: Option<Secret>,
    refresh_secret: Option<Secret>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenCodec {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_lifetime: config.access_token_lifetime,
            refresh_lifetime: config.refresh_token_lifetime,
        }
    }

    fn secret(&self, kind: TokenKind) -> Result<&Secret, AuthError> {
        let (secret, var) = match kind {
            TokenKind::Access => (&self.access_secret, ACCESS_SECRET_VAR),
            TokenKind::Refresh => (&self.refresh_secret, REFRESH_SECRET_VAR),
        };
        secret
            .as_ref()
            .ok_or_else(|| AuthError::Configuration(format!("{var} is not set")))
    }

    /// Configured lifetime for `kind`.
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_lifetime,
            TokenKind::Refresh => self.refresh_lifetime,
        }
    }

    /// Sign a new token of `kind` for `payload`.
    pub fn issue(&self, kind: TokenKind, payload: &TokenPayload) -> Result<String, AuthError> {
        self.issue_at(kind, payload, Utc::now())
    }

    fn issue_at(
        &self,
        kind: TokenKind,
        payload: &TokenPayload,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let secret = self.secret(kind)?;
        let expires_at = now
            .checked_add_signed(self.lifetime(kind))
            .ok_or_else(|| AuthError::Internal(format!("{kind} token expiry out of range")))?;
        let claims = TokenClaims {
            sub: payload.subject_id.clone(),
            email: payload.email.clone(),
            role: payload.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            jti: Uuid::now_v7().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose()),
        )
        .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Mint a fresh access + refresh pair for the same identity.
    pub fn issue_pair(&self, payload: &TokenPayload) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, payload)?,
            refresh_token: self.issue(TokenKind::Refresh, payload)?,
            expires_in: self.access_lifetime.num_seconds(),
        })
    }

    /// Verify signature, issuer, audience and expiry of a `kind` token.
    ///
    /// A token whose signature checks out but whose `exp` has passed yields
    /// [`AuthError::ExpiredToken`]; every other defect is
    /// [`AuthError::InvalidToken`].
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Principal, AuthError> {
        let secret = self.secret(kind)?;
        let key = DecodingKey::from_secret(secret.expose());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);

        match decode::<TokenClaims>(token, &key, &validation) {
            Ok(data) => Ok(Principal::from_claims(data.claims)),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!(%kind, "token expired");
                    Err(AuthError::ExpiredToken)
                }
                other => {
                    debug!(%kind, reason = ?other, "token rejected");
                    Err(AuthError::InvalidToken)
                }
            },
        }
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
///
/// Absent headers, other schemes and empty tokens all give `None`; whether
/// that is fatal is the caller's decision.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}
