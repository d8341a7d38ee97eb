//! Revoked-token storage.
//!
//! The token codec is stateless. Callers that accept refresh tokens consult a
//! [`RevokedTokenStore`] before treating one as valid, and revoke the old
//! token when rotating.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::AuthError;

/// Persistence for revoked token ids (`jti`).
#[async_trait]
pub trait RevokedTokenStore: Send + Sync {
    async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError>;

    /// Mark `token_id` revoked until `expires_at`, after which the token would
    /// be rejected for expiry anyway.
    ///
    /// Returns `true` only for the call that actually revoked the token, so
    /// concurrent rotations of one refresh token cannot both succeed.
    async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<bool, AuthError>;

    /// Drop entries whose token has expired. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, AuthError>;
}

/// Process-local store. Revocations are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRevokedTokenStore {
    revoked: DashMap<String, DateTime<Utc>>,
}

impl MemoryRevokedTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

#[async_trait]
impl RevokedTokenStore for MemoryRevokedTokenStore {
    async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        Ok(self.revoked.contains_key(token_id))
    }

    async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<bool, AuthError> {
        Ok(self
            .revoked
            .insert(token_id.to_string(), expires_at)
            .is_none())
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let before = self.revoked.len();
        self.revoked.retain(|_, expires_at| *expires_at > now);
        Ok(before.saturating_sub(self.revoked.len()) as u64)
    }
}
