//! PostgreSQL-backed revoked-token store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::revocation::RevokedTokenStore;

/// Revoked token ids kept in the `revoked_tokens` table.
#[derive(Debug, Clone)]
pub struct PgRevokedTokenStore {
    pool: PgPool,
}

impl PgRevokedTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevokedTokenStore for PgRevokedTokenStore {
    async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_id = $1)",
        )
        .bind(token_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (token_id, expires_at) VALUES ($1, $2) \
             ON CONFLICT (token_id) DO NOTHING",
        )
        .bind(token_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
