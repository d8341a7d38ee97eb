//! Database migration support.
//!
//! Embeds and runs SQL migrations from `wayrapp_core/migrations/`. Only the
//! revoked-token table lives here; content tables belong to the main API.

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
