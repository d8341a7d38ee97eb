//! Token lifecycle service: refresh rotation, logout and revocation upkeep.
//!
//! Refresh tokens are single-use: a successful refresh revokes the presented
//! token's `jti` before issuing the new pair.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use wayrapp_core::auth::AuthError;
use wayrapp_core::models::auth::{Principal, TokenKind};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{LogoutResponse, PurgeResponse, TokenResponse};

pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
pub const REFRESH_TOKEN_EXPIRED: &str = "Refresh token expired";
pub const REFRESH_TOKEN_REVOKED: &str = "Refresh token revoked";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn verify_refresh(state: &AppState, token: &str) -> AppResult<Principal> {
    state
        .codec
        .verify(TokenKind::Refresh, token)
        .map_err(|e| match e {
            AuthError::ExpiredToken => AppError::Unauthorized(REFRESH_TOKEN_EXPIRED.into()),
            AuthError::InvalidToken => AppError::Unauthorized(INVALID_REFRESH_TOKEN.into()),
            other => AppError::from(other),
        })
}

/// When the store may forget `principal`'s token id.
fn revocation_horizon(state: &AppState, principal: &Principal) -> DateTime<Utc> {
    DateTime::from_timestamp(principal.expires_at(), 0)
        .unwrap_or_else(|| Utc::now() + state.codec.lifetime(TokenKind::Refresh))
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// Exchange a refresh token for a new token pair, revoking the old one.
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<TokenResponse> {
    let principal = verify_refresh(state, refresh_token)?;

    if state.revoked.is_revoked(principal.token_id()).await? {
        info!(subject_id = %principal.subject_id(), "revoked refresh token presented");
        return Err(AppError::Unauthorized(REFRESH_TOKEN_REVOKED.into()));
    }
    // Lost a race with a concurrent refresh of the same token.
    if !state
        .revoked
        .revoke(principal.token_id(), revocation_horizon(state, &principal))
        .await?
    {
        info!(subject_id = %principal.subject_id(), "refresh token reused concurrently");
        return Err(AppError::Unauthorized(REFRESH_TOKEN_REVOKED.into()));
    }

    let pair = state.codec.issue_pair(&principal.payload())?;
    debug!(subject_id = %principal.subject_id(), "token pair rotated");
    Ok(pair.into())
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

/// Revoke the given refresh token, if any.
///
/// Logout always succeeds for the client: unknown, malformed or expired
/// tokens are ignored. Only server faults propagate.
pub async fn logout(state: &AppState, refresh_token: Option<&str>) -> AppResult<LogoutResponse> {
    let Some(token) = refresh_token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(LogoutResponse { success: true });
    };

    match state.codec.verify(TokenKind::Refresh, token) {
        Ok(principal) => {
            state
                .revoked
                .revoke(principal.token_id(), revocation_horizon(state, &principal))
                .await?;
            info!(subject_id = %principal.subject_id(), "refresh token revoked on logout");
        }
        Err(AuthError::InvalidToken | AuthError::ExpiredToken) => {
            debug!("logout with unusable refresh token ignored");
        }
        Err(other) => return Err(other.into()),
    }

    Ok(LogoutResponse { success: true })
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Drop revocation entries whose tokens have expired.
pub async fn purge_revoked(state: &AppState) -> AppResult<PurgeResponse> {
    let removed = state.revoked.purge_expired().await?;
    info!(removed, "purged expired revocations");
    Ok(PurgeResponse { removed })
}
