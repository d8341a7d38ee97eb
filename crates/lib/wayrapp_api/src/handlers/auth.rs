//! Authentication request handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{CurrentPrincipal, MaybePrincipal};
use crate::models::{
    LogoutRequest, LogoutResponse, PrincipalResponse, PurgeResponse, RefreshRequest,
    SessionResponse, TokenResponse,
};
use crate::services::auth;

/// `POST /api/v1/auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::refresh(&state, &body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /api/v1/auth/logout`: revoke the refresh token, if one is given.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<LogoutResponse>> {
    let resp = auth::logout(&state, body.refresh_token.as_deref()).await?;
    Ok(Json(resp))
}

/// `GET /api/v1/auth/session`: who is calling, if anyone.
pub async fn session_handler(MaybePrincipal(principal): MaybePrincipal) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: principal.is_some(),
        user: principal.as_ref().map(PrincipalResponse::from),
    })
}

/// `GET /api/v1/auth/me`: the authenticated principal.
pub async fn me_handler(CurrentPrincipal(principal): CurrentPrincipal) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from(&principal))
}

/// `POST /api/v1/auth/revoked/purge`: drop expired revocation entries.
pub async fn purge_revoked_handler(
    State(state): State<AppState>,
) -> AppResult<Json<PurgeResponse>> {
    Ok(Json(auth::purge_revoked(&state).await?))
}
