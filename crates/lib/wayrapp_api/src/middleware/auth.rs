//! Authentication gate: Bearer token extraction and access-token
//! verification.
//!
//! Per request: `NoToken → TokenPresent → Authenticated | Rejected`. The
//! mandatory variant turns a rejection into a 401 (or a generic 500 for a
//! missing secret); the optional variant lets the request through without a
//! principal. Raw tokens are never logged.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::error;
use wayrapp_core::auth::AuthError;
use wayrapp_core::auth::jwt::extract_bearer;
use wayrapp_core::models::auth::{Principal, TokenKind};
use wayrapp_core::security_log::{AuthFailure, RequestMeta, SecurityEvent};

use super::request_meta;
use crate::AppState;
use crate::error::AppError;

pub const ACCESS_TOKEN_REQUIRED: &str = "Access token required";
pub const INVALID_ACCESS_TOKEN: &str = "Invalid access token";
pub const ACCESS_TOKEN_EXPIRED: &str = "Access token expired";

/// Verify the bearer access token in `headers`.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, AuthFailure> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = extract_bearer(header).ok_or(AuthFailure::MissingToken)?;

    state
        .codec
        .verify(TokenKind::Access, token)
        .map_err(|e| match e {
            AuthError::ExpiredToken => AuthFailure::ExpiredToken,
            AuthError::Configuration(detail) => {
                error!(error = %detail, "cannot verify access tokens");
                AuthFailure::Misconfigured
            }
            _ => AuthFailure::InvalidToken,
        })
}

fn rejection(failure: AuthFailure) -> AppError {
    match failure {
        AuthFailure::MissingToken => AppError::Unauthorized(ACCESS_TOKEN_REQUIRED.into()),
        AuthFailure::InvalidToken => AppError::Unauthorized(INVALID_ACCESS_TOKEN.into()),
        AuthFailure::ExpiredToken => AppError::Unauthorized(ACCESS_TOKEN_EXPIRED.into()),
        AuthFailure::Misconfigured => {
            AppError::Configuration("access token secret is not configured".into())
        }
    }
}

fn record_success(state: &AppState, meta: &RequestMeta, principal: &Principal) {
    state.events.record(
        meta,
        SecurityEvent::AuthenticationSucceeded {
            subject_id: principal.subject_id().to_string(),
        },
    );
}

fn record_failure(state: &AppState, meta: &RequestMeta, reason: AuthFailure) {
    state
        .events
        .record(meta, SecurityEvent::AuthenticationFailed { reason });
}

/// Axum middleware: requires a valid `Authorization: Bearer <token>` and
/// injects the verified [`Principal`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let meta = request_meta(&request);
    match authenticate(&state, request.headers()) {
        Ok(principal) => {
            record_success(&state, &meta, &principal);
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(failure) => {
            record_failure(&state, &meta, failure);
            Err(rejection(failure))
        }
    }
}

/// Axum middleware: like [`require_auth`], but every failure is swallowed and
/// the request proceeds without a principal.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let meta = request_meta(&request);
    match authenticate(&state, request.headers()) {
        Ok(principal) => {
            record_success(&state, &meta, &principal);
            request.extensions_mut().insert(principal);
        }
        // Anonymous access is the normal case here.
        Err(AuthFailure::MissingToken) => {}
        Err(failure) => record_failure(&state, &meta, failure),
    }
    next.run(request).await
}
