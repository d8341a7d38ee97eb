//! Authorization gates as axum middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use wayrapp_core::auth::gates::AccessPolicy;
use wayrapp_core::models::auth::Principal;

use super::request_meta;
use crate::error::AppError;
use crate::extract::RouteParams;

/// Run `policy` against the principal and sanitized route parameters left by
/// the earlier layers. Without a principal every gate denies with 401.
pub async fn enforce(
    State(policy): State<AccessPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let meta = request_meta(&request);
    let params = request
        .extensions()
        .get::<RouteParams>()
        .cloned()
        .unwrap_or_default();

    policy.evaluate(
        request.extensions().get::<Principal>(),
        &params.0,
        &meta,
    )?;

    Ok(next.run(request).await)
}
