//! Axum extractors for the request-scoped security context.
//!
//! - [`CurrentPrincipal`]: requires an authenticated principal, 401 otherwise
//! - [`MaybePrincipal`]: optional principal, never fails
//! - [`RouteParams`]: route parameters after sanitization

use std::collections::HashMap;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use wayrapp_core::auth::gates::AUTHENTICATION_REQUIRED;
use wayrapp_core::models::auth::Principal;

use crate::error::AppError;

/// The authenticated principal. Rejects with 401 when the authentication
/// gate did not attach one.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or_else(|| AppError::Unauthorized(AUTHENTICATION_REQUIRED.into()))
    }
}

/// The principal if one was attached, `None` otherwise.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(parts.extensions.get::<Principal>().cloned()))
    }
}

/// Sanitized route parameters, inserted by the sanitizer middleware.
///
/// Empty when the sanitizer did not run for this route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(pub HashMap<String, String>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl<S> FromRequestParts<S> for RouteParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RouteParams>()
            .cloned()
            .unwrap_or_default())
    }
}
