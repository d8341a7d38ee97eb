//! Request middleware: sanitization, authentication and authorization.

pub mod auth;
pub mod authorize;
pub mod sanitize;

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{ConnectInfo, Request};
use axum::middleware::from_fn_with_state;
use wayrapp_core::auth::gates::AccessPolicy;
use wayrapp_core::security_log::RequestMeta;

use crate::AppState;

/// Longest client address kept in security events (IPv6 text form).
const MAX_IP_LEN: usize = 45;

/// How the authentication gate treats a route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication gate.
    None,
    /// Attach a principal when a valid token is present, never reject.
    Optional,
    /// Reject requests without a valid access token.
    Required,
}

/// Wrap every route in `router` with sanitizer → authentication → `policy`.
///
/// Layers are applied with `route_layer`, so they run after routing and see
/// the matched route parameters. `router` must already contain its routes.
pub fn secure(
    router: Router<AppState>,
    state: &AppState,
    mode: AuthMode,
    policy: AccessPolicy,
) -> Router<AppState> {
    // route_layer wraps outside-in: the last layer added runs first.
    let router = if policy.gates().is_empty() {
        router
    } else {
        router.route_layer(from_fn_with_state(policy, authorize::enforce))
    };
    let router = match mode {
        AuthMode::None => router,
        AuthMode::Optional => {
            router.route_layer(from_fn_with_state(state.clone(), auth::optional_auth))
        }
        AuthMode::Required => {
            router.route_layer(from_fn_with_state(state.clone(), auth::require_auth))
        }
    };
    router.route_layer(from_fn_with_state(state.clone(), sanitize::sanitize_request))
}

/// Path and client address for security events.
///
/// Uses the [`RequestMeta`] the sanitizer layer attached, so every layer of
/// one request reports the same address. Falls back to the socket address.
pub fn request_meta(request: &Request) -> RequestMeta {
    match request.extensions().get::<RequestMeta>() {
        Some(meta) => meta.clone(),
        None => resolve_meta(request, false),
    }
}

/// Work out the client address for `request`.
///
/// The first `X-Forwarded-For` hop is used only when `trust_forwarded_for`
/// is set; otherwise any client could pick the address it is logged under.
/// The value is reduced to address characters so it cannot inject text into
/// log lines.
pub fn resolve_meta(request: &Request, trust_forwarded_for: bool) -> RequestMeta {
    let forwarded = trust_forwarded_for
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
        })
        .flatten();
    let socket = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };

    let ip = forwarded
        .or_else(socket)
        .map(|raw| clean_ip(&raw))
        .filter(|ip| !ip.is_empty());

    RequestMeta::new(request.uri().path(), ip)
}

fn clean_ip(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_hexdigit() || *c == '.' || *c == ':')
        .take(MAX_IP_LEN)
        .collect()
}
