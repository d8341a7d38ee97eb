//! # wayrapp_api
//!
//! HTTP layer for the WayrApp security core: sanitization, authentication
//! and authorization middleware for axum, plus the token refresh routes.
//!
//! Every secured route runs, in order: input sanitizer → authentication gate
//! → authorization gates → handler. See [`middleware::secure`].

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wayrapp_core::auth::gates::AccessPolicy;
use wayrapp_core::auth::jwt::TokenCodec;
use wayrapp_core::auth::password::PasswordHasher;
use wayrapp_core::auth::permissions::PermissionTable;
use wayrapp_core::auth::revocation::RevokedTokenStore;
use wayrapp_core::models::auth::Role;
use wayrapp_core::sanitize::Sanitizer;
use wayrapp_core::security_log::{SecurityEventSink, TracingSink};

use crate::config::ApiConfig;
use crate::handlers::{auth, health};
use crate::middleware::AuthMode;

/// Shared application state passed to all handlers and middleware.
///
/// Everything here is immutable after startup; clones share the same `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Token signing/verification.
    pub codec: Arc<TokenCodec>,
    /// Password hashing for credential handlers.
    pub passwords: PasswordHasher,
    /// Role → permission table.
    pub permissions: Arc<PermissionTable>,
    /// Request payload sanitizer.
    pub sanitizer: Sanitizer,
    /// Security event destination.
    pub events: Arc<dyn SecurityEventSink>,
    /// Revoked refresh-token ids.
    pub revoked: Arc<dyn RevokedTokenStore>,
}

impl AppState {
    /// State with the built-in permission table and `tracing` security log.
    pub fn new(config: ApiConfig, revoked: Arc<dyn RevokedTokenStore>) -> Self {
        let events: Arc<dyn SecurityEventSink> = Arc::new(TracingSink);
        Self {
            codec: Arc::new(TokenCodec::new(&config.security)),
            passwords: PasswordHasher::new(config.security.bcrypt_cost),
            permissions: Arc::new(PermissionTable::builtin()),
            sanitizer: Sanitizer::new(events.clone()),
            events,
            revoked,
            config,
        }
    }

    /// Replace the security event sink (and the sanitizer that reports to it).
    pub fn with_events(mut self, events: Arc<dyn SecurityEventSink>) -> Self {
        self.sanitizer = Sanitizer::new(events.clone());
        self.events = events;
        self
    }

    /// Replace the permission table.
    pub fn with_permissions(mut self, permissions: PermissionTable) -> Self {
        self.permissions = Arc::new(permissions);
        self
    }

    /// Empty access policy bound to this state's table and event sink.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.permissions.clone(), self.events.clone())
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (sanitized, no principal required)
    let public = middleware::secure(
        Router::new()
            .route("/api/health", get(health::health_handler))
            .route("/api/v1/auth/refresh", post(auth::refresh_handler))
            .route("/api/v1/auth/logout", post(auth::logout_handler)),
        &state,
        AuthMode::None,
        state.policy(),
    );

    // Personalized when a principal is present
    let optional = middleware::secure(
        Router::new().route("/api/v1/auth/session", get(auth::session_handler)),
        &state,
        AuthMode::Optional,
        state.policy(),
    );

    // Protected routes (require auth)
    let protected = middleware::secure(
        Router::new().route("/api/v1/auth/me", get(auth::me_handler)),
        &state,
        AuthMode::Required,
        state.policy(),
    );

    let admin = middleware::secure(
        Router::new().route(
            "/api/v1/auth/revoked/purge",
            post(auth::purge_revoked_handler),
        ),
        &state,
        AuthMode::Required,
        state
            .policy()
            .require_role([Role::Admin])
            .require_permission("manage:system"),
    );

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
