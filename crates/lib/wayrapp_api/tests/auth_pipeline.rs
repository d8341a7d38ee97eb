//! Integration tests: full middleware chain through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wayrapp_api::config::ApiConfig;
use wayrapp_api::extract::{CurrentPrincipal, RouteParams};
use wayrapp_api::middleware::{AuthMode, secure};
use wayrapp_api::{AppState, router};
use wayrapp_core::auth::jwt::{AUDIENCE, ISSUER};
use wayrapp_core::auth::revocation::MemoryRevokedTokenStore;
use wayrapp_core::models::auth::{Role, TokenKind, TokenPayload};
use wayrapp_core::security_log::{AuthFailure, PayloadSource, RecordingSink, SecurityEvent};

const ACCESS_SECRET: &str = "test-access-secret";
const REFRESH_SECRET: &str = "test-refresh-secret";

fn test_state() -> (AppState, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let state = AppState::new(
        ApiConfig::with_secrets(ACCESS_SECRET, REFRESH_SECRET),
        Arc::new(MemoryRevokedTokenStore::new()),
    )
    .with_events(sink.clone());
    (state, sink)
}

fn access_token(state: &AppState, subject_id: &str, role: Role) -> String {
    state
        .codec
        .issue(
            TokenKind::Access,
            &TokenPayload {
                subject_id: subject_id.into(),
                email: format!("{subject_id}@example.com"),
                role,
            },
        )
        .unwrap()
}

fn expired_access_token() -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": "user-1",
        "email": "user-1@example.com",
        "role": "student",
        "iat": now - 3600,
        "exp": now - 60,
        "iss": ISSUER,
        "aud": AUDIENCE,
        "jti": "expired-token",
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("parse JSON")
    };
    (status, json)
}

fn get_with(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// ---------------------------------------------------------------------------
// Test routes
// ---------------------------------------------------------------------------

async fn echo_params(CurrentPrincipal(p): CurrentPrincipal, params: RouteParams) -> Json<Value> {
    Json(json!({ "caller": p.subject_id(), "params": params.0 }))
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn echo_request(
    params: RouteParams,
    axum::extract::RawQuery(query): axum::extract::RawQuery,
    Json(body): Json<Value>,
) -> Json<Value> {
    Json(json!({ "params": params.0, "query": query, "body": body }))
}

async fn raw_body(body: String) -> String {
    body
}

async fn ok() -> &'static str {
    "ok"
}

fn gated_app(state: AppState) -> Router {
    let owned = secure(
        Router::new().route("/users/{userId}", get(echo_params)),
        &state,
        AuthMode::Required,
        state.policy().require_ownership(),
    );
    let creators = secure(
        Router::new().route("/courses", post(echo_body)),
        &state,
        AuthMode::Required,
        state
            .policy()
            .require_role([Role::ContentCreator, Role::Admin])
            .require_permission("create:courses"),
    );
    let user_admin = secure(
        Router::new().route("/admin/users", get(ok)),
        &state,
        AuthMode::Required,
        state.policy().require_permission("manage:users"),
    );
    let gated_without_auth = secure(
        Router::new().route("/unguarded-policy", get(ok)),
        &state,
        AuthMode::None,
        state.policy().require_role([Role::Student]),
    );
    let public = secure(
        Router::new()
            .route("/echo/{slug}", post(echo_request))
            .route("/raw", post(raw_body)),
        &state,
        AuthMode::None,
        state.policy(),
    );

    Router::new()
        .merge(owned)
        .merge(creators)
        .merge(user_admin)
        .merge(gated_without_auth)
        .merge(public)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Authentication gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_rejected() {
    let (state, sink) = test_state();
    let (status, body) = send(router(state), get_with("/api/v1/auth/me", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "Access token required");
    assert!(sink.events().iter().any(|(_, e)| matches!(
        e,
        SecurityEvent::AuthenticationFailed {
            reason: AuthFailure::MissingToken
        }
    )));
}

#[tokio::test]
async fn valid_token_reaches_handler() {
    let (state, sink) = test_state();
    let token = access_token(&state, "user-1", Role::Student);
    let (status, body) = send(router(state), get_with("/api/v1/auth/me", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "user-1");
    assert_eq!(body["email"], "user-1@example.com");
    assert_eq!(body["role"], "student");
    assert!(
        sink.events()
            .iter()
            .any(|(meta, e)| meta.path == "/api/v1/auth/me"
                && matches!(e, SecurityEvent::AuthenticationSucceeded { subject_id } if subject_id == "user-1"))
    );
}

#[tokio::test]
async fn expired_token_rejected() {
    let (state, _) = test_state();
    let token = expired_access_token();
    let (status, body) = send(router(state), get_with("/api/v1/auth/me", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access token expired");
}

#[tokio::test]
async fn malformed_token_rejected() {
    let (state, _) = test_state();
    let (status, body) = send(
        router(state),
        get_with("/api/v1/auth/me", Some("not.a.jwt")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid access token");
}

#[tokio::test]
async fn refresh_token_rejected_as_access_token() {
    let (state, _) = test_state();
    let pair = state
        .codec
        .issue_pair(&TokenPayload {
            subject_id: "user-1".into(),
            email: "user-1@example.com".into(),
            role: Role::Admin,
        })
        .unwrap();
    let (status, body) = send(
        router(state),
        get_with("/api/v1/auth/me", Some(&pair.refresh_token)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid access token");
}

#[tokio::test]
async fn missing_secret_is_generic_server_error() {
    let mut config = ApiConfig::with_secrets(ACCESS_SECRET, REFRESH_SECRET);
    config.security.access_secret = None;
    let state = AppState::new(config, Arc::new(MemoryRevokedTokenStore::new()));

    let (status, body) = send(
        router(state),
        get_with("/api/v1/auth/me", Some("whatever.token.here")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn optional_auth_without_token_proceeds() {
    let (state, sink) = test_state();
    let (status, body) = send(router(state), get_with("/api/v1/auth/session", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);
    assert!(body["user"].is_null());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn optional_auth_with_bad_token_proceeds() {
    let (state, _) = test_state();
    let token = expired_access_token();
    let (status, body) = send(
        router(state),
        get_with("/api/v1/auth/session", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn optional_auth_with_valid_token_attaches_principal() {
    let (state, _) = test_state();
    let token = access_token(&state, "user-9", Role::ContentCreator);
    let (status, body) = send(
        router(state),
        get_with("/api/v1/auth/session", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["id"], "user-9");
    assert_eq!(body["user"]["role"], "content_creator");
}

// ---------------------------------------------------------------------------
// Authorization gates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_can_access_own_resource() {
    let (state, _) = test_state();
    let token = access_token(&state, "user-1", Role::Student);
    let (status, body) = send(gated_app(state), get_with("/users/user-1", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["caller"], "user-1");
    assert_eq!(body["params"]["userId"], "user-1");
}

#[tokio::test]
async fn non_owner_denied() {
    let (state, sink) = test_state();
    let token = access_token(&state, "user-1", Role::Student);
    let (status, body) = send(gated_app(state), get_with("/users/user-2", Some(&token))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(
        body["message"],
        "Access denied - you can only access your own resources"
    );
    assert!(sink.events().iter().any(|(_, e)| matches!(
        e,
        SecurityEvent::AccessDenied { subject_id: Some(id), role: Some(Role::Student), .. } if id == "user-1"
    )));
}

#[tokio::test]
async fn admin_bypasses_ownership() {
    let (state, _) = test_state();
    let token = access_token(&state, "admin-1", Role::Admin);
    let (status, _) = send(gated_app(state), get_with("/users/user-2", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn role_gate_rejects_student() {
    let (state, _) = test_state();
    let token = access_token(&state, "user-1", Role::Student);
    let (status, body) = send(
        gated_app(state),
        post_json("/courses", Some(&token), json!({ "name": "Quechua" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Insufficient permissions");
}

#[tokio::test]
async fn role_and_permission_gates_admit_creator() {
    let (state, _) = test_state();
    let token = access_token(&state, "creator-1", Role::ContentCreator);
    let (status, body) = send(
        gated_app(state),
        post_json("/courses", Some(&token), json!({ "name": "Quechua" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Quechua");
}

#[tokio::test]
async fn permission_gate_names_missing_permission() {
    let (state, _) = test_state();
    let token = access_token(&state, "creator-1", Role::ContentCreator);
    let (status, body) = send(gated_app(state), get_with("/admin/users", Some(&token))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Permission 'manage:users' required");
}

#[tokio::test]
async fn gate_without_authentication_fails_closed() {
    let (state, _) = test_state();
    let (status, body) = send(gated_app(state), get_with("/unguarded-policy", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication required");
}

// ---------------------------------------------------------------------------
// Input sanitizer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sanitizes_body_query_and_params() {
    let (state, sink) = test_state();
    let req = post_json(
        "/echo/%3Cb%3E?q=%3Cscript%3E&page=2",
        None,
        json!({
            "name": "<script>alert(1)</script>",
            "tags": ["ok", "<i>"],
            "count": 3
        }),
    );
    let (status, body) = send(gated_app(state), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["params"]["slug"], "&lt;b&gt;");
    assert_eq!(body["body"]["name"], "&lt;script&gt;alert(1)&lt;/script&gt;");
    assert_eq!(body["body"]["tags"], json!(["ok", "&lt;i&gt;"]));
    assert_eq!(body["body"]["count"], 3);

    let query = body["query"].as_str().expect("query present");
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    assert!(pairs.contains(&("q".into(), "&lt;script&gt;".into())));
    assert!(pairs.contains(&("page".into(), "2".into())));

    let sanitized: Vec<(PayloadSource, String)> = sink
        .events()
        .into_iter()
        .filter_map(|(_, e)| match e {
            SecurityEvent::InputSanitized { source, field, .. } => Some((source, field)),
            _ => None,
        })
        .collect();
    assert_eq!(sanitized.len(), 4);
    assert!(sanitized.contains(&(PayloadSource::Body, "name".into())));
    assert!(sanitized.contains(&(PayloadSource::Body, "tags[1]".into())));
    assert!(sanitized.contains(&(PayloadSource::Query, "q".into())));
    assert!(sanitized.contains(&(PayloadSource::Params, "slug".into())));
}

#[tokio::test]
async fn clean_request_passes_untouched() {
    let (state, sink) = test_state();
    let req = post_json("/echo/plain?page=2", None, json!({ "name": "Ana" }));
    let (status, body) = send(gated_app(state), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"]["name"], "Ana");
    assert_eq!(body["query"], "page=2");
    assert!(sink.events().is_empty());
}

async fn send_raw(app: Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.oneshot(req).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, String::from_utf8(body.to_vec()).expect("utf-8 body"))
}

fn post_raw(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn rewritten_body_keeps_numbers_exact() {
    let (state, _) = test_state();
    let (status, body) = send_raw(
        gated_app(state),
        post_raw(
            "/raw",
            r#"{"id": 123456789012345678901234567890, "ratio": 0.1000000000000000055511151231257827, "name": "<b>"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("123456789012345678901234567890"), "{body}");
    assert!(body.contains("0.1000000000000000055511151231257827"), "{body}");
    assert!(body.contains("&lt;b&gt;"), "{body}");
}

#[tokio::test]
async fn clean_body_passes_byte_identical() {
    let (state, _) = test_state();
    let raw = r#"{"id": 123456789012345678901234567890, "name": "plain"}"#;
    let (status, body) = send_raw(gated_app(state), post_raw("/raw", raw)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, raw);
}

#[tokio::test]
async fn huge_key_logged_bounded() {
    let (state, sink) = test_state();
    let key = "<script>".repeat(5000);
    let req = post_json("/echo/x", None, json!({ "payload": { key: "<b>" } }));
    let (status, _) = send(gated_app(state), req).await;

    assert_eq!(status, StatusCode::OK);
    let fields: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|(_, e)| match e {
            SecurityEvent::InputSanitized { field, .. } => Some(field),
            _ => None,
        })
        .collect();
    assert_eq!(fields.len(), 1);
    assert!(fields[0].starts_with("payload.<script>"));
    assert!(fields[0].chars().count() <= 103);
}

#[tokio::test]
async fn forwarded_for_ignored_unless_trusted() {
    let forwarded = |state: AppState| async move {
        let req = Request::builder()
            .uri("/api/v1/auth/me")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        router(state).oneshot(req).await.expect("request")
    };

    let (state, sink) = test_state();
    assert_eq!(forwarded(state).await.status(), StatusCode::UNAUTHORIZED);
    let (meta, _) = sink.events().into_iter().next().expect("event");
    assert_eq!(meta.ip, None);

    let (mut state, sink) = test_state();
    state.config.trust_forwarded_for = true;
    assert_eq!(forwarded(state).await.status(), StatusCode::UNAUTHORIZED);
    let (meta, _) = sink.events().into_iter().next().expect("event");
    assert_eq!(meta.ip.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn oversized_body_rejected() {
    let (mut state, _) = test_state();
    state.config.max_body_bytes = 16;
    let req = post_json(
        "/echo/x",
        None,
        json!({ "name": "a string well past sixteen bytes" }),
    );
    let (status, body) = send(gated_app(state), req).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
}

#[tokio::test]
async fn sanitizer_runs_before_authentication() {
    let (state, sink) = test_state();
    let req = post_json("/courses?x=%3Cy%3E", None, json!({ "name": "<b>" }));
    let (status, _) = send(gated_app(state), req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let names: Vec<&'static str> = sink.events().iter().map(|(_, e)| e.name()).collect();
    assert_eq!(
        names,
        vec!["input_sanitized", "input_sanitized", "authentication_failed"]
    );
}

// ---------------------------------------------------------------------------
// Token lifecycle routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_pair_once() {
    let (state, _) = test_state();
    let pair = state
        .codec
        .issue_pair(&TokenPayload {
            subject_id: "user-1".into(),
            email: "user-1@example.com".into(),
            role: Role::Student,
        })
        .unwrap();
    let app = router(state);

    let (status, body) = send(
        app.clone(),
        post_json(
            "/api/v1/auth/refresh",
            None,
            json!({ "refreshToken": pair.refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 900);
    let new_access = body["accessToken"].as_str().unwrap().to_string();

    let (status, me) = send(app.clone(), get_with("/api/v1/auth/me", Some(&new_access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "user-1");

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/auth/refresh",
            None,
            json!({ "refreshToken": pair.refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Refresh token revoked");
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let (state, _) = test_state();
    let pair = state
        .codec
        .issue_pair(&TokenPayload {
            subject_id: "user-1".into(),
            email: "user-1@example.com".into(),
            role: Role::Student,
        })
        .unwrap();
    let app = router(state);

    let (status, body) = send(
        app.clone(),
        post_json(
            "/api/v1/auth/logout",
            None,
            json!({ "refreshToken": pair.refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        app,
        post_json(
            "/api/v1/auth/refresh",
            None,
            json!({ "refreshToken": pair.refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn purge_requires_admin() {
    let (state, _) = test_state();
    let student = access_token(&state, "user-1", Role::Student);
    let admin = access_token(&state, "admin-1", Role::Admin);
    let app = router(state);

    let purge = |token: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/revoked/purge")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(app.clone(), purge(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(app, purge(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}

#[tokio::test]
async fn health_is_public() {
    let (state, _) = test_state();
    let (status, body) = send(router(state), get_with("/api/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}
