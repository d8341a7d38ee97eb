//! Input sanitizer as axum middleware.
//!
//! Rewrites string values in the JSON body, the query string and the route
//! parameters before authentication runs. Sanitized route parameters are
//! published as a [`RouteParams`] extension; handlers that need them should
//! read that rather than `Path`, which sees the raw URI.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{RawPathParams, Request, State, rejection::RawPathParamsRejection},
    http::{HeaderValue, Uri, header, uri::PathAndQuery},
    middleware::Next,
    response::Response,
};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;
use wayrapp_core::security_log::{PayloadSource, RequestMeta};

use super::resolve_meta;
use crate::AppState;
use crate::error::AppError;
use crate::extract::RouteParams;

pub async fn sanitize_request(
    State(state): State<AppState>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let meta = resolve_meta(&request, state.config.trust_forwarded_for);
    let (mut parts, body) = request.into_parts();
    parts.extensions.insert(meta.clone());

    // Route parameters
    let mut route_params: HashMap<String, String> = match &params {
        Ok(raw) => raw
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(e) => {
            debug!(error = %e, "route parameters unavailable");
            HashMap::new()
        }
    };
    state
        .sanitizer
        .sanitize_map(&mut route_params, PayloadSource::Params, &meta);
    parts.extensions.insert(RouteParams(route_params));

    // Query string
    if let Some(uri) = sanitize_query(&state, &parts.uri, &meta) {
        parts.uri = uri;
    }

    // JSON body
    let body = if is_json(&parts.headers) {
        let limit = state.config.max_body_bytes;
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(AppError::PayloadTooLarge);
        }

        let bytes = read_body(body, limit).await?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(mut value) => {
                let changed =
                    state
                        .sanitizer
                        .sanitize_value(&mut value, PayloadSource::Body, &meta);
                if changed == 0 {
                    Body::from(bytes)
                } else {
                    let rewritten = serde_json::to_vec(&value)
                        .map_err(|e| AppError::Internal(format!("re-encode body: {e}")))?;
                    parts
                        .headers
                        .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
                    Body::from(rewritten)
                }
            }
            // Malformed JSON is the handler's to reject.
            Err(_) => Body::from(bytes),
        }
    } else {
        body
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Buffer at most `limit` bytes of `body`.
async fn read_body(body: Body, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            debug!(error = %e, "failed to read request body");
            AppError::Validation("Failed to read request body".into())
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// The URI with a sanitized query, or `None` when nothing changed.
fn sanitize_query(state: &AppState, uri: &Uri, meta: &RequestMeta) -> Option<Uri> {
    let query = uri.query()?;
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    if state
        .sanitizer
        .sanitize_pairs(&mut pairs, PayloadSource::Query, meta)
        == 0
    {
        return None;
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish();
    let path_and_query = match PathAndQuery::try_from(format!("{}?{query}", uri.path())) {
        Ok(pq) => pq,
        Err(e) => {
            warn!(error = %e, "could not rebuild sanitized query, keeping original");
            return None;
        }
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    match Uri::from_parts(parts) {
        Ok(uri) => Some(uri),
        Err(e) => {
            warn!(error = %e, "could not rebuild sanitized query, keeping original");
            None
        }
    }
}

fn is_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}
