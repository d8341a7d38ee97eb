//! Security event log: audit records for sanitization hits and
//! authentication/authorization failures.
//!
//! Events never carry credentials. Offending input is truncated to
//! [`MAX_LOGGED_CHARS`] characters before it is stored or emitted.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::models::auth::Role;

/// Longest prefix of an offending value kept in a log record.
pub const MAX_LOGGED_CHARS: usize = 100;

/// Marker appended to truncated values.
pub const TRUNCATION_MARKER: &str = "...";

/// Request context attached to every security event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub path: String,
    /// Client address, if the transport exposed one.
    pub ip: Option<String>,
}

impl RequestMeta {
    pub fn new(path: impl Into<String>, ip: Option<String>) -> Self {
        Self {
            path: path.into(),
            ip,
        }
    }

    fn ip_or_unknown(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

/// Which part of the request a sanitized value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Body,
    Query,
    Params,
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadSource::Body => "body",
            PayloadSource::Query => "query",
            PayloadSource::Params => "params",
        })
    }
}

/// Why an authentication attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    Misconfigured,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::ExpiredToken => "expired_token",
            AuthFailure::Misconfigured => "misconfigured",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A string field was rewritten by the sanitizer.
    InputSanitized {
        source: PayloadSource,
        field: String,
        /// Original value, truncated.
        original: String,
    },
    /// The filter primitive failed; the value was passed through.
    SanitizerFailed {
        source: PayloadSource,
        field: String,
        reason: String,
    },
    AuthenticationSucceeded {
        subject_id: String,
    },
    AuthenticationFailed {
        reason: AuthFailure,
    },
    AccessDenied {
        subject_id: Option<String>,
        role: Option<Role>,
        reason: String,
    },
}

impl SecurityEvent {
    /// Build an [`SecurityEvent::InputSanitized`]. `field` and `original`
    /// come from the request, so both are bounded.
    pub fn input_sanitized(source: PayloadSource, field: &str, original: &str) -> Self {
        SecurityEvent::InputSanitized {
            source,
            field: field_for_log(field),
            original: truncate_for_log(original),
        }
    }

    /// Build an [`SecurityEvent::SanitizerFailed`] with a bounded `field`.
    pub fn sanitizer_failed(source: PayloadSource, field: &str, reason: impl Into<String>) -> Self {
        SecurityEvent::SanitizerFailed {
            source,
            field: field_for_log(field),
            reason: reason.into(),
        }
    }

    /// Stable event name used in log records.
    pub fn name(&self) -> &'static str {
        match self {
            SecurityEvent::InputSanitized { .. } => "input_sanitized",
            SecurityEvent::SanitizerFailed { .. } => "sanitizer_failed",
            SecurityEvent::AuthenticationSucceeded { .. } => "authentication_succeeded",
            SecurityEvent::AuthenticationFailed { .. } => "authentication_failed",
            SecurityEvent::AccessDenied { .. } => "access_denied",
        }
    }
}

/// Truncated field path with control characters escaped, so a crafted key
/// cannot split a log line.
pub fn field_for_log(field: &str) -> String {
    let truncated = truncate_for_log(field);
    if !truncated.contains(char::is_control) {
        return truncated;
    }
    truncated
        .chars()
        .map(|c| {
            if c.is_control() {
                c.escape_default().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Cut `value` to [`MAX_LOGGED_CHARS`] characters plus [`TRUNCATION_MARKER`].
pub fn truncate_for_log(value: &str) -> String {
    match value.char_indices().nth(MAX_LOGGED_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &value[..cut]),
        None => value.to_string(),
    }
}

/// Destination for security events.
pub trait SecurityEventSink: Send + Sync {
    fn record(&self, meta: &RequestMeta, event: SecurityEvent);
}

/// Emits events as `tracing` records under the `security` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SecurityEventSink for TracingSink {
    fn record(&self, meta: &RequestMeta, event: SecurityEvent) {
        let name = event.name();
        let ip = meta.ip_or_unknown();
        match &event {
            SecurityEvent::InputSanitized {
                source,
                field,
                original,
            } => warn!(
                target: "security",
                event = name,
                path = %meta.path,
                ip,
                %source,
                field = ?field,
                truncated_original = ?original,
                "potentially malicious input sanitized"
            ),
            SecurityEvent::SanitizerFailed {
                source,
                field,
                reason,
            } => warn!(
                target: "security",
                event = name,
                path = %meta.path,
                ip,
                %source,
                field = ?field,
                reason = %reason,
                "sanitizer failed, value passed through"
            ),
            SecurityEvent::AuthenticationSucceeded { subject_id } => debug!(
                target: "security",
                event = name,
                path = %meta.path,
                ip,
                subject_id = %subject_id,
                "request authenticated"
            ),
            SecurityEvent::AuthenticationFailed { reason } => warn!(
                target: "security",
                event = name,
                path = %meta.path,
                ip,
                %reason,
                "authentication rejected"
            ),
            SecurityEvent::AccessDenied {
                subject_id,
                role,
                reason,
            } => warn!(
                target: "security",
                event = name,
                path = %meta.path,
                ip,
                subject_id = subject_id.as_deref().unwrap_or("anonymous"),
                role = role.map(Role::as_str).unwrap_or("none"),
                reason = %reason,
                "access denied"
            ),
        }
    }
}

/// Keeps events in memory. Useful in tests and for inspection tooling.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(RequestMeta, SecurityEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<(RequestMeta, SecurityEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SecurityEventSink for RecordingSink {
    fn record(&self, meta: &RequestMeta, event: SecurityEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((meta.clone(), event));
    }
}
