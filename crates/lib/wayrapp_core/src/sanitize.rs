//! Input sanitizer: neutralizes markup in inbound request data.
//!
//! Walks a `serde_json::Value` tree and rewrites string leaves through an
//! [`XssFilter`]. Keys, array lengths and non-string values are never
//! touched. Every rewritten string produces one
//! [`SecurityEvent::InputSanitized`]. A failing filter leaves the value as it
//! was; sanitization itself never fails.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::security_log::{PayloadSource, RequestMeta, SecurityEvent, SecurityEventSink};

/// URL schemes that execute script when used as a link target.
const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

/// Raised by an [`XssFilter`] that could not process its input.
#[derive(Debug, Error)]
#[error("filter failed: {0}")]
pub struct FilterError(pub String);

/// String-level neutralization primitive.
pub trait XssFilter: Send + Sync {
    /// Return the input unchanged (`Cow::Borrowed`) when it is already safe.
    fn filter<'a>(&self, input: &'a str) -> Result<Cow<'a, str>, FilterError>;
}

/// Default filter: strips script URL schemes and HTML-encodes `<` and `>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupFilter;

impl XssFilter for MarkupFilter {
    fn filter<'a>(&self, input: &'a str) -> Result<Cow<'a, str>, FilterError> {
        Ok(neutralize(input))
    }
}

/// Strip script schemes, then encode markup delimiters.
///
/// Idempotent: the output contains neither delimiters nor script schemes.
pub fn neutralize(input: &str) -> Cow<'_, str> {
    let stripped = strip_script_schemes(input);
    if !stripped.contains(['<', '>']) {
        return stripped;
    }
    let mut out = String::with_capacity(stripped.len() + 16);
    for c in stripped.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

fn find_script_scheme(value: &str) -> Option<(usize, usize)> {
    // ASCII lowercasing keeps byte offsets aligned with `value`.
    let lower = value.to_ascii_lowercase();
    SCRIPT_SCHEMES
        .iter()
        .filter_map(|scheme| lower.find(scheme).map(|at| (at, scheme.len())))
        .min_by_key(|(at, _)| *at)
}

/// Characters a browser's URL parser drops anywhere in a URL.
const URL_IGNORED: [char; 3] = ['\t', '\n', '\r'];

fn strip_script_schemes(input: &str) -> Cow<'_, str> {
    // "java\tscript:" still runs as "javascript:" in an href.
    let collapsed: Cow<'_, str> = if input.contains(URL_IGNORED) {
        Cow::Owned(input.chars().filter(|c| !URL_IGNORED.contains(c)).collect())
    } else {
        Cow::Borrowed(input)
    };
    let Some(first) = find_script_scheme(&collapsed) else {
        return Cow::Borrowed(input);
    };
    let mut current = collapsed.into_owned();
    let mut next = Some(first);
    // Removing one scheme can splice together another ("javajavascript:script:").
    while let Some((at, len)) = next {
        current.replace_range(at..at + len, "");
        next = find_script_scheme(&current);
    }
    Cow::Owned(current)
}

/// Recursively sanitizes request payloads and reports what it changed.
#[derive(Clone)]
pub struct Sanitizer {
    filter: Arc<dyn XssFilter>,
    events: Arc<dyn SecurityEventSink>,
}

impl Sanitizer {
    /// Sanitizer using [`MarkupFilter`].
    pub fn new(events: Arc<dyn SecurityEventSink>) -> Self {
        Self::with_filter(Arc::new(MarkupFilter), events)
    }

    pub fn with_filter(filter: Arc<dyn XssFilter>, events: Arc<dyn SecurityEventSink>) -> Self {
        Self { filter, events }
    }

    /// Sanitize a JSON tree in place. Returns the number of rewritten strings.
    pub fn sanitize_value(
        &self,
        value: &mut Value,
        source: PayloadSource,
        meta: &RequestMeta,
    ) -> usize {
        let mut path = String::new();
        self.walk(value, &mut path, source, meta)
    }

    fn walk(
        &self,
        value: &mut Value,
        path: &mut String,
        source: PayloadSource,
        meta: &RequestMeta,
    ) -> usize {
        match value {
            Value::String(s) => {
                let field = if path.is_empty() {
                    source.to_string()
                } else {
                    path.clone()
                };
                match self.clean(s, source, &field, meta) {
                    Some(cleaned) => {
                        *s = cleaned;
                        1
                    }
                    None => 0,
                }
            }
            Value::Array(items) => {
                let mut changed = 0;
                for (idx, item) in items.iter_mut().enumerate() {
                    let len = path.len();
                    path.push_str(&format!("[{idx}]"));
                    changed += self.walk(item, path, source, meta);
                    path.truncate(len);
                }
                changed
            }
            Value::Object(map) => {
                let mut changed = 0;
                for (key, item) in map.iter_mut() {
                    let len = path.len();
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                    changed += self.walk(item, path, source, meta);
                    path.truncate(len);
                }
                changed
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => 0,
        }
    }

    /// Sanitize flat string parameters (query string, route params) in place.
    pub fn sanitize_pairs(
        &self,
        pairs: &mut [(String, String)],
        source: PayloadSource,
        meta: &RequestMeta,
    ) -> usize {
        let mut changed = 0;
        for (key, value) in pairs.iter_mut() {
            if let Some(cleaned) = self.clean(value, source, key, meta) {
                *value = cleaned;
                changed += 1;
            }
        }
        changed
    }

    /// [`Sanitizer::sanitize_pairs`] for a map.
    pub fn sanitize_map(
        &self,
        map: &mut HashMap<String, String>,
        source: PayloadSource,
        meta: &RequestMeta,
    ) -> usize {
        let mut changed = 0;
        for (key, value) in map.iter_mut() {
            if let Some(cleaned) = self.clean(value, source, key, meta) {
                *value = cleaned;
                changed += 1;
            }
        }
        changed
    }

    /// Filtered replacement for `value`, or `None` if it stays as is.
    fn clean(
        &self,
        value: &str,
        source: PayloadSource,
        field: &str,
        meta: &RequestMeta,
    ) -> Option<String> {
        match self.filter.filter(value) {
            Ok(Cow::Borrowed(_)) => None,
            Ok(Cow::Owned(cleaned)) if cleaned == value => None,
            Ok(Cow::Owned(cleaned)) => {
                self.events
                    .record(meta, SecurityEvent::input_sanitized(source, field, value));
                Some(cleaned)
            }
            Err(e) => {
                self.events.record(
                    meta,
                    SecurityEvent::sanitizer_failed(source, field, e.to_string()),
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer").finish_non_exhaustive()
    }
}
