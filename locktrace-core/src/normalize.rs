// Turns raw trace entries into endpoints worth scheduling

use crate::error::EntryParseError;
use crate::model::{Body, Endpoint};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const STATIC_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".eot", ".map", ".webp", ".avif", ".mp4", ".webm", ".ogg",
];

/// Analytics, ad and CDN hosts, matched as substrings of the URL.
pub const SKIPPED_DOMAINS: &[&str] = &[
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.com/tr",
    "doubleclick.net",
    "googlesyndication.com",
    "google.com/pagead",
    "amazon-adsystem.com",
    "jsdelivr.net",
    "unpkg.com",
    "cdnjs.cloudflare.com",
];

pub const POLLING_PATHS: &[&str] = &["/ping", "/health", "/heartbeat"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(default)]
    started_date_time: Option<String>,
    #[serde(default)]
    request: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    method: Option<String>,
    url: Option<String>,
    #[serde(default)]
    headers: Option<Vec<NameValue>>,
    #[serde(default)]
    query_string: Option<Vec<NameValue>>,
    #[serde(default)]
    post_data: Option<PostData>,
}

#[derive(Debug, Deserialize)]
struct NameValue {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostData {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeSummary {
    pub total: usize,
    pub kept: usize,
    /// Static assets, analytics, preflight and polling requests
    pub filtered: usize,
    /// Entries without a request payload
    pub dropped: usize,
    pub diagnostics: Vec<EntryParseError>,
}

impl NormalizeSummary {
    pub fn skipped(&self) -> usize {
        self.diagnostics.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub endpoints: Vec<Endpoint>,
    pub summary: NormalizeSummary,
}

/// True for requests that carry no signal for scheduling.
pub fn should_skip(method: &str, url: &str) -> bool {
    let url = url.to_lowercase();

    let path = url.split(['?', '#']).next().unwrap_or_default();
    if STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }

    if SKIPPED_DOMAINS.iter().any(|domain| url.contains(domain)) {
        return true;
    }

    if method.eq_ignore_ascii_case("OPTIONS") {
        return true;
    }

    POLLING_PATHS.iter().any(|p| url.contains(p))
}

/// Normalizes a single entry.
///
/// Returns `Ok(None)` when the entry has no request or is filtered out.
/// The endpoint id is left at `index`; [`normalize_entries`] renumbers kept
/// endpoints so ids are dense.
pub fn normalize_entry(index: usize, entry: &Value) -> Result<Option<Endpoint>, EntryParseError> {
    let raw: RawEntry = serde_json::from_value(entry.clone())
        .map_err(|e| EntryParseError::new(index, format!("unreadable entry: {}", e)))?;

    let request = match raw.request {
        Some(Value::Null) | None => return Ok(None),
        Some(request) => request,
    };

    let request: RawRequest = serde_json::from_value(request)
        .map_err(|e| EntryParseError::new(index, format!("malformed request: {}", e)))?;

    let method = match request.method {
        Some(ref m) if !m.trim().is_empty() => m.clone(),
        _ => return Err(EntryParseError::new(index, "missing method")),
    };
    let url = match request.url {
        Some(ref u) if !u.trim().is_empty() => u.clone(),
        _ => return Err(EntryParseError::new(index, "missing url")),
    };

    if should_skip(&method, &url) {
        debug!("Filtered {} {}", method, url);
        return Ok(None);
    }

    let mut endpoint = Endpoint::new(index, &method, &url);

    for header in request.headers.unwrap_or_default() {
        endpoint.headers.insert(header.name, header.value);
    }
    for param in request.query_string.unwrap_or_default() {
        endpoint.query.insert(param.name, param.value);
    }
    if let Some(text) = request.post_data.and_then(|p| p.text)
        && !text.is_empty()
    {
        endpoint.body = Some(Body::parse(&text));
    }

    if let Some(ref started) = raw.started_date_time {
        match DateTime::parse_from_rfc3339(started) {
            Ok(ts) => endpoint.captured_at = Some(ts.with_timezone(&Utc)),
            Err(e) => debug!("Entry {} has unparsable timestamp {:?}: {}", index, started, e),
        }
    }

    Ok(Some(endpoint))
}

/// Normalizes every entry, preserving capture order.
pub fn normalize_entries(entries: &[Value]) -> Normalized {
    let mut normalized = Normalized::default();
    normalized.summary.total = entries.len();

    for (index, entry) in entries.iter().enumerate() {
        let has_request = entry
            .get("request")
            .is_some_and(|request| !request.is_null());
        if !has_request {
            normalized.summary.dropped += 1;
            continue;
        }

        match normalize_entry(index, entry) {
            Ok(Some(mut endpoint)) => {
                endpoint.id = normalized.endpoints.len();
                normalized.endpoints.push(endpoint);
            }
            Ok(None) => normalized.summary.filtered += 1,
            Err(e) => {
                warn!("{}", e);
                normalized.summary.diagnostics.push(e);
            }
        }
    }

    normalized.summary.kept = normalized.endpoints.len();

    info!(
        "Normalized {} of {} entries ({} filtered, {} dropped, {} malformed)",
        normalized.summary.kept,
        normalized.summary.total,
        normalized.summary.filtered,
        normalized.summary.dropped,
        normalized.summary.skipped()
    );

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_assets_are_skipped() {
        assert!(should_skip("GET", "https://example.com/static/app.js"));
        assert!(should_skip("GET", "https://example.com/img/logo.PNG?v=3"));
        assert!(!should_skip("GET", "https://example.com/api/config.json"));
    }

    #[test]
    fn test_analytics_and_preflight_are_skipped() {
        assert!(should_skip("POST", "https://www.google-analytics.com/collect"));
        assert!(should_skip("OPTIONS", "https://example.com/api/users"));
        assert!(should_skip("GET", "https://example.com/api/health"));
        assert!(!should_skip("GET", "https://example.com/api/users"));
    }

    #[test]
    fn test_normalize_entry_extracts_fields() {
        let entry = json!({
            "startedDateTime": "2024-03-01T10:00:00.000Z",
            "request": {
                "method": "post",
                "url": "https://example.com/api/login",
                "headers": [{"name": "Content-Type", "value": "application/json"}],
                "queryString": [{"name": "next", "value": "/home"}],
                "postData": {"mimeType": "application/json", "text": "{\"user\":\"a\"}"}
            }
        });

        let endpoint = normalize_entry(4, &entry).unwrap().unwrap();
        assert_eq!(endpoint.id, 4);
        assert_eq!(endpoint.method, "POST");
        assert_eq!(endpoint.headers["Content-Type"], "application/json");
        assert_eq!(endpoint.query["next"], "/home");
        assert!(endpoint.body.as_ref().is_some_and(Body::is_structured));
        assert!(endpoint.captured_at.is_some());
    }

    #[test]
    fn test_bad_timestamp_is_tolerated() {
        let entry = json!({
            "startedDateTime": "yesterday",
            "request": {"method": "GET", "url": "https://example.com/a"}
        });

        let endpoint = normalize_entry(0, &entry).unwrap().unwrap();
        assert!(endpoint.captured_at.is_none());
    }

    #[test]
    fn test_missing_url_is_parse_error() {
        let entry = json!({"request": {"method": "GET"}});
        let err = normalize_entry(7, &entry).unwrap_err();
        assert_eq!(err.index, 7);
        assert!(err.reason.contains("url"));
    }

    #[test]
    fn test_malformed_headers_are_parse_error() {
        let entry = json!({"request": {"method": "GET", "url": "https://e.com/", "headers": "x"}});
        assert!(normalize_entry(0, &entry).is_err());
    }
}
