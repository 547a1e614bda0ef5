// Endpoint records produced by the normalizer and their derived attributes

use crate::graph::score_difficulty;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// Request body as captured: parsed JSON when possible, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Json(Value),
    Raw(String),
}

impl Body {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Raw(text.to_string()),
        }
    }

    /// Number of top-level fields when the body is a JSON object.
    pub fn top_level_fields(&self) -> usize {
        match self {
            Body::Json(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Body::Json(Value::Object(_)))
    }

    pub fn to_text(&self) -> String {
        match self {
            Body::Json(value) => value.to_string(),
            Body::Raw(text) => text.clone(),
        }
    }
}

/// Result recorded when an endpoint is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// Text returned by the reasoning service
    Extracted(String),
    /// Completed-with-error: the reasoning service gave up on this endpoint
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Outcome::Extracted(text) | Outcome::Failed(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointKind {
    Authentication,
    Api,
    Reconnaissance,
    Execution,
    Destruction,
    Standard,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Authentication => "authentication",
            EndpointKind::Api => "api",
            EndpointKind::Reconnaissance => "reconnaissance",
            EndpointKind::Execution => "execution",
            EndpointKind::Destruction => "destruction",
            EndpointKind::Standard => "standard",
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            EndpointKind::Authentication => {
                "Credentials required - reuse tokens extracted from earlier endpoints"
            }
            EndpointKind::Api => "Standard API call - match headers and payload formatting",
            EndpointKind::Reconnaissance => "Information gathering - low risk, high value",
            EndpointKind::Execution => "State-changing action - construct the payload carefully",
            EndpointKind::Destruction => "Destructive operation - proceed with extreme caution",
            EndpointKind::Standard => "Plain request - no special handling",
        }
    }
}

/// One normalized captured request.
///
/// `id` is the position in the ingested sequence and is the only identity:
/// two endpoints with the same method and URL stay distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: usize,
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<Body>,
    pub captured_at: Option<DateTime<Utc>>,
    difficulty: Option<u8>,
    outcome: Option<Outcome>,
}

impl Endpoint {
    pub fn new(id: usize, method: &str, url: &str) -> Self {
        Self {
            id,
            method: method.trim().to_uppercase(),
            url: url.trim().to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            captured_at: None,
            difficulty: None,
            outcome: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn captured_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.captured_at = Some(timestamp);
        self
    }

    /// Difficulty assigned by the plan builder, or scored on demand.
    pub fn difficulty(&self) -> u8 {
        self.difficulty.unwrap_or_else(|| score_difficulty(self))
    }

    pub(crate) fn assign_difficulty(&mut self, difficulty: u8) {
        if self.difficulty.is_none() {
            self.difficulty = Some(difficulty);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Records the outcome; returns false if the endpoint was already completed.
    pub(crate) fn complete(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn path_segments(&self) -> Vec<String> {
        self.path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Login and auth endpoints precede everything else in the plan.
    pub fn is_authentication(&self) -> bool {
        let url = self.url.to_lowercase();
        url.contains("login") || url.contains("auth")
    }

    pub fn has_auth_header(&self) -> bool {
        self.headers.keys().any(|name| {
            let name = name.to_lowercase();
            crate::graph::AUTH_HEADERS.contains(&name.as_str())
        })
    }

    pub fn kind(&self) -> EndpointKind {
        let url = self.url.to_lowercase();
        if url.contains("/auth") || url.contains("/login") {
            return EndpointKind::Authentication;
        }
        if url.contains("/api/") {
            return EndpointKind::Api;
        }
        match self.method.as_str() {
            "GET" => EndpointKind::Reconnaissance,
            "POST" | "PUT" | "PATCH" => EndpointKind::Execution,
            "DELETE" => EndpointKind::Destruction,
            _ => EndpointKind::Standard,
        }
    }

    /// Short identifier such as `get_users` or `post_root`.
    pub fn name(&self) -> String {
        let last = self
            .path_segments()
            .pop()
            .unwrap_or_else(|| "root".to_string());
        format!("{}_{}", self.method, last).to_lowercase()
    }

    /// Path with volatile segments replaced by placeholders, so that
    /// `/users/42` and `/users/7` share the pattern `/users/{id}`.
    pub fn path_pattern(&self) -> String {
        let segments: Vec<String> = self
            .path_segments()
            .into_iter()
            .map(|segment| {
                if segment.chars().all(|c| c.is_ascii_digit()) {
                    "{id}".to_string()
                } else if is_uuid(&segment) {
                    "{uuid}".to_string()
                } else if segment.len() == 24 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
                    "{objectId}".to_string()
                } else {
                    segment
                }
            })
            .collect();
        format!("/{}", segments.join("/"))
    }

    pub fn to_curl(&self) -> String {
        let mut curl = format!("curl -X {} \"{}\"", self.method, self.full_url());

        for (name, value) in &self.headers {
            curl.push_str(&format!(" -H \"{}: {}\"", name, value));
        }

        if let Some(ref body) = self.body {
            curl.push_str(&format!(" -d '{}'", body.to_text()));
        }

        curl
    }

    /// URL including the captured query parameters. Parameters already
    /// present in the URL are not repeated.
    pub fn full_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut parsed) if parsed.query().is_none() && !self.query.is_empty() => {
                {
                    let mut pairs = parsed.query_pairs_mut();
                    for (name, value) in &self.query {
                        pairs.append_pair(name, value);
                    }
                }
                parsed.to_string()
            }
            _ => self.url.clone(),
        }
    }
}

fn is_uuid(segment: &str) -> bool {
    segment.len() == 36
        && segment
            .chars()
            .enumerate()
            .all(|(i, c)| match i {
                8 | 13 | 18 | 23 => c == '-',
                _ => c.is_ascii_hexdigit(),
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_parse_json_object() {
        let body = Body::parse(r#"{"user":"a","pass":"b"}"#);
        assert!(body.is_structured());
        assert_eq!(body.top_level_fields(), 2);
    }

    #[test]
    fn test_body_parse_raw_fallback() {
        let body = Body::parse("user=a&pass=b");
        assert_eq!(body, Body::Raw("user=a&pass=b".to_string()));
        assert_eq!(body.top_level_fields(), 0);
    }

    #[test]
    fn test_method_is_uppercased() {
        let endpoint = Endpoint::new(0, "post", "https://example.com/login");
        assert_eq!(endpoint.method, "POST");
    }

    #[test]
    fn test_name_uses_last_segment() {
        let endpoint = Endpoint::new(0, "GET", "https://example.com/api/v1/users?page=2");
        assert_eq!(endpoint.name(), "get_users");

        let root = Endpoint::new(1, "POST", "https://example.com/");
        assert_eq!(root.name(), "post_root");
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Endpoint::new(0, "POST", "https://example.com/auth/token").kind(),
            EndpointKind::Authentication
        );
        assert_eq!(
            Endpoint::new(0, "GET", "https://example.com/api/items").kind(),
            EndpointKind::Api
        );
        assert_eq!(
            Endpoint::new(0, "GET", "https://example.com/items").kind(),
            EndpointKind::Reconnaissance
        );
        assert_eq!(
            Endpoint::new(0, "PATCH", "https://example.com/items/1").kind(),
            EndpointKind::Execution
        );
        assert_eq!(
            Endpoint::new(0, "DELETE", "https://example.com/items/1").kind(),
            EndpointKind::Destruction
        );
        assert_eq!(
            Endpoint::new(0, "HEAD", "https://example.com/items").kind(),
            EndpointKind::Standard
        );
    }

    #[test]
    fn test_path_pattern_replaces_identifiers() {
        let endpoint = Endpoint::new(
            0,
            "GET",
            "https://example.com/users/42/orders/3f2b8c1e-9a4d-4e7b-8c2a-1b2c3d4e5f60/items/507f1f77bcf86cd799439011",
        );
        assert_eq!(
            endpoint.path_pattern(),
            "/users/{id}/orders/{uuid}/items/{objectId}"
        );
    }

    #[test]
    fn test_path_falls_back_for_relative_url() {
        let endpoint = Endpoint::new(0, "GET", "/api/users?x=1");
        assert_eq!(endpoint.path(), "/api/users");
    }

    #[test]
    fn test_complete_only_once() {
        let mut endpoint = Endpoint::new(0, "GET", "https://example.com/");
        assert!(endpoint.complete(Outcome::Extracted("first".to_string())));
        assert!(!endpoint.complete(Outcome::Extracted("second".to_string())));
        assert_eq!(
            endpoint.outcome(),
            Some(&Outcome::Extracted("first".to_string()))
        );
    }

    #[test]
    fn test_to_curl_includes_headers_query_and_body() {
        let endpoint = Endpoint::new(0, "POST", "https://example.com/api/items")
            .with_header("Authorization", "Bearer abc")
            .with_query("dry", "true")
            .with_body(Body::parse(r#"{"name":"x"}"#));

        let curl = endpoint.to_curl();
        assert!(curl.starts_with("curl -X POST \"https://example.com/api/items?dry=true\""));
        assert!(curl.contains("-H \"Authorization: Bearer abc\""));
        assert!(curl.contains(r#"-d '{"name":"x"}'"#));
    }

    #[test]
    fn test_full_url_does_not_duplicate_query() {
        let endpoint = Endpoint::new(0, "GET", "https://example.com/search?q=rust")
            .with_query("q", "rust");
        assert_eq!(endpoint.full_url(), "https://example.com/search?q=rust");
    }
}
