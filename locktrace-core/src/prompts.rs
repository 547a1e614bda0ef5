// Prompt construction for the reasoning service

use crate::graph::AUTH_HEADERS;
use crate::model::{Body, Endpoint, Outcome};
use locktrace_reasoning::Prompt;
use std::collections::BTreeMap;
use std::fmt::Write;

const REDACTED: &str = "<redacted>";

const SYSTEM: &str = "You analyze captured HTTP traffic and explain how the requests \
depend on each other. Answer precisely and do not invent endpoints.";

pub fn analysis_prompt(target: &str, endpoints: &[Endpoint]) -> Prompt {
    let mut user = format!(
        "Analyze the captured requests and identify the workflow that accomplishes: \"{}\"\n\nRequests:\n",
        target
    );
    for (i, endpoint) in endpoints.iter().enumerate() {
        let _ = writeln!(user, "{}. {} {}", i + 1, endpoint.method, endpoint.url);
    }
    user.push_str(
        "\nIdentify:\n\
         1. The request that accomplishes the goal\n\
         2. Prerequisite requests it depends on\n\
         3. The order in which they must run\n\
         \nReturn a JSON object.",
    );

    Prompt::new(user).with_system(SYSTEM)
}

/// Per-endpoint prompt. `prerequisites` pairs each completed prerequisite
/// with its recorded outcome.
pub fn endpoint_prompt(
    target: &str,
    endpoint: &Endpoint,
    prerequisites: &[(&Endpoint, &Outcome)],
    variables: &BTreeMap<String, String>,
    credential_hints: &[String],
) -> Prompt {
    let mut user = format!(
        "Goal: \"{}\"\n\nRequest: {} {}\nKind: {} ({})\nDifficulty: {}/10\n",
        target,
        endpoint.method,
        endpoint.url,
        endpoint.kind().as_str(),
        endpoint.kind().strategy(),
        endpoint.difficulty()
    );

    if !endpoint.headers.is_empty() {
        user.push_str("Headers:\n");
        for (name, value) in &endpoint.headers {
            let _ = writeln!(user, "  {}: {}", name, header_value_for_prompt(name, value));
        }
    }

    match endpoint.body {
        Some(Body::Json(ref value)) => {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            let _ = writeln!(user, "Payload:\n{}", pretty);
        }
        Some(Body::Raw(ref text)) => {
            let _ = writeln!(user, "Payload:\n{}", text);
        }
        None => {}
    }

    if !prerequisites.is_empty() {
        user.push_str("\nResults of prerequisite requests:\n");
        for (prerequisite, outcome) in prerequisites {
            let status = if outcome.is_failed() { "failed" } else { "ok" };
            let _ = writeln!(
                user,
                "- {} [{}]: {}",
                prerequisite.name(),
                status,
                outcome.detail()
            );
        }
    }

    if !variables.is_empty() {
        user.push_str("\nVariables:\n");
        for (key, value) in variables {
            let _ = writeln!(user, "  {} = {}", key, value);
        }
    }

    if !credential_hints.is_empty() {
        let _ = writeln!(
            user,
            "\nSession cookies available: {}",
            credential_hints.join(", ")
        );
    }

    user.push_str(
        "\nIdentify what this request does, which credentials and dynamic tokens it \
         needs, and which values must be extracted from earlier responses.",
    );

    Prompt::new(user).with_system(SYSTEM)
}

pub fn synthesis_prompt(
    target: &str,
    master: Option<&Endpoint>,
    completed: &[&Endpoint],
    variables: &BTreeMap<String, String>,
) -> Prompt {
    let mut user = format!(
        "Write a complete JavaScript integration module for: \"{}\"\n\nMain request: {}\n",
        target,
        master.map(Endpoint::name).unwrap_or_else(|| "not found".to_string())
    );

    if !completed.is_empty() {
        user.push_str("\nAnalyzed requests, in order:\n");
        for endpoint in completed {
            let _ = writeln!(user, "- {} {}", endpoint.method, endpoint.url);
            if let Some(outcome) = endpoint.outcome()
                && !outcome.is_failed()
            {
                let _ = writeln!(user, "  {}", outcome.detail());
            }
        }
    }

    if !variables.is_empty() {
        user.push_str("\nVariables:\n");
        for (key, value) in variables {
            let _ = writeln!(user, "  {} = {}", key, value);
        }
    }

    user.push_str(
        "\nRequirements:\n\
         1. Use fetch() for HTTP calls\n\
         2. Handle authentication headers and cookies\n\
         3. Extract dynamic tokens from responses\n\
         4. Handle errors for failed requests\n\
         5. Keep it modular and reusable\n\
         \nReturn only the code.",
    );

    Prompt::new(user).with_system(SYSTEM)
}

/// Credential-bearing header values never leave the process.
fn header_value_for_prompt<'a>(name: &str, value: &'a str) -> &'a str {
    if AUTH_HEADERS
        .iter()
        .any(|header| header.eq_ignore_ascii_case(name))
    {
        REDACTED
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_lists_requests() {
        let endpoints = vec![
            Endpoint::new(0, "POST", "https://example.com/login"),
            Endpoint::new(1, "GET", "https://example.com/account"),
        ];
        let prompt = analysis_prompt("read my balance", &endpoints);
        assert!(prompt.user.contains("1. POST https://example.com/login"));
        assert!(prompt.user.contains("2. GET https://example.com/account"));
        assert!(prompt.system.is_some());
    }

    #[test]
    fn test_endpoint_prompt_includes_context() {
        let login = Endpoint::new(0, "POST", "https://example.com/login");
        let outcome = Outcome::Extracted("session cookie sid".to_string());
        let account = Endpoint::new(1, "GET", "https://example.com/account");
        let mut variables = BTreeMap::new();
        variables.insert("user".to_string(), "alice".to_string());

        let prompt = endpoint_prompt(
            "read my balance",
            &account,
            &[(&login, &outcome)],
            &variables,
            &["sid (.example.com)".to_string()],
        );

        assert!(prompt.user.contains("post_login [ok]: session cookie sid"));
        assert!(prompt.user.contains("user = alice"));
        assert!(prompt.user.contains("sid (.example.com)"));
    }

    #[test]
    fn test_endpoint_prompt_redacts_auth_headers() {
        let endpoint = Endpoint::new(0, "GET", "https://example.com/api/me")
            .with_header("Cookie", "sid=s3cr3t")
            .with_header("AUTHORIZATION", "Bearer tok-123")
            .with_header("X-Api-Key", "key-456")
            .with_header("Accept", "application/json");

        let prompt = endpoint_prompt("read my profile", &endpoint, &[], &BTreeMap::new(), &[]);

        assert!(!prompt.user.contains("s3cr3t"));
        assert!(!prompt.user.contains("tok-123"));
        assert!(!prompt.user.contains("key-456"));
        assert!(prompt.user.contains("Cookie: <redacted>"));
        assert!(prompt.user.contains("AUTHORIZATION: <redacted>"));
        assert!(prompt.user.contains("Accept: application/json"));
    }
}
