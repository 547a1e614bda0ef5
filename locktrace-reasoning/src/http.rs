use crate::error::{ReasoningError, Result};
use crate::profile::ModelProfile;
use crate::service::{Completion, Prompt, ReasoningService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Reasoning backend speaking the OpenAI-compatible chat completions protocol.
pub struct HttpReasoningService {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpReasoningService {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ReasoningError::ConfigError(
                "an API key is required for the reasoning service".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("LockTrace/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(4).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    async fn complete(&self, profile: &ModelProfile, prompt: &Prompt) -> Result<Completion> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = prompt.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });

        let request = ChatRequest {
            model: &profile.model,
            messages,
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };

        debug!("POST {} ({})", self.endpoint, profile.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ReasoningError::StatusError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ReasoningError::InvalidResponse(format!("Malformed body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ReasoningError::InvalidResponse("Response had no content".to_string()))?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| profile.model.clone()),
        })
    }
}
