use crate::error::Result;
use crate::profile::ModelProfile;
use async_trait::async_trait;

/// A prompt sent to the reasoning service. The text is opaque to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

/// A backend able to answer a single prompt with a given model profile.
///
/// Implementations make exactly one attempt; retries belong to
/// [`crate::ReasoningClient`].
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, profile: &ModelProfile, prompt: &Prompt) -> Result<Completion>;
}
