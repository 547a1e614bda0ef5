use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const FALLBACK_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Model settings sent along with every prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelProfile {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            // Low temperature keeps extraction output stable between runs
            temperature: 0.1,
            max_tokens: 4000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Retry and profile settings for [`crate::ReasoningClient`].
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Total attempts per invocation, including the first one
    pub max_retries: u32,
    /// Backoff after attempt `n` is `backoff_unit * 2^n`
    pub backoff_unit: Duration,
    pub primary: ModelProfile,
    /// Used for every attempt after the second failure
    pub fallback: ModelProfile,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
            primary: ModelProfile::new(DEFAULT_MODEL),
            fallback: ModelProfile::new(FALLBACK_MODEL),
        }
    }
}

impl ReasoningConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_primary(mut self, profile: ModelProfile) -> Self {
        self.primary = profile;
        self
    }

    pub fn with_fallback(mut self, profile: ModelProfile) -> Self {
        self.fallback = profile;
        self
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let config = ReasoningConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_saturates() {
        let config = ReasoningConfig::default();
        assert_eq!(config.backoff_delay(64), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_default_profiles() {
        let config = ReasoningConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.primary.model, "gpt-4o");
        assert_eq!(config.fallback.model, "gpt-4o-mini");
        assert_eq!(config.primary.max_tokens, 4000);
    }
}
