//! Completion API configuration and retry policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry/backoff policy for rate limits and transport failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay, doubled on each retry
    pub base_delay_ms: u64,
    /// Upper bound for a single delay, including server hints
    pub max_delay_ms: u64,
    /// Deadline for the whole call including all retries
    pub deadline_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            deadline_seconds: 45,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry_index` (0-based).
    ///
    /// A server-supplied hint replaces the exponential delay; both are capped
    /// at `max_delay_ms`.
    pub fn backoff_delay(&self, retry_index: u32, hint: Option<Duration>) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retry_index));
        let delay = hint.unwrap_or(Duration::from_millis(exponential));
        delay.min(Duration::from_millis(self.max_delay_ms))
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LLMConfig {
    endpoint: String,
    models_endpoint: String,
    model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
    temperature: f32,
    timeout_seconds: u64,
    api_key_env: String,
    retry: RetryPolicy,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            models_endpoint: "https://api.openai.com/v1/models".to_string(),
            model: "gpt-4o".to_string(),
            fallback_model: Some("gpt-3.5-turbo".to_string()),
            max_tokens: 500,
            temperature: 0.7,
            timeout_seconds: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LLMConfig {
    /// Create new LLM config
    pub fn new() -> Self {
        Self::default()
    }

    /// Get endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Set endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Model listing used to verify a key
    pub fn models_endpoint(&self) -> &str {
        &self.models_endpoint
    }

    pub fn with_models_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.models_endpoint = endpoint.into();
        self
    }

    /// Get model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Model retried once when the primary is unavailable
    pub fn fallback_model(&self) -> Option<&str> {
        self.fallback_model.as_deref()
    }

    pub fn with_fallback_model(mut self, model: Option<String>) -> Self {
        self.fallback_model = model;
        self
    }

    /// Get max tokens
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Get temperature
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Per-request timeout
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = var.into();
        self
    }

    /// Get retry policy
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Set retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0, None), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(1, None), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2, None), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_honors_and_caps_hint() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_delay(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.backoff_delay(0, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
        assert_eq!(policy.backoff_delay(40, None), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LLMConfig = toml::from_str("model = \"gpt-4o-mini\"\n[retry]\nmax_retries = 3\n")
            .unwrap();
        assert_eq!(config.model(), "gpt-4o-mini");
        assert_eq!(config.retry().max_retries, 3);
        assert_eq!(config.retry().base_delay_ms, 2000);
        assert_eq!(config.fallback_model(), Some("gpt-3.5-turbo"));
    }
}
