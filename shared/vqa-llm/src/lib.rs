//! VQA LLM - completion API client, prompts and failure classification

pub mod answer;
pub mod config;
pub mod credentials;
pub mod prompts;
pub mod providers;

pub use answer::{Answer, AnswerClient, RecordingSleeper, Sleeper, TokioSleeper};
pub use config::{LLMConfig, RetryPolicy};
pub use credentials::{Credential, EnvKeyStore, KeyStore, MemoryKeyStore};
pub use providers::{
    ChatMessage, Completion, CompletionEndpoint, CompletionRequest, EndpointError,
    OpenAIEndpoint, ScriptedEndpoint, TokenUsage,
};

/// Result type for answer operations
pub type Result<T> = std::result::Result<T, AnswerError>;

/// Classified failures surfaced to the caller of the answer client
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnswerError {
    #[error("API key not configured")]
    CredentialMissing,

    #[error("API key format appears invalid: {0}")]
    MalformedCredential(String),

    #[error("Rate limit exceeded after {attempts} attempts: {detail}")]
    RateLimited { attempts: u32, detail: String },

    #[error("Authentication failed: {0}")]
    AuthInvalid(String),

    #[error("Insufficient quota: {0}")]
    QuotaExceeded(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion API error: {0}")]
    Unknown(String),
}

impl AnswerError {
    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AnswerError::RateLimited { .. } | AnswerError::Network(_))
    }
}
