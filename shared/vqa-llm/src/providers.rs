//! Completion endpoint implementations

use crate::{Credential, LLMConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    /// Create new chat message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Get role
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Get content
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// One prompt exchange with the remote model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
}

impl CompletionRequest {
    /// Same prompts against a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new("system", self.system_prompt.as_str()),
            ChatMessage::new("user", self.user_prompt.as_str()),
        ]
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Successful completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

/// Failure of a single request
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EndpointError {
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for EndpointError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EndpointError::Decode(e.to_string())
        } else {
            EndpointError::Transport(e.to_string())
        }
    }
}

/// Remote completion endpoint
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest,
        credential: &Credential,
    ) -> std::result::Result<Completion, EndpointError>;

    /// Round trip that succeeds only when the provider accepts `credential`
    async fn check_credential(&self, credential: &Credential) -> std::result::Result<(), EndpointError>;

    fn provider_name(&self) -> &str;
}

/// OpenAI-compatible chat completions endpoint
pub struct OpenAIEndpoint {
    url: String,
    models_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<TokenUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

impl OpenAIEndpoint {
    pub fn new(config: &LLMConfig) -> std::result::Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .build()?;

        Ok(Self {
            url: config.endpoint().to_string(),
            models_url: config.models_endpoint().to_string(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            client,
        })
    }
}

/// Parse a `Retry-After` header given in seconds
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Turn a non-success response into a status error
async fn status_error(response: reqwest::Response) -> EndpointError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    EndpointError::Status {
        status,
        retry_after,
        body,
    }
}

#[async_trait]
impl CompletionEndpoint for OpenAIEndpoint {
    async fn complete(
        &self,
        request: &CompletionRequest,
        credential: &Credential,
    ) -> std::result::Result<Completion, EndpointError> {
        let body = OpenAIRequest {
            model: request.model.clone(),
            messages: request.messages(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Sending request to {} with model {}", self.url, request.model);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: OpenAIResponse = response.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EndpointError::Decode("No choices in completion response".to_string()))?;

        Ok(Completion {
            text,
            usage: parsed.usage,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn check_credential(&self, credential: &Credential) -> std::result::Result<(), EndpointError> {
        debug!("Checking API key against {}", self.models_url);

        let response = self
            .client
            .get(&self.models_url)
            .bearer_auth(credential.expose())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Endpoint replaying scripted results, for tests and offline runs.
///
/// Every request is recorded. Once the script is exhausted it answers
/// "Mock response", and key checks pass unless a failure was scripted.
#[derive(Default)]
pub struct ScriptedEndpoint {
    script: Mutex<VecDeque<std::result::Result<Completion, EndpointError>>>,
    checks: Mutex<VecDeque<std::result::Result<(), EndpointError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every completion by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue the result of the next key check
    pub fn check(self, result: std::result::Result<(), EndpointError>) -> Self {
        self.checks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
        self
    }

    /// Most completions that were ever in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Queue a result for the next request
    pub fn push(self, result: std::result::Result<Completion, EndpointError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
        self
    }

    /// Queue a successful completion
    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(Completion {
            text: text.to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            }),
            model: "scripted".to_string(),
        }))
    }

    /// Queue an HTTP error
    pub fn status(self, status: u16, body: &str) -> Self {
        self.push(Err(EndpointError::Status {
            status,
            retry_after: None,
            body: body.to_string(),
        }))
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl CompletionEndpoint for ScriptedEndpoint {
    async fn complete(
        &self,
        request: &CompletionRequest,
        _credential: &Credential,
    ) -> std::result::Result<Completion, EndpointError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        next.unwrap_or_else(|| {
            Ok(Completion {
                text: "Mock response".to_string(),
                usage: None,
                model: request.model.clone(),
            })
        })
    }

    async fn check_credential(&self, _credential: &Credential) -> std::result::Result<(), EndpointError> {
        let next = self.checks.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        next.unwrap_or(Ok(()))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}
