//! Answer client: prompt exchange with retry/backoff and failure classification
//!
//! Each call runs a small state machine:
//!
//! ```text
//! Sending --ok--------------------------------> Done(Answer)
//!    |--429 / transport, budget left--> Backoff --sleep--> Sending
//!    |--429 / transport, no budget----> Done(RateLimited | Network)
//!    |--model unavailable, fallback---> Sending (fallback model, once)
//!    |--401---------------------------> Done(AuthInvalid)
//!    `--other-------------------------> Done(QuotaExceeded | Unknown)
//! ```
//!
//! The whole loop runs under the policy deadline.

use crate::prompts::{system_prompt, user_prompt};
use crate::providers::{CompletionEndpoint, CompletionRequest, EndpointError, TokenUsage};
use crate::{AnswerError, Credential, LLMConfig, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Suspension used between retries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        tokio::task::yield_now().await;
    }
}

/// Model answer
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

/// How a failed request should be handled
#[derive(Debug, Clone, PartialEq)]
enum Failure {
    RateLimited { retry_after: Option<Duration>, detail: String },
    Transient(String),
    AuthInvalid(String),
    QuotaExceeded(String),
    ModelUnavailable(String),
    Fatal(String),
}

/// Pull `error.message` out of a provider error body, falling back to the raw body
fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn classify(error: EndpointError) -> Failure {
    match error {
        EndpointError::Status { status, retry_after, body } => {
            let detail = format!("HTTP {}: {}", status, provider_message(&body));
            match status {
                429 if body.contains("insufficient_quota") => Failure::QuotaExceeded(detail),
                429 => Failure::RateLimited { retry_after, detail },
                401 => Failure::AuthInvalid(detail),
                404 => Failure::ModelUnavailable(detail),
                _ if body.contains("model_not_found") => Failure::ModelUnavailable(detail),
                _ => Failure::Fatal(detail),
            }
        }
        EndpointError::Transport(detail) => Failure::Transient(detail),
        EndpointError::Decode(detail) => Failure::Fatal(detail),
    }
}

enum CallState {
    Sending { model: String },
    Backoff { model: String, delay: Duration },
    Done(Result<Answer>),
}

/// Sends questions with assembled context to the completion endpoint
pub struct AnswerClient {
    endpoint: Arc<dyn CompletionEndpoint>,
    sleeper: Arc<dyn Sleeper>,
    config: LLMConfig,
}

impl AnswerClient {
    /// Create new answer client using the real timer
    pub fn new(endpoint: Arc<dyn CompletionEndpoint>, config: LLMConfig) -> Self {
        Self::with_sleeper(endpoint, Arc::new(TokioSleeper), config)
    }

    pub fn with_sleeper(
        endpoint: Arc<dyn CompletionEndpoint>,
        sleeper: Arc<dyn Sleeper>,
        config: LLMConfig,
    ) -> Self {
        Self {
            endpoint,
            sleeper,
            config,
        }
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    /// Answer `question` about `video_title` from `context`.
    ///
    /// The credential is validated locally first; absent or malformed keys
    /// never reach the network.
    pub async fn answer(
        &self,
        question: &str,
        context: &str,
        video_title: &str,
        current_time: f64,
        credential: Option<&str>,
    ) -> Result<Answer> {
        let credential = Credential::parse(credential.ok_or(AnswerError::CredentialMissing)?)?;

        let request = CompletionRequest {
            system_prompt: system_prompt(video_title, current_time),
            user_prompt: user_prompt(question, context, video_title, current_time),
            model: self.config.model().to_string(),
        };

        let deadline = self.config.retry().deadline();
        debug!(
            "Answering with {} ({}), deadline {:?}",
            self.endpoint.provider_name(),
            credential.redacted(),
            deadline
        );

        match tokio::time::timeout(deadline, self.run(&request, &credential)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Answer deadline of {:?} exceeded", deadline);
                Err(AnswerError::Network(format!(
                    "deadline of {}s exceeded",
                    deadline.as_secs()
                )))
            }
        }
    }

    /// Check `credential` with the provider before it is saved.
    ///
    /// The local format check runs first. Provider rejections are classified
    /// like answer failures: 401 as `AuthInvalid`, 429 as `RateLimited` or
    /// `QuotaExceeded`.
    pub async fn verify_credential(&self, credential: Option<&str>) -> Result<()> {
        let credential = Credential::parse(credential.ok_or(AnswerError::CredentialMissing)?)?;
        debug!("Verifying API key {}", credential.redacted());

        let failure = match self.endpoint.check_credential(&credential).await {
            Ok(()) => {
                info!("API key {} accepted", credential.redacted());
                return Ok(());
            }
            Err(e) => classify(e),
        };

        let error = match failure {
            Failure::RateLimited { detail, .. } => AnswerError::RateLimited { attempts: 1, detail },
            Failure::Transient(detail) => AnswerError::Network(detail),
            Failure::AuthInvalid(detail) => AnswerError::AuthInvalid(detail),
            Failure::QuotaExceeded(detail) => AnswerError::QuotaExceeded(detail),
            Failure::ModelUnavailable(detail) | Failure::Fatal(detail) => AnswerError::Unknown(detail),
        };
        warn!("API key {} not accepted: {}", credential.redacted(), error);
        Err(error)
    }

    async fn run(&self, request: &CompletionRequest, credential: &Credential) -> Result<Answer> {
        let policy = self.config.retry();
        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;
        let mut rate_limits: Vec<String> = Vec::new();
        let mut fallback_used = false;
        let mut state = CallState::Sending {
            model: request.model.clone(),
        };

        loop {
            state = match state {
                CallState::Sending { model } => {
                    attempts += 1;
                    debug!("Attempt {}: sending request with model {}", attempts, model);

                    match self.endpoint.complete(&request.with_model(&model), credential).await {
                        Ok(completion) => {
                            info!("Answer received after {} attempt(s)", attempts);
                            CallState::Done(Ok(Answer {
                                text: completion.text,
                                usage: completion.usage,
                                model: completion.model,
                            }))
                        }
                        Err(e) => match classify(e) {
                            Failure::RateLimited { retry_after, detail } if retries < policy.max_retries => {
                                let delay = policy.backoff_delay(retries, retry_after);
                                retries += 1;
                                warn!(
                                    "Rate limited, retrying in {:?} ({}/{}): {}",
                                    delay, retries, policy.max_retries, detail
                                );
                                rate_limits.push(detail);
                                CallState::Backoff { model, delay }
                            }
                            Failure::RateLimited { detail, .. } => {
                                error!("Rate limit persisted after {} attempts", attempts);
                                rate_limits.push(detail);
                                CallState::Done(Err(AnswerError::RateLimited {
                                    attempts,
                                    detail: rate_limits.join("; "),
                                }))
                            }
                            Failure::Transient(detail) if retries < policy.max_retries => {
                                let delay = policy.backoff_delay(retries, None);
                                retries += 1;
                                warn!(
                                    "Network error, retrying in {:?} ({}/{}): {}",
                                    delay, retries, policy.max_retries, detail
                                );
                                CallState::Backoff { model, delay }
                            }
                            Failure::Transient(detail) => {
                                CallState::Done(Err(AnswerError::Network(detail)))
                            }
                            Failure::ModelUnavailable(detail) => match self.config.fallback_model() {
                                Some(fallback) if !fallback_used && fallback != model => {
                                    fallback_used = true;
                                    warn!("Model {} unavailable, trying fallback {}", model, fallback);
                                    CallState::Sending {
                                        model: fallback.to_string(),
                                    }
                                }
                                _ => CallState::Done(Err(AnswerError::Unknown(format!(
                                    "model {} unavailable: {}",
                                    model, detail
                                )))),
                            },
                            Failure::AuthInvalid(detail) => {
                                CallState::Done(Err(AnswerError::AuthInvalid(detail)))
                            }
                            Failure::QuotaExceeded(detail) => {
                                CallState::Done(Err(AnswerError::QuotaExceeded(detail)))
                            }
                            Failure::Fatal(detail) => CallState::Done(Err(AnswerError::Unknown(detail))),
                        },
                    }
                }
                CallState::Backoff { model, delay } => {
                    self.sleeper.sleep(delay).await;
                    CallState::Sending { model }
                }
                CallState::Done(result) => return result,
            };
        }
    }
}
