//! Question answering over the active video session

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use vqa_core::{format_timestamp, Transcript};
use vqa_llm::{AnswerClient, AnswerError, KeyStore, TokenUsage};

use crate::config::Config;
use crate::context::{
    excerpt_around, just_said_answer, ContextSelection, ContextSelector, Intent,
    QuestionClassifier, SelectionStrategy,
};
use crate::playback::PlaybackTracker;
use crate::session::{Session, SessionId, SessionIdAllocator};
use crate::transcription::TranscriptSource;

/// What the user sees in response to a question
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Model answer
    Answer {
        text: String,
        model: String,
        usage: Option<TokenUsage>,
    },
    /// Recently spoken text, answered without the model
    JustSaid { text: String },
    /// Transcript excerpt shown because the model is rate limited
    Excerpt { text: String, error: AnswerError },
    /// Classified failure with guidance
    Failure { text: String, error: AnswerError },
}

impl Reply {
    /// Chat-visible message
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer { text, .. }
            | Reply::JustSaid { text }
            | Reply::Excerpt { text, .. }
            | Reply::Failure { text, .. } => text,
        }
    }

    pub fn error(&self) -> Option<&AnswerError> {
        match self {
            Reply::Excerpt { error, .. } | Reply::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, Reply::Answer { .. })
    }
}

/// Result of answering one question
#[derive(Debug, Clone)]
pub struct Outcome {
    pub session_id: SessionId,
    pub intent: Intent,
    pub selection: ContextSelection,
    pub reply: Reply,
}

/// Why a question produced no outcome
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AskError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Video changed while answering (asked in {asked}, now {current})")]
    Stale { asked: SessionId, current: SessionId },
}

/// Turn an answer failure into guidance for the user
pub fn failure_message(error: &AnswerError) -> String {
    match error {
        AnswerError::CredentialMissing => {
            "The assistant is not configured yet. Add an OpenAI API key to start asking questions about this video.".to_string()
        }
        AnswerError::MalformedCredential(_) | AnswerError::AuthInvalid(_) => {
            "Your API key was rejected. Please update it in the settings and try again.".to_string()
        }
        AnswerError::QuotaExceeded(_) => {
            "Your API account has run out of credit. Check your plan and billing details, then try again.".to_string()
        }
        AnswerError::RateLimited { .. } => {
            "The AI service is receiving too many requests right now. Please try again in a minute.".to_string()
        }
        AnswerError::Network(_) => {
            "Could not reach the AI service. Check your internet connection and try again.".to_string()
        }
        AnswerError::Unknown(detail) => format!("Error: {}", detail),
    }
}

fn failure_reply(error: AnswerError, selection: &ContextSelection, current_time: f64) -> Reply {
    if matches!(error, AnswerError::RateLimited { .. })
        && selection.strategy != SelectionStrategy::NoTranscript
    {
        let excerpt = excerpt_around(&selection.text, current_time);
        if !excerpt.is_empty() {
            return Reply::Excerpt {
                text: format!(
                    "The AI service is rate limited right now, so here is what the video says around {}:\n\n{}",
                    format_timestamp(current_time),
                    excerpt
                ),
                error,
            };
        }
    }

    Reply::Failure {
        text: failure_message(&error),
        error,
    }
}

/// Answers questions about whichever video is currently loaded.
///
/// The current [`Session`] lives behind a `watch` channel and is replaced
/// wholesale on every video change. Questions are served one at a time in
/// submission order; an answer computed for a session that has since been
/// replaced is discarded.
pub struct VideoAssistant {
    classifier: QuestionClassifier,
    selector: ContextSelector,
    client: AnswerClient,
    keys: Arc<dyn KeyStore>,
    source: Arc<dyn TranscriptSource>,
    tracker: PlaybackTracker,
    sessions: watch::Sender<Arc<Session>>,
    ids: SessionIdAllocator,
    queue: Mutex<()>,
    fast_path_min_chars: usize,
}

impl VideoAssistant {
    pub fn new(
        config: &Config,
        source: Arc<dyn TranscriptSource>,
        client: AnswerClient,
        keys: Arc<dyn KeyStore>,
        tracker: PlaybackTracker,
    ) -> Self {
        let (sessions, _) = watch::channel(Arc::new(Session::idle()));
        Self {
            classifier: QuestionClassifier::new(),
            selector: ContextSelector::new(config.selection.clone()),
            client,
            keys,
            source,
            tracker,
            sessions,
            ids: SessionIdAllocator::new(),
            queue: Mutex::new(()),
            fast_path_min_chars: config.assistant.fast_path_min_chars,
        }
    }

    /// Current session snapshot
    pub fn session(&self) -> Arc<Session> {
        self.sessions.borrow().clone()
    }

    /// Watch session changes
    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.sessions.subscribe()
    }

    pub fn tracker(&self) -> &PlaybackTracker {
        &self.tracker
    }

    /// Start a new session for `video_id`.
    ///
    /// A transcript that cannot be fetched is treated as empty.
    pub async fn load_video(&self, video_id: &str, video_title: &str) -> Arc<Session> {
        let transcript = match self.source.fetch_transcript(video_id).await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!("No transcript for {} from {} source: {:#}", video_id, self.source.name(), e);
                Transcript::empty()
            }
        };

        let session = Arc::new(Session::new(self.ids.allocate(), video_id, video_title, transcript));
        self.sessions.send_replace(session.clone());
        self.tracker.reset();

        info!(
            "🎬 Session {} started for {} ({} segments, {})",
            session.id,
            video_id,
            session.transcript.len(),
            format_timestamp(session.transcript.total_duration())
        );
        session
    }

    /// Classify `question` and pick its transcript context, without answering
    pub fn select_context(
        &self,
        session: &Session,
        question: &str,
        current_time: f64,
    ) -> (Intent, ContextSelection) {
        let intent = self.classifier.classify(question);
        let selection = self.selector.select(
            intent,
            &session.transcript,
            current_time,
            &session.video_title,
        );
        (intent, selection)
    }

    /// Answer against the current session
    pub async fn ask(&self, question: &str) -> Result<Outcome, AskError> {
        let session = self.session();
        self.ask_in(session, question).await
    }

    /// Answer against `session`, the session current when the question was submitted
    pub async fn ask_in(&self, session: Arc<Session>, question: &str) -> Result<Outcome, AskError> {
        let asked_at = self.tracker.current_time();
        self.ask_at(session, question, asked_at).await
    }

    /// Answer against `session` at playback position `current_time`.
    ///
    /// Both are captured by the caller at submission; waiting for an earlier
    /// question to finish does not move the position used for context.
    pub async fn ask_at(
        &self,
        session: Arc<Session>,
        question: &str,
        current_time: f64,
    ) -> Result<Outcome, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let _turn = self.queue.lock().await;

        let (intent, selection) = self.select_context(&session, question, current_time);
        debug!(
            "Question in session {} at {}: {} context via {}",
            session.id,
            format_timestamp(current_time),
            intent,
            selection.strategy
        );

        let reply = match just_said_answer(intent, &selection, self.fast_path_min_chars) {
            Some(text) => {
                info!("⚡ Answered locally from the last {} segments", selection.segments.len());
                Reply::JustSaid { text }
            }
            None => {
                let credential = self.keys.get_credential();
                match self
                    .client
                    .answer(
                        question,
                        &selection.text,
                        &session.video_title,
                        current_time,
                        credential.as_deref(),
                    )
                    .await
                {
                    Ok(answer) => Reply::Answer {
                        text: answer.text,
                        model: answer.model,
                        usage: answer.usage,
                    },
                    Err(e) => {
                        warn!("Answer failed: {}", e);
                        failure_reply(e, &selection, current_time)
                    }
                }
            }
        };

        let current = self.sessions.borrow().id;
        if current != session.id {
            info!("Discarding answer for session {}, now in {}", session.id, current);
            return Err(AskError::Stale {
                asked: session.id,
                current,
            });
        }

        Ok(Outcome {
            session_id: session.id,
            intent,
            selection,
            reply,
        })
    }
}
