/// Video QA - Rust Implementation
///
/// Answers questions about the video being watched from its timestamped
/// transcript: picks the transcript slice relevant to the question and the
/// playback position, then asks a chat-completion model about it.

pub mod assistant;
pub mod config;
pub mod context;
pub mod messages;
pub mod playback;
pub mod session;
pub mod transcription;

// Re-export main types for easy access
pub use crate::assistant::{AskError, Outcome, Reply, VideoAssistant};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::context::{
    ContextSelection, ContextSelector, Intent, QuestionClassifier, SelectionStrategy,
    SelectorConfig,
};
pub use crate::messages::{serve, Command, Event};
pub use crate::playback::{ManualPlaybackHost, PlaybackHost, PlaybackTracker, PollingHandle};
pub use crate::session::{Session, SessionId};
pub use crate::transcription::{FileTranscriptSource, StaticTranscriptSource, TranscriptSource};

pub use vqa_core::{Transcript, TranscriptSegment};
pub use vqa_llm::{AnswerClient, AnswerError, LLMConfig};
