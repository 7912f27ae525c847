//! Typed command and event channel between a UI and the assistant

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::assistant::{AskError, Outcome, VideoAssistant};
use crate::session::{Session, SessionId};

/// Requests from the UI
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadVideo {
        video_id: String,
        title: String,
    },
    AskQuestion {
        question: String,
        video_id: Option<String>,
        video_title: Option<String>,
    },
    Shutdown,
}

/// Notifications to the UI
#[derive(Debug, Clone)]
pub enum Event {
    VideoLoaded {
        session_id: SessionId,
        video_id: String,
        title: String,
        segment_count: usize,
    },
    PlaybackTime {
        time: f64,
    },
    Thinking {
        session_id: SessionId,
    },
    Answered {
        session_id: SessionId,
        outcome: Box<Outcome>,
    },
    Discarded {
        session_id: SessionId,
        reason: String,
    },
    Rejected {
        reason: String,
    },
}

async fn emit(events: &mpsc::Sender<Event>, event: Event) {
    if events.send(event).await.is_err() {
        debug!("Event receiver dropped");
    }
}

/// A question with the session and playback position it was asked at
struct PendingQuestion {
    session: Arc<Session>,
    question: String,
    asked_at: f64,
}

/// Answer queued questions one by one, in the order they were submitted
async fn answer_questions(
    assistant: Arc<VideoAssistant>,
    mut pending: mpsc::UnboundedReceiver<PendingQuestion>,
    events: mpsc::Sender<Event>,
) {
    while let Some(PendingQuestion {
        session,
        question,
        asked_at,
    }) = pending.recv().await
    {
        let session_id = session.id;
        emit(&events, Event::Thinking { session_id }).await;

        let event = match assistant.ask_at(session, &question, asked_at).await {
            Ok(outcome) => Event::Answered {
                session_id,
                outcome: Box::new(outcome),
            },
            Err(e @ AskError::Stale { .. }) => Event::Discarded {
                session_id,
                reason: e.to_string(),
            },
            Err(e) => Event::Rejected {
                reason: e.to_string(),
            },
        };
        emit(&events, event).await;
    }
}

/// Run the assistant until `Shutdown` or until the command channel closes.
///
/// Playback is sampled every `poll_interval` for the lifetime of the loop.
/// Questions go to a single worker task so a video change can arrive while
/// one is being answered; queued questions are answered before returning.
pub async fn serve(
    assistant: Arc<VideoAssistant>,
    poll_interval: Duration,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
) {
    let _polling = assistant.tracker().spawn(poll_interval, Some(events.clone()));
    let (pending, queue) = mpsc::unbounded_channel();
    let worker = tokio::spawn(answer_questions(assistant.clone(), queue, events.clone()));
    info!("🚀 Video assistant ready");

    while let Some(command) = commands.recv().await {
        match command {
            Command::LoadVideo { video_id, title } => {
                let session = assistant.load_video(&video_id, &title).await;
                emit(
                    &events,
                    Event::VideoLoaded {
                        session_id: session.id,
                        video_id,
                        title,
                        segment_count: session.transcript.len(),
                    },
                )
                .await;
            }
            Command::AskQuestion {
                question,
                video_id,
                video_title,
            } => {
                let session = assistant.session();
                if let Some(video_id) = video_id.filter(|id| *id != session.video_id) {
                    warn!(
                        "Question for {} ({}) answered against current video {}",
                        video_id,
                        video_title.as_deref().unwrap_or("untitled"),
                        session.video_id
                    );
                }

                let asked_at = assistant.tracker().current_time();
                let question = PendingQuestion {
                    session,
                    question,
                    asked_at,
                };
                if pending.send(question).is_err() {
                    warn!("Question worker stopped, dropping question");
                }
            }
            Command::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    drop(pending);
    if let Err(e) = worker.await {
        warn!("Question worker failed: {}", e);
    }
    info!("👋 Video assistant stopped");
}
