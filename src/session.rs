use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use vqa_core::Transcript;

/// Monotonic identifier of one video session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Session in effect before any video is loaded
    pub const IDLE: SessionId = SessionId(0);
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out increasing session ids, starting after [`SessionId::IDLE`]
#[derive(Debug)]
pub struct SessionIdAllocator {
    next: AtomicU64,
}

impl SessionIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything known about the video being watched.
///
/// Sessions are never mutated; a video change publishes a new one.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub video_id: String,
    pub video_title: String,
    pub transcript: Transcript,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: SessionId,
        video_id: impl Into<String>,
        video_title: impl Into<String>,
        transcript: Transcript,
    ) -> Self {
        Self {
            id,
            video_id: video_id.into(),
            video_title: video_title.into(),
            transcript,
            started_at: Utc::now(),
        }
    }

    /// Placeholder session with no video and no transcript
    pub fn idle() -> Self {
        Self::new(SessionId::IDLE, "", "", Transcript::empty())
    }

    pub fn is_idle(&self) -> bool {
        self.id == SessionId::IDLE
    }

    /// Seconds since this session started
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let allocator = SessionIdAllocator::new();
        let first = allocator.allocate();
        let second = allocator.allocate();

        assert!(first > SessionId::IDLE);
        assert!(second > first);
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn test_idle_session() {
        let session = Session::idle();
        assert!(session.is_idle());
        assert!(session.transcript.is_empty());
        assert!(session.age_seconds() >= 0);
    }
}
