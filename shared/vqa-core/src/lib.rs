//! VQA Core - transcript data structures and utilities shared by the workspace

pub mod text;
pub mod timestamp;
pub mod transcript;

pub use text::clean_text;
pub use timestamp::{format_timestamp, parse_timestamp};
pub use transcript::{RawSegment, Transcript, TranscriptSegment};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error types for core operations
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
