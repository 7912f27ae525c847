pub mod source;
pub mod srt;

pub use source::{FileTranscriptSource, StaticTranscriptSource, TranscriptSource};
pub use srt::{SRTEntry, SRTParser};
