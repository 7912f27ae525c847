use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vqa_core::{parse_timestamp, Transcript, TranscriptSegment};

/// SRT (SubRip Subtitle) entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SRTEntry {
    /// Sequential number
    pub index: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Subtitle text, lines joined with spaces
    pub text: String,
}

impl SRTEntry {
    /// Create a new SRT entry
    pub fn new(index: u32, start: f64, end: f64, text: String) -> Self {
        Self {
            index,
            start,
            end,
            text: text.trim().to_string(),
        }
    }
}

impl From<SRTEntry> for TranscriptSegment {
    fn from(entry: SRTEntry) -> Self {
        TranscriptSegment::new(entry.start, entry.end, entry.text)
    }
}

/// Parse a `HH:MM:SS,mmm --> HH:MM:SS,mmm` timing line
fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let (start, end) = line.split_once("-->")?;
    // cue settings may trail the end timestamp
    let end = end.split_whitespace().next()?;
    let start = parse_timestamp(start.trim()).ok()?;
    let end = parse_timestamp(end).ok()?;
    Some((start, end))
}

/// Parse one blank-line separated cue block
fn parse_block(block: &str, fallback_index: u32) -> Option<SRTEntry> {
    let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();

    let first = lines.next()?;
    let (index, timing) = match first.parse::<u32>() {
        Ok(index) => (index, lines.next()?),
        Err(_) => (fallback_index, first),
    };

    let (start, end) = parse_timing(timing)?;
    let text = lines.collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    Some(SRTEntry::new(index, start, end, text))
}

/// SRT content parser
pub struct SRTParser;

impl SRTParser {
    /// Parse SRT content into entries, skipping malformed cue blocks
    pub fn parse(content: &str) -> Vec<SRTEntry> {
        let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let blocks: Vec<&str> = normalized
            .split("\n\n")
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .collect();

        let mut entries = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            match parse_block(block, (i + 1) as u32) {
                Some(entry) => entries.push(entry),
                None => warn!("Skipping malformed SRT block {}", i + 1),
            }
        }

        debug!("Parsed {} of {} SRT blocks", entries.len(), blocks.len());
        entries
    }

    /// Parse SRT content straight into a transcript
    pub fn parse_transcript(content: &str) -> Transcript {
        Transcript::new(
            Self::parse(content)
                .into_iter()
                .map(TranscriptSegment::from)
                .collect(),
        )
    }
}
