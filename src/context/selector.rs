use super::Intent;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use vqa_core::{Transcript, TranscriptSegment};

/// Header prefixed to composite and windowed excerpts
pub const TITLE_PREFIX: &str = "VIDEO TITLE:";

const UNTITLED: &str = "Untitled video";

/// Which strategy produced a selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SelectionStrategy {
    RecentWindow,
    IdentityComposite,
    Windowed,
    NoTranscript,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::RecentWindow => "recent-window",
            SelectionStrategy::IdentityComposite => "identity-composite",
            SelectionStrategy::Windowed => "windowed",
            SelectionStrategy::NoTranscript => "no-transcript",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded transcript excerpt assembled for one question
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSelection {
    /// Human-readable excerpt with `[M:SS] utterance` lines
    pub text: String,
    /// Strategy that produced the excerpt
    pub strategy: SelectionStrategy,
    /// Segments the excerpt was built from, in transcript order
    pub segments: Vec<TranscriptSegment>,
}

/// Window sizes used by the selection strategies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Look-back for "just said" questions, in seconds
    pub recent_window_secs: f64,
    /// Segments taken from the start of the video for identity questions
    pub beginning_segments: usize,
    /// Segments either side of the current one for identity questions
    pub position_radius: usize,
    /// Segments either side of the current one for the general window
    pub general_radius: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: 30.0,
            beginning_segments: 15,
            position_radius: 2,
            general_radius: 8,
        }
    }
}

impl SelectorConfig {
    pub const GENERAL_RADIUS_RANGE: std::ops::RangeInclusive<usize> = 5..=8;

    /// Check window sizes, returning a description of each problem found
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.recent_window_secs.is_finite() || self.recent_window_secs <= 0.0 {
            problems.push(format!(
                "recent_window_secs must be positive, got {}",
                self.recent_window_secs
            ));
        }
        if self.beginning_segments == 0 {
            problems.push("beginning_segments must be at least 1".to_string());
        }
        if !Self::GENERAL_RADIUS_RANGE.contains(&self.general_radius) {
            problems.push(format!(
                "general_radius must be within {}..={}, got {}",
                Self::GENERAL_RADIUS_RANGE.start(),
                Self::GENERAL_RADIUS_RANGE.end(),
                self.general_radius
            ));
        }
        problems
    }
}

/// Turns an intent, a transcript and a playback time into a context excerpt.
///
/// Selection is a pure function of its inputs and never fails: an empty
/// transcript yields a title-only placeholder, and strategies that find
/// nothing fall back to the general window.
#[derive(Debug, Clone, Default)]
pub struct ContextSelector {
    config: SelectorConfig,
}

fn lines(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(TranscriptSegment::format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn display_title(title: &str) -> &str {
    let title = title.trim();
    if title.is_empty() {
        UNTITLED
    } else {
        title
    }
}

/// Slice of `len` items within `radius` of `center`, clamped to bounds
fn window(len: usize, center: usize, radius: usize) -> std::ops::Range<usize> {
    let start = center.saturating_sub(radius);
    let end = center.saturating_add(radius).saturating_add(1).min(len);
    start..end
}

impl ContextSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn select(
        &self,
        intent: Intent,
        transcript: &Transcript,
        current_time: f64,
        video_title: &str,
    ) -> ContextSelection {
        let title = display_title(video_title);
        let current_time = if current_time.is_finite() { current_time.max(0.0) } else { 0.0 };

        if transcript.is_empty() {
            return Self::no_transcript(title);
        }

        let selection = match intent {
            Intent::JustSaid => self
                .recent_window(transcript, current_time)
                .unwrap_or_else(|| self.windowed(transcript, current_time, title)),
            Intent::Identity => self.identity_composite(transcript, current_time, title),
            Intent::General => self.windowed(transcript, current_time, title),
        };

        debug!(
            "Selected {} segments for {} question via {}",
            selection.segments.len(),
            intent,
            selection.strategy
        );
        selection
    }

    /// Fixed placeholder used when the video has no captions
    pub fn no_transcript(video_title: &str) -> ContextSelection {
        ContextSelection {
            text: format!(
                "{} {}\n\nNo transcript available for this video.",
                TITLE_PREFIX,
                display_title(video_title)
            ),
            strategy: SelectionStrategy::NoTranscript,
            segments: Vec::new(),
        }
    }

    /// Segments that start inside `[t - window, t]` and either end by `t`
    /// or are still playing at `t`.
    fn recent_window(&self, transcript: &Transcript, current_time: f64) -> Option<ContextSelection> {
        let context_start = (current_time - self.config.recent_window_secs).max(0.0);

        let segments: Vec<TranscriptSegment> = transcript
            .iter()
            .filter(|s| {
                s.start >= context_start
                    && (s.end <= current_time || (s.start <= current_time && s.end >= current_time))
            })
            .cloned()
            .collect();

        if segments.is_empty() {
            return None;
        }

        Some(ContextSelection {
            text: lines(&segments),
            strategy: SelectionStrategy::RecentWindow,
            segments,
        })
    }

    fn identity_composite(
        &self,
        transcript: &Transcript,
        current_time: f64,
        title: &str,
    ) -> ContextSelection {
        let all = transcript.segments();
        let beginning = &all[..self.config.beginning_segments.min(all.len())];
        let position = transcript
            .index_at(current_time)
            .map(|i| &all[window(all.len(), i, self.config.position_radius)])
            .unwrap_or(&[]);

        let mut text = format!("{} {}\n\n", TITLE_PREFIX, title);
        if !beginning.is_empty() {
            text.push_str("BEGINNING OF VIDEO:\n");
            text.push_str(&lines(beginning));
            text.push_str("\n\n");
        }
        if !position.is_empty() {
            text.push_str("CURRENT POSITION:\n");
            text.push_str(&lines(position));
        }

        let mut segments = beginning.to_vec();
        segments.extend(position.iter().filter(|s| !beginning.contains(s)).cloned());

        ContextSelection {
            text: text.trim_end().to_string(),
            strategy: SelectionStrategy::IdentityComposite,
            segments,
        }
    }

    fn windowed(&self, transcript: &Transcript, current_time: f64, title: &str) -> ContextSelection {
        let all = transcript.segments();
        let center = transcript.index_at(current_time).unwrap_or(all.len() / 2);
        let segments = all[window(all.len(), center, self.config.general_radius)].to_vec();

        let body = lines(&segments);
        let text = if body.contains(TITLE_PREFIX) {
            body
        } else {
            format!("{} {}\n\n{}", TITLE_PREFIX, title, body)
        };

        ContextSelection {
            text,
            strategy: SelectionStrategy::Windowed,
            segments,
        }
    }
}
