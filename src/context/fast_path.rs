//! Local answers that never reach the model

use super::{ContextSelection, Intent, SelectionStrategy};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Seconds either side of the playback time kept by [`excerpt_around`]
pub const EXCERPT_RADIUS_SECS: f64 = 30.0;

/// Lines kept from the middle when nothing is near the playback time
pub const EXCERPT_FALLBACK_LINES: usize = 10;

fn line_timestamp_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\[(\d+):(\d{2})\]").ok())
        .as_ref()
}

/// Seconds encoded in a leading `[M:SS]` marker
fn line_time(line: &str) -> Option<f64> {
    let captures = line_timestamp_pattern()?.captures(line)?;
    let minutes: f64 = captures.get(1)?.as_str().parse().ok()?;
    let seconds: f64 = captures.get(2)?.as_str().parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

/// Quote what was just said, if the selection came from the recent window
/// and carries more than `min_chars` of text.
pub fn just_said_answer(
    intent: Intent,
    selection: &ContextSelection,
    min_chars: usize,
) -> Option<String> {
    if intent != Intent::JustSaid || selection.strategy != SelectionStrategy::RecentWindow {
        return None;
    }

    let spoken = selection
        .segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if spoken.chars().count() <= min_chars {
        debug!("Recent window too short for a local answer ({} chars)", spoken.len());
        return None;
    }

    Some(format!("This is what was just said:\n\n\"{}\"", spoken))
}

/// Excerpt of `context` near `current_time` for display without the model.
///
/// Keeps untimed lines and timed lines within [`EXCERPT_RADIUS_SECS`]. When no
/// timed line is close enough, returns up to [`EXCERPT_FALLBACK_LINES`] lines
/// from the middle instead.
pub fn excerpt_around(context: &str, current_time: f64) -> String {
    let lines: Vec<&str> = context.lines().collect();
    let low = current_time - EXCERPT_RADIUS_SECS;
    let high = current_time + EXCERPT_RADIUS_SECS;

    let mut matched_timed = false;
    let near: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| match line_time(line) {
            Some(time) if time >= low && time <= high => {
                matched_timed = true;
                true
            }
            Some(_) => false,
            None => true,
        })
        .collect();

    if matched_timed {
        return near.join("\n").trim().to_string();
    }

    let middle = lines.len() / 2;
    let start = middle.saturating_sub(EXCERPT_FALLBACK_LINES / 2);
    let end = (start + EXCERPT_FALLBACK_LINES).min(lines.len());
    lines[start..end].join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vqa_core::TranscriptSegment;

    fn recent(texts: &[&str]) -> ContextSelection {
        let segments: Vec<TranscriptSegment> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TranscriptSegment::new(i as f64, i as f64 + 1.0, *t))
            .collect();
        ContextSelection {
            text: String::new(),
            strategy: SelectionStrategy::RecentWindow,
            segments,
        }
    }

    #[test]
    fn test_just_said_answer_quotes_segments() {
        let selection = recent(&["Hello world today", "goodbye"]);
        let answer = just_said_answer(Intent::JustSaid, &selection, 5).unwrap();
        assert_eq!(answer, "This is what was just said:\n\n\"Hello world today goodbye\"");
    }

    #[test]
    fn test_just_said_answer_requires_recent_window() {
        let mut selection = recent(&["Hello world today"]);
        assert!(just_said_answer(Intent::General, &selection, 5).is_none());

        selection.strategy = SelectionStrategy::Windowed;
        assert!(just_said_answer(Intent::JustSaid, &selection, 5).is_none());
    }

    #[test]
    fn test_just_said_answer_threshold() {
        assert!(just_said_answer(Intent::JustSaid, &recent(&["ok"]), 5).is_none());
        assert!(just_said_answer(Intent::JustSaid, &recent(&["hello"]), 5).is_none());
        assert!(just_said_answer(Intent::JustSaid, &recent(&["hello!"]), 5).is_some());
    }

    #[test]
    fn test_line_time() {
        assert_eq!(line_time("[1:05] hi"), Some(65.0));
        assert_eq!(line_time("[12:00] hi"), Some(720.0));
        assert_eq!(line_time("VIDEO TITLE: x"), None);
    }

    #[test]
    fn test_excerpt_keeps_nearby_and_untimed_lines() {
        let context = "VIDEO TITLE: Demo\n\n[0:00] intro\n[1:00] middle\n[1:20] close\n[3:00] far";
        let excerpt = excerpt_around(context, 75.0);
        assert_eq!(excerpt, "VIDEO TITLE: Demo\n\n[1:00] middle\n[1:20] close");
    }

    #[test]
    fn test_excerpt_falls_back_to_middle() {
        let context: String = (0..30)
            .map(|i| format!("[{}:00] line {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");

        let excerpt = excerpt_around(&context, 5_000.0);
        let kept: Vec<&str> = excerpt.lines().collect();
        assert_eq!(kept.len(), EXCERPT_FALLBACK_LINES);
        assert_eq!(kept[0], "[10:00] line 10");
        assert_eq!(kept[9], "[19:00] line 19");
    }
}
