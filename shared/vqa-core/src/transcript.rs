//! Timestamped transcript segments and the immutable transcript store

use crate::{clean_text, format_timestamp, parse_timestamp, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Duration assumed for a final caption whose end is unknown
const DEFAULT_LAST_SEGMENT_SECS: f64 = 5.0;

/// One timestamped line of transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Caption text
    pub text: String,
}

impl TranscriptSegment {
    /// Create new transcript segment
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Whether `time` lies within `[start, end]`
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Render as a `[M:SS] text` line
    pub fn format_line(&self) -> String {
        format!("[{}] {}", format_timestamp(self.start), self.text)
    }
}

/// Loosely-typed caption entry as delivered by upstream sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSegment {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub duration: Option<f64>,
    pub text: Option<String>,
}

/// Seconds from a JSON number, a numeric string or an `M:SS` / `HH:MM:SS` string
fn seconds_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<f64>().ok().or_else(|| parse_timestamp(s).ok())
        }
        _ => None,
    }
}

impl RawSegment {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        Self {
            start: Some(start),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_end(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Read one JSON caption entry.
    ///
    /// Times may be numbers, numeric strings or timestamps; `dur` is accepted
    /// for `duration`. Any field of the wrong type rejects the entry.
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let entry = value
            .as_object()
            .ok_or_else(|| format!("expected an object, got {}", value))?;

        let time = |key: &str| -> std::result::Result<Option<f64>, String> {
            match entry.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => seconds_from_value(v)
                    .map(Some)
                    .ok_or_else(|| format!("unreadable {}: {}", key, v)),
            }
        };

        let text = match entry.get("text") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => return Err(format!("text is not a string: {}", other)),
        };

        let duration = match time("duration")? {
            Some(duration) => Some(duration),
            None => time("dur")?,
        };

        Ok(Self {
            start: time("start")?,
            end: time("end")?,
            duration,
            text,
        })
    }
}

/// Immutable, cheaply clonable transcript for one video.
///
/// Segments are kept sorted by start time. Construction drops entries that
/// cannot be displayed (non-finite or negative start, blank text) and clamps
/// ends that precede their start, so consumers never see malformed segments.
#[derive(Debug, Clone)]
pub struct Transcript {
    segments: Arc<[TranscriptSegment]>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::empty()
    }
}

impl Transcript {
    /// Transcript with no segments (no captions available)
    pub fn empty() -> Self {
        Self {
            segments: Arc::from(Vec::new()),
        }
    }

    /// Build from already-timed segments
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        let total = segments.len();
        let mut kept: Vec<TranscriptSegment> = segments
            .into_iter()
            .filter(|s| s.start.is_finite() && s.start >= 0.0)
            .filter_map(|mut s| {
                s.text = clean_text(&s.text);
                if s.text.is_empty() {
                    return None;
                }
                if !s.end.is_finite() || s.end < s.start {
                    s.end = s.start;
                }
                Some(s)
            })
            .collect();

        if kept.len() < total {
            debug!("Skipped {} malformed transcript segments", total - kept.len());
        }

        kept.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            segments: Arc::from(kept),
        }
    }

    /// Build from raw upstream entries, resolving missing end times
    pub fn from_raw(raw: Vec<RawSegment>) -> Self {
        let total = raw.len();
        let mut entries: Vec<(f64, Option<f64>, String)> = raw
            .into_iter()
            .filter_map(|r| {
                let start = r.start.filter(|s| s.is_finite() && *s >= 0.0)?;
                let text = clean_text(r.text.as_deref().unwrap_or_default());
                if text.is_empty() {
                    return None;
                }
                let end = r
                    .end
                    .filter(|e| e.is_finite())
                    .or_else(|| r.duration.filter(|d| d.is_finite() && *d > 0.0).map(|d| start + d));
                Some((start, end, text))
            })
            .collect();

        if entries.len() < total {
            debug!("Skipped {} unusable caption entries", total - entries.len());
        }

        entries.sort_by(|a, b| a.0.total_cmp(&b.0));

        let next_starts: Vec<Option<f64>> = entries
            .iter()
            .skip(1)
            .map(|e| Some(e.0))
            .chain(std::iter::once(None))
            .collect();

        let segments = entries
            .into_iter()
            .zip(next_starts)
            .map(|((start, end, text), next_start)| {
                let end = end
                    .or(next_start)
                    .unwrap_or(start + DEFAULT_LAST_SEGMENT_SECS);
                TranscriptSegment::new(start, end, text)
            })
            .collect();

        Self::new(segments)
    }

    /// Parse a JSON array of caption entries.
    ///
    /// Only a document that is not an array is an error; unreadable entries
    /// are skipped one by one.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_str(json)?;
        let raw = entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match RawSegment::from_value(entry) {
                Ok(raw) => Some(raw),
                Err(reason) => {
                    debug!("Skipping caption entry {}: {}", i, reason);
                    None
                }
            })
            .collect();
        Ok(Self::from_raw(raw))
    }

    /// Get number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get all segments
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptSegment> {
        self.segments.iter()
    }

    /// Index of the segment playing at `time`.
    ///
    /// The first segment with `start <= time` and either `end >= time` or no
    /// later segment. Returns `None` when `time` precedes every segment.
    pub fn index_at(&self, time: f64) -> Option<usize> {
        let last = self.segments.len().checked_sub(1)?;
        self.segments
            .iter()
            .enumerate()
            .position(|(i, s)| s.start <= time && (s.end >= time || i == last))
    }

    /// End of the latest-ending segment
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.end).fold(0.0, f64::max)
    }

    /// Plain text of the whole transcript, one `[M:SS] text` line per segment
    pub fn to_lines(&self) -> String {
        self.segments
            .iter()
            .map(TranscriptSegment::format_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<TranscriptSegment>> for Transcript {
    fn from(segments: Vec<TranscriptSegment>) -> Self {
        Self::new(segments)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a TranscriptSegment;
    type IntoIter = std::slice::Iter<'a, TranscriptSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text)
    }

    #[test]
    fn test_segment_line_format() {
        assert_eq!(seg(65.7, 70.0, "hello").format_line(), "[1:05] hello");
    }

    #[test]
    fn test_new_sorts_and_drops_malformed() {
        let transcript = Transcript::new(vec![
            seg(10.0, 12.0, "second"),
            seg(f64::NAN, 1.0, "broken"),
            seg(0.0, 2.0, "first"),
            seg(4.0, 6.0, "   "),
            seg(20.0, 15.0, "backwards"),
        ]);

        let texts: Vec<&str> = transcript.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "backwards"]);
        assert_eq!(transcript.segments()[2].end, 20.0);
    }

    #[test]
    fn test_from_raw_resolves_ends() {
        let transcript = Transcript::from_raw(vec![
            RawSegment::new(0.0, "explicit").with_end(3.0),
            RawSegment::new(3.0, "with duration").with_duration(2.0),
            RawSegment::new(8.0, "next start"),
            RawSegment::new(12.0, "last"),
        ]);

        let ends: Vec<f64> = transcript.iter().map(|s| s.end).collect();
        assert_eq!(ends, vec![3.0, 5.0, 12.0, 17.0]);
    }

    #[test]
    fn test_from_json_with_dur_alias() {
        let json = r#"[{"start": 1.5, "dur": 2.0, "text": "Tom &amp; Jerry"}, {"text": "no start"}]"#;
        let transcript = Transcript::from_json(json).unwrap();

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.segments()[0].end, 3.5);
        assert_eq!(transcript.segments()[0].text, "Tom & Jerry");
    }

    #[test]
    fn test_from_json_skips_bad_entries_only() {
        let json = r#"[
            {"start": 0.0, "dur": 2.0, "text": "good one"},
            {"start": "0:05", "dur": "2.5", "text": "string times"},
            {"start": 3.0, "text": 42},
            {"start": [1], "text": "array start"},
            "not an object",
            {"start": "12.5", "end": "0:14", "text": "numeric string"}
        ]"#;

        let transcript = Transcript::from_json(json).unwrap();

        let texts: Vec<&str> = transcript.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["good one", "string times", "numeric string"]);
        assert_eq!(transcript.segments()[1].start, 5.0);
        assert_eq!(transcript.segments()[1].end, 7.5);
        assert_eq!(transcript.segments()[2].end, 14.0);
    }

    #[test]
    fn test_raw_segment_from_value() {
        let raw = RawSegment::from_value(&serde_json::json!({"start": "1:01:01", "text": null})).unwrap();
        assert_eq!(raw.start, Some(3661.0));
        assert_eq!(raw.text, None);

        assert!(RawSegment::from_value(&serde_json::json!({"start": "soon"})).is_err());
        assert!(RawSegment::from_value(&serde_json::json!({"end": true})).is_err());
    }

    #[test]
    fn test_index_at() {
        let transcript = Transcript::new(vec![
            seg(0.0, 5.0, "a"),
            seg(5.0, 10.0, "b"),
            seg(10.0, 15.0, "c"),
        ]);

        assert_eq!(transcript.index_at(0.0), Some(0));
        assert_eq!(transcript.index_at(5.0), Some(0));
        assert_eq!(transcript.index_at(7.5), Some(1));
        assert_eq!(transcript.index_at(99.0), Some(2));
        assert_eq!(transcript.index_at(-1.0), None);
        assert_eq!(Transcript::empty().index_at(3.0), None);
    }

    #[test]
    fn test_clones_share_storage() {
        let transcript = Transcript::new(vec![seg(0.0, 1.0, "a")]);
        let clone = transcript.clone();
        assert!(std::ptr::eq(transcript.segments(), clone.segments()));
    }
}
