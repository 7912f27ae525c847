use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};
use vqa_core::Transcript;

use super::srt::SRTParser;

/// Supplies the transcript for a video. Errors and empty transcripts are
/// treated the same by callers.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Transcript>;

    /// Get source name
    fn name(&self) -> &str;
}

/// Reads `{video_id}.json` raw caption entries or `{video_id}.srt` files from a directory
#[derive(Debug, Clone)]
pub struct FileTranscriptSource {
    dir: PathBuf,
}

impl FileTranscriptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_safe_id(video_id: &str) -> bool {
        !video_id.is_empty()
            && video_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

#[async_trait]
impl TranscriptSource for FileTranscriptSource {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Transcript> {
        if !Self::is_safe_id(video_id) {
            anyhow::bail!("Invalid video id: {:?}", video_id);
        }

        let json_path = self.dir.join(format!("{}.json", video_id));
        if tokio::fs::try_exists(&json_path).await.unwrap_or(false) {
            let content = tokio::fs::read_to_string(&json_path)
                .await
                .with_context(|| format!("Failed to read {}", json_path.display()))?;
            let transcript = Transcript::from_json(&content)
                .with_context(|| format!("Failed to parse {}", json_path.display()))?;
            info!("📄 Loaded {} segments from {}", transcript.len(), json_path.display());
            return Ok(transcript);
        }

        let srt_path = self.dir.join(format!("{}.srt", video_id));
        let content = tokio::fs::read_to_string(&srt_path)
            .await
            .with_context(|| format!("No transcript found for {} in {}", video_id, self.dir.display()))?;
        let transcript = SRTParser::parse_transcript(&content);
        info!("📄 Loaded {} segments from {}", transcript.len(), srt_path.display());
        Ok(transcript)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory transcripts keyed by video id
#[derive(Debug, Default)]
pub struct StaticTranscriptSource {
    transcripts: RwLock<HashMap<String, Transcript>>,
}

impl StaticTranscriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(self, video_id: impl Into<String>, transcript: Transcript) -> Self {
        self.insert(video_id, transcript);
        self
    }

    pub fn insert(&self, video_id: impl Into<String>, transcript: Transcript) {
        self.transcripts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(video_id.into(), transcript);
    }
}

#[async_trait]
impl TranscriptSource for StaticTranscriptSource {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Transcript> {
        let transcript = self
            .transcripts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(video_id)
            .cloned();
        debug!("Static transcript lookup for {}: {}", video_id, transcript.is_some());
        transcript.with_context(|| format!("No transcript registered for {}", video_id))
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};
    use vqa_core::TranscriptSegment;

    #[tokio::test]
    async fn test_file_source_reads_json() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("abc123.json"),
            r#"[{"start": 0, "dur": 2.5, "text": "Hello"}, {"start": 2.5, "text": "there"}]"#,
        )
        .unwrap();

        let source = FileTranscriptSource::new(dir.path());
        let transcript = assert_ok!(source.fetch_transcript("abc123").await);

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.segments()[1].end, 7.5);
    }

    #[tokio::test]
    async fn test_file_source_falls_back_to_srt() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("vid_1.srt"),
            "1\n00:00:00,000 --> 00:00:02,000\nFrom subtitles\n",
        )
        .unwrap();

        let source = FileTranscriptSource::new(dir.path());
        let transcript = source.fetch_transcript("vid_1").await.unwrap();

        assert_eq!(transcript.segments()[0].text, "From subtitles");
    }

    #[tokio::test]
    async fn test_file_source_errors() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let source = FileTranscriptSource::new(dir.path());

        assert_err!(source.fetch_transcript("missing").await);
        assert_err!(source.fetch_transcript("broken").await);
        assert_err!(source.fetch_transcript("../etc/passwd").await);
    }

    #[tokio::test]
    async fn test_static_source() {
        let transcript = Transcript::new(vec![TranscriptSegment::new(0.0, 1.0, "hi")]);
        let source = StaticTranscriptSource::new().with_transcript("v1", transcript);

        assert_eq!(source.fetch_transcript("v1").await.unwrap().len(), 1);
        assert!(source.fetch_transcript("v2").await.is_err());
    }
}
