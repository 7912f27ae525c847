use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vqa_llm::LLMConfig;

use crate::context::SelectorConfig;

/// Configuration for the video question assistant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Session and playback settings
    pub assistant: AssistantConfig,

    /// Context window sizes
    pub selection: SelectorConfig,

    /// Completion API settings
    pub llm: LLMConfig,

    /// Logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Playback sampling cadence in milliseconds
    pub poll_interval_ms: u64,

    /// Minimum characters for answering "just said" questions locally
    pub fast_path_min_chars: usize,

    /// Directory holding `{video_id}.json` / `{video_id}.srt` transcripts
    pub transcript_dir: PathBuf,
}

impl AssistantConfig {
    pub const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=250;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            fast_path_min_chars: 5,
            transcript_dir: PathBuf::from("transcripts"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Log filter directive, e.g. `info` or `video_qa_rust=debug`
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first readable config file, then the environment
    pub fn load() -> Result<Self> {
        let config_paths = ["video-qa.toml", "config/video-qa.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|name| std::env::var(name).ok()))
    }

    /// Defaults overridden by whatever `lookup` returns for the `VIDEO_QA_*` variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(model) = lookup("VIDEO_QA_MODEL") {
            config.llm = config.llm.with_model(model);
        }

        if let Some(endpoint) = lookup("VIDEO_QA_ENDPOINT") {
            config.llm = config.llm.with_endpoint(endpoint);
        }

        if let Some(log_level) = lookup("VIDEO_QA_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        if let Some(dir) = lookup("VIDEO_QA_TRANSCRIPT_DIR") {
            config.assistant.transcript_dir = PathBuf::from(dir);
        }

        config
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !AssistantConfig::POLL_INTERVAL_RANGE_MS.contains(&self.assistant.poll_interval_ms) {
            return Err(anyhow!(
                "poll_interval_ms must be within 100..=250, got {}",
                self.assistant.poll_interval_ms
            ));
        }

        if let Some(problem) = self.selection.validate().into_iter().next() {
            return Err(anyhow!("Invalid selection settings: {}", problem));
        }

        if self.llm.model().trim().is_empty() {
            return Err(anyhow!("llm.model must not be empty"));
        }

        if !self.llm.endpoint().starts_with("http://") && !self.llm.endpoint().starts_with("https://") {
            return Err(anyhow!("llm.endpoint must be an http(s) URL: {}", self.llm.endpoint()));
        }

        if self.llm.retry().deadline_seconds == 0 {
            return Err(anyhow!("llm.retry.deadline_seconds must be greater than 0"));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video QA Configuration:\n\
            - Model: {} (fallback: {})\n\
            - Endpoint: {}\n\
            - Max Retries: {}\n\
            - Poll Interval: {}ms\n\
            - Recent Window: {}s\n\
            - Transcript Directory: {}",
            self.llm.model(),
            self.llm.fallback_model().unwrap_or("none"),
            self.llm.endpoint(),
            self.llm.retry().max_retries,
            self.assistant.poll_interval_ms,
            self.selection.recent_window_secs,
            self.assistant.transcript_dir.display()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.config.assistant.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn with_fast_path_min_chars(mut self, min_chars: usize) -> Self {
        self.config.assistant.fast_path_min_chars = min_chars;
        self
    }

    pub fn with_transcript_dir(mut self, dir: PathBuf) -> Self {
        self.config.assistant.transcript_dir = dir;
        self
    }

    pub fn with_selection(mut self, selection: SelectorConfig) -> Self {
        self.config.selection = selection;
        self
    }

    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.config.llm = llm;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.output.log_level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
