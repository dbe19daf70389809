use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cooldown::DEFAULT_STATE_PATH;
use crate::llm::{LLMConfig, LLMProvider};

/// Configuration for the playlist summarizer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// YouTube credentials and playlists
    pub youtube: YouTubeConfig,

    /// Transcript service settings
    pub transcript: TranscriptConfig,

    /// Summarization model settings
    pub llm: LLMConfig,

    /// Notion database settings
    pub notion: NotionConfig,

    /// Slack webhook settings
    pub slack: SlackConfig,

    /// Failure cooldown settings
    pub cooldown: CooldownConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// OAuth 2.0 client ID
    pub client_id: Option<String>,

    /// OAuth 2.0 client secret
    pub client_secret: Option<String>,

    /// Long-lived refresh token used to mint access tokens
    pub refresh_token: Option<String>,

    /// Playlist holding videos waiting to be summarized
    pub input_playlist: Option<String>,

    /// Playlist that summarized videos are moved to
    pub output_playlist: Option<String>,

    /// Data API base URL
    pub api_base: String,

    /// OAuth token endpoint
    pub token_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Supadata API key
    pub api_key: Option<String>,

    /// Transcript endpoint
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Integration token
    pub api_key: Option<String>,

    /// Database that receives one page per video
    pub database_id: Option<String>,

    /// API base URL
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook URL; notifications are skipped when unset
    pub webhook_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Location of the persisted cooldown record
    pub state_path: PathBuf,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            input_playlist: None,
            output_playlist: None,
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.supadata.ai/v1/youtube/transcript".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            database_id: None,
            api_base: "https://api.notion.com/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }
}

/// Treat empty values the same as unset ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from a TOML file (if any) with environment overrides
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // A missing .env is normal in CI where secrets come from the environment.
        let _ = dotenvy::dotenv();

        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_locations(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults with environment overrides only
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a single TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    fn from_default_locations() -> Self {
        let config_paths = ["yt-summarizer.toml", "config/yt-summarizer.toml"];

        for path in &config_paths {
            let path = Path::new(path);
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        Self::default()
    }

    /// Override settings from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        if let Some(v) = var("YOUTUBE_CLIENT_ID") {
            self.youtube.client_id = Some(v);
        }
        if let Some(v) = var("YOUTUBE_CLIENT_SECRET") {
            self.youtube.client_secret = Some(v);
        }
        if let Some(v) = var("YOUTUBE_REFRESH_TOKEN") {
            self.youtube.refresh_token = Some(v);
        }
        if let Some(v) = var("YOUTUBE_INPUT_PLAYLIST") {
            self.youtube.input_playlist = Some(v);
        }
        if let Some(v) = var("YOUTUBE_OUTPUT_PLAYLIST") {
            self.youtube.output_playlist = Some(v);
        }

        if let Some(v) = var("SUPADATA_API_KEY") {
            self.transcript.api_key = Some(v);
        }

        if let Some(v) = var("NOTION_API_KEY") {
            self.notion.api_key = Some(v);
        }
        if let Some(v) = var("NOTION_DATABASE_ID") {
            self.notion.database_id = Some(v);
        }

        if let Some(v) = var("SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(v);
        }

        if let Some(v) = var("COOLDOWN_STATE_PATH") {
            self.cooldown.state_path = PathBuf::from(v);
        }

        if let Some(v) = var("LLM_PROVIDER") {
            match v.parse::<LLMProvider>() {
                Ok(provider) => self.llm.provider = provider,
                Err(e) => tracing::warn!("Ignoring LLM_PROVIDER: {}", e),
            }
        }
        if let Some(v) = var("LLM_MODEL") {
            self.llm.model = v;
        }

        let provider_key = match self.llm.provider {
            LLMProvider::Anthropic => "ANTHROPIC_API_KEY",
            LLMProvider::Gemini => "GEMINI_API_KEY",
            LLMProvider::OpenAI => "OPENAI_API_KEY",
        };
        if let Some(v) = var("LLM_API_KEY").or_else(|| var(provider_key)) {
            self.llm.api_key = Some(v);
        }
    }

    /// Check the settings the run cannot start without
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if non_empty(self.youtube.input_playlist.clone()).is_none() {
            missing.push("YOUTUBE_INPUT_PLAYLIST");
        }
        if non_empty(self.youtube.output_playlist.clone()).is_none() {
            missing.push("YOUTUBE_OUTPUT_PLAYLIST");
        }
        if non_empty(self.notion.database_id.clone()).is_none() {
            missing.push("NOTION_DATABASE_ID");
        }

        if !missing.is_empty() {
            return Err(anyhow!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        if let Some(webhook) = &self.slack.webhook_url {
            if url::Url::parse(webhook).is_err() {
                tracing::warn!("SLACK_WEBHOOK_URL is not a valid URL; notifications will fail");
            }
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "YouTube Summarizer Configuration:\n\
            - Input Playlist: {}\n\
            - Output Playlist: {}\n\
            - Notion Database: {}\n\
            - LLM: {:?} ({})\n\
            - Slack Notifications: {}\n\
            - Cooldown State: {}",
            self.youtube.input_playlist.as_deref().unwrap_or("<unset>"),
            self.youtube.output_playlist.as_deref().unwrap_or("<unset>"),
            self.notion.database_id.as_deref().unwrap_or("<unset>"),
            self.llm.provider,
            self.llm.model,
            if self.slack.webhook_url.is_some() { "enabled" } else { "disabled" },
            self.cooldown.state_path.display()
        )
    }
}
