//! YouTube Playlist Summarizer
//!
//! Summarizes new videos from a YouTube playlist with an LLM, records them in
//! Notion, announces them on Slack and moves them to an output playlist.
//! Run-level failures put the job into an escalating cooldown so a broken
//! dependency is not hammered on every scheduled invocation.

pub mod config;
pub mod cooldown;
pub mod llm;
pub mod models;
pub mod notion;
pub mod pipeline;
pub mod slack;
pub mod transcript;
pub mod youtube;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::cooldown::{CooldownController, CooldownState, SkipDecision};
pub use crate::llm::summarizer::{LlmSummarizer, Summarizer};
pub use crate::llm::{LLMConfig, LLMProvider};
pub use crate::models::{PlaylistItem, SummaryOutcome, VideoRecord};
pub use crate::notion::{NotionStore, RecordStore};
pub use crate::pipeline::{Collaborators, Connector, LiveConnector, Pipeline, RunOutcome};
pub use crate::slack::{Notifier, SlackNotifier};
pub use crate::transcript::{SupadataFetcher, TranscriptError, TranscriptFetcher};
pub use crate::youtube::{VideoSource, YouTubeClient};
