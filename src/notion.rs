//! Notion database used as the record of processed videos
//!
//! Every processed video gets one page, either a summary or an error entry.
//! The "Video ID" property doubles as the deduplication key.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NotionConfig;
use crate::models::VideoRecord;

const NOTION_VERSION: &str = "2022-06-28";

/// Notion caps a single rich-text block at 2000 characters
const RICH_TEXT_LIMIT: usize = 2000;

pub type Result<T> = std::result::Result<T, NotionError>;

#[derive(thiserror::Error, Debug)]
pub enum NotionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Notion API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where processed videos are recorded
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Video IDs that already have a record
    async fn list_known_ids(&self) -> Result<HashSet<String>>;

    /// Record a summarized video, returning the record ID
    async fn create_summary_record(&self, record: &VideoRecord) -> Result<String>;

    /// Record a video that could not be summarized
    async fn create_error_record(&self, record: &VideoRecord, error: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

pub struct NotionStore {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    database_id: String,
}

impl NotionStore {
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| NotionError::Configuration("NOTION_API_KEY is not set".to_string()))?;
        let database_id = config.database_id.clone().ok_or_else(|| {
            NotionError::Configuration("NOTION_DATABASE_ID is not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            database_id,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotionError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn create_page(&self, properties: Value) -> Result<String> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        });
        let page: CreatedPage = self.post("pages", &body).await?.json().await?;
        Ok(page.id)
    }
}

#[async_trait]
impl RecordStore for NotionStore {
    async fn list_known_ids(&self) -> Result<HashSet<String>> {
        let mut video_ids = HashSet::new();
        let mut cursor: Option<String> = None;
        let path = format!("databases/{}/query", self.database_id);

        loop {
            let body = match &cursor {
                Some(cursor) => json!({ "start_cursor": cursor }),
                None => json!({}),
            };
            let page: QueryResponse = self.post(&path, &body).await?.json().await?;

            video_ids.extend(page.results.iter().filter_map(video_id_of));

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!("🗂️ Found {} already processed videos in database", video_ids.len());
        Ok(video_ids)
    }

    async fn create_summary_record(&self, record: &VideoRecord) -> Result<String> {
        let properties = page_properties(
            record,
            &truncate_text(&record.summary, RICH_TEXT_LIMIT),
            &truncate_text(&record.key_points_text(), RICH_TEXT_LIMIT),
            "Summarized",
        );
        let page_id = self.create_page(properties).await?;
        info!("📝 Created summary page for video: {} (ID: {})", record.title, page_id);
        Ok(page_id)
    }

    async fn create_error_record(&self, record: &VideoRecord, error: &str) -> Result<String> {
        let summary = truncate_text(&format!("Error: {}", error), RICH_TEXT_LIMIT);
        let properties = page_properties(record, &summary, "", "Error");
        let page_id = self.create_page(properties).await?;
        warn!(
            "Created error page for video: {} (ID: {}) - Error: {}",
            record.title, page_id, error
        );
        Ok(page_id)
    }
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

fn page_properties(record: &VideoRecord, summary: &str, key_points: &str, status: &str) -> Value {
    let title = if record.title.is_empty() { "Untitled" } else { record.title.as_str() };
    json!({
        "Title": { "title": [{ "text": { "content": title } }] },
        "Video ID": rich_text(&record.video_id),
        "URL": { "url": record.url },
        "Channel": rich_text(&record.channel),
        "Summary": rich_text(summary),
        "Key Points": rich_text(key_points),
        "Added": { "date": { "start": Utc::now().format("%Y-%m-%d").to_string() } },
        "Status": { "select": { "name": status } },
    })
}

/// First rich-text fragment of the "Video ID" property
fn video_id_of(page: &Value) -> Option<String> {
    page.pointer("/properties/Video ID/rich_text/0/text/content")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Cut to `max_chars` characters, ending with "..." when shortened.
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
