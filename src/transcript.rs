//! Transcript fetching through the Supadata API.
//!
//! Only native captions are requested (`mode=native`, including YouTube's
//! auto-generated ones); AI transcription is never triggered. A missing API
//! key is a construction error; every problem after that is logged and
//! reported as "no transcript".

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::TranscriptConfig;
use crate::models::watch_url;

#[derive(thiserror::Error, Debug)]
pub enum TranscriptError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Plain-text transcript, or `None` when none is available
    async fn fetch(&self, video_id: &str) -> Option<String>;
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptResponse {
    content: Option<serde_json::Value>,
    segments: Option<Vec<serde_json::Value>>,
    transcript: Option<Vec<serde_json::Value>>,
}

pub struct SupadataFetcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl SupadataFetcher {
    pub fn new(config: &TranscriptConfig) -> Result<Self, TranscriptError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TranscriptError::Configuration("SUPADATA_API_KEY is not set".to_string())
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl TranscriptFetcher for SupadataFetcher {
    async fn fetch(&self, video_id: &str) -> Option<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", watch_url(video_id).as_str()), ("mode", "native")])
            .header("x-api-key", &self.api_key)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("Timeout fetching transcript for video {}", video_id);
                return None;
            }
            Err(e) => {
                error!("Request error fetching transcript for {}: {}", video_id, e);
                return None;
            }
        };

        match response.status().as_u16() {
            200 => {}
            404 => {
                info!("No transcript available for video {}", video_id);
                return None;
            }
            400 => {
                let text = response.text().await.unwrap_or_default();
                warn!("Bad request for video {}: {}", video_id, text);
                return None;
            }
            401 => {
                error!("Invalid Supadata API key");
                return None;
            }
            429 => {
                error!("Supadata API rate limit exceeded");
                return None;
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                error!("Supadata API error {}: {}", status, text);
                return None;
            }
        }

        let body: TranscriptResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!("Unreadable transcript response for {}: {}", video_id, e);
                return None;
            }
        };

        let text = extract_text(body);
        match &text {
            Some(_) => info!("Successfully fetched transcript for video {}", video_id),
            None => warn!("No transcript content in response for video {}", video_id),
        }
        text
    }
}

/// Prefer the flat `content` string; fall back to joining segment texts.
fn extract_text(body: TranscriptResponse) -> Option<String> {
    if let Some(serde_json::Value::String(content)) = &body.content {
        if !content.is_empty() {
            return Some(content.clone());
        }
    }

    // Some responses carry segments under `content` itself.
    let content_segments = match body.content {
        Some(serde_json::Value::Array(segments)) => Some(segments),
        _ => None,
    };

    let segments = body
        .segments
        .filter(|s| !s.is_empty())
        .or(body.transcript.filter(|s| !s.is_empty()))
        .or(content_segments)?;

    let parts: Vec<String> = segments
        .iter()
        .filter_map(|segment| match segment {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Object(map) => Some(
                map.get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
            ),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> SupadataFetcher {
        SupadataFetcher::new(&TranscriptConfig {
            api_key: Some("key".to_string()),
            endpoint: format!("{}/v1/youtube/transcript", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_extract_prefers_content() {
        let body: TranscriptResponse =
            serde_json::from_value(serde_json::json!({"content": "hello there"})).unwrap();
        assert_eq!(extract_text(body).as_deref(), Some("hello there"));
    }

    #[test]
    fn test_extract_joins_segments() {
        let body: TranscriptResponse = serde_json::from_value(serde_json::json!({
            "segments": [{"text": "one", "offset": 0}, "two", {"text": "three"}]
        }))
        .unwrap();
        assert_eq!(extract_text(body).as_deref(), Some("one two three"));
    }

    #[test]
    fn test_extract_empty_is_none() {
        let body: TranscriptResponse =
            serde_json::from_value(serde_json::json!({"content": "", "segments": []})).unwrap();
        assert!(extract_text(body).is_none());
    }

    #[tokio::test]
    async fn fetch_requests_native_mode() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("mode", "native"))
            .and(query_param("url", "https://www.youtube.com/watch?v=abc"))
            .and(header("x-api-key", "key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": "words"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let text = fetcher(&server).fetch("abc").await;
        assert_eq!(text.as_deref(), Some("words"));
    }

    #[tokio::test]
    async fn fetch_not_found_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(fetcher(&server).fetch("abc").await.is_none());
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = SupadataFetcher::new(&TranscriptConfig::default());
        assert!(matches!(result, Err(TranscriptError::Configuration(_))));
    }
}
