//! YouTube Data API client for playlist management
//!
//! Authenticates with a long-lived OAuth refresh token, lists playlist items
//! page by page and moves items between playlists.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::YouTubeConfig;
use crate::models::PlaylistItem;

/// Maximum page size allowed by the API
const PAGE_SIZE: &str = "50";

pub type Result<T> = std::result::Result<T, YouTubeError>;

#[derive(thiserror::Error, Debug)]
pub enum YouTubeError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("YouTube API quota exceeded while {0}")]
    QuotaExceeded(String),

    #[error("Resource not found while {0}")]
    NotFound(String),

    #[error("API error {status} while {context}: {message}")]
    Api {
        context: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source of videos waiting to be summarized
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// All items of a playlist, in playlist order
    async fn list_pending_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>>;

    /// Move a video between playlists, returning the new playlist item ID.
    /// Without `playlist_item_id` the source playlist is searched for it.
    async fn move_item(
        &self,
        video_id: &str,
        from_playlist: &str,
        to_playlist: &str,
        playlist_item_id: Option<&str>,
    ) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsPage {
    #[serde(default)]
    items: Vec<PlaylistItemResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    #[serde(default)]
    id: String,
    #[serde(default)]
    snippet: ItemSnippet,
    #[serde(default)]
    content_details: ItemContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    video_owner_channel_title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemContentDetails {
    #[serde(default)]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct InsertedItem {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Authenticated YouTube client
pub struct YouTubeClient {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl YouTubeClient {
    /// Exchange the configured refresh token for an access token
    pub async fn connect(config: &YouTubeConfig) -> Result<Self> {
        let mut missing = Vec::new();
        if config.client_id.is_none() {
            missing.push("YOUTUBE_CLIENT_ID");
        }
        if config.client_secret.is_none() {
            missing.push("YOUTUBE_CLIENT_SECRET");
        }
        if config.refresh_token.is_none() {
            missing.push("YOUTUBE_REFRESH_TOKEN");
        }
        if !missing.is_empty() {
            return Err(YouTubeError::Authentication(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let form = [
            ("client_id", config.client_id.as_deref().unwrap_or_default()),
            ("client_secret", config.client_secret.as_deref().unwrap_or_default()),
            ("refresh_token", config.refresh_token.as_deref().unwrap_or_default()),
            ("grant_type", "refresh_token"),
        ];

        let response = client
            .post(&config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| YouTubeError::Authentication(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(YouTubeError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| YouTubeError::Authentication(e.to_string()))?;

        info!("🔑 Authenticated with YouTube API");
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: token.access_token,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.api_base, resource)
    }

    /// Append a video to a playlist, returning the new playlist item ID
    pub async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> Result<String> {
        let context = format!("adding video {} to playlist {}", video_id, playlist_id);
        debug!("{}", context);

        let body = serde_json::json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                },
            },
        });

        let response = self
            .client
            .post(self.url("playlistItems"))
            .bearer_auth(&self.access_token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await?;

        let inserted: InsertedItem = check(response, &context).await?.json().await?;
        Ok(inserted.id)
    }

    /// Remove a playlist entry by its playlist item ID (not the video ID)
    pub async fn remove_from_playlist(&self, playlist_item_id: &str) -> Result<()> {
        let context = format!("removing playlist item {}", playlist_item_id);
        debug!("{}", context);

        let response = self
            .client
            .delete(self.url("playlistItems"))
            .bearer_auth(&self.access_token)
            .query(&[("id", playlist_item_id)])
            .send()
            .await?;

        check(response, &context).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn list_pending_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>> {
        let context = format!("fetching playlist {}", playlist_id);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.url("playlistItems"))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", PAGE_SIZE),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: PlaylistItemsPage = check(request.send().await?, &context).await?.json().await?;

            items.extend(page.items.into_iter().map(|item| PlaylistItem {
                video_id: item.content_details.video_id,
                title: item.snippet.title,
                channel_name: item.snippet.video_owner_channel_title,
                playlist_item_id: item.id,
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!("📋 Retrieved {} videos from playlist {}", items.len(), playlist_id);
        Ok(items)
    }

    async fn move_item(
        &self,
        video_id: &str,
        from_playlist: &str,
        to_playlist: &str,
        playlist_item_id: Option<&str>,
    ) -> Result<String> {
        debug!("Moving video {} from {} to {}", video_id, from_playlist, to_playlist);

        let item_id = match playlist_item_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self
                .list_pending_items(from_playlist)
                .await?
                .into_iter()
                .find(|item| item.video_id == video_id)
                .map(|item| item.playlist_item_id)
                .ok_or_else(|| {
                    YouTubeError::NotFound(format!(
                        "looking up video {} in playlist {}",
                        video_id, from_playlist
                    ))
                })?,
        };

        // Add first: a failure here leaves the video where it was.
        let new_item_id = self.add_to_playlist(to_playlist, video_id).await?;

        if let Err(e) = self.remove_from_playlist(&item_id).await {
            warn!(
                "Failed to remove video from source playlist after adding to target. \
                 Video {} may now exist in both playlists. Error: {}",
                video_id, e
            );
            return Err(e);
        }

        Ok(new_item_id)
    }
}

/// Map an unsuccessful response onto the error taxonomy
async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let envelope: ErrorEnvelope = serde_json::from_str(&text).unwrap_or_default();
    let reason = envelope
        .error
        .errors
        .first()
        .map(|e| e.reason.as_str())
        .unwrap_or_default();

    if status == reqwest::StatusCode::FORBIDDEN
        && matches!(reason, "quotaExceeded" | "dailyLimitExceeded")
    {
        return Err(YouTubeError::QuotaExceeded(context.to_string()));
    }

    if status == reqwest::StatusCode::NOT_FOUND || reason == "videoNotFound" {
        return Err(YouTubeError::NotFound(context.to_string()));
    }

    let message = if envelope.error.message.is_empty() {
        text
    } else {
        envelope.error.message
    };
    Err(YouTubeError::Api {
        context: context.to_string(),
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connected(server: &MockServer) -> YouTubeClient {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "ya29.test"})),
            )
            .mount(server)
            .await;

        let config = YouTubeConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            refresh_token: Some("refresh".to_string()),
            api_base: server.uri(),
            token_url: format!("{}/token", server.uri()),
            ..YouTubeConfig::default()
        };
        YouTubeClient::connect(&config).await.unwrap()
    }

    fn item(id: &str, video_id: &str, title: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "snippet": {"title": title, "videoOwnerChannelTitle": "Channel"},
            "contentDetails": {"videoId": video_id}
        })
    }

    #[tokio::test]
    async fn connect_reports_missing_credentials() {
        let err = YouTubeClient::connect(&YouTubeConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "Authentication failed: Missing required environment variables: YOUTUBE_CLIENT_ID, YOUTUBE_CLIENT_SECRET, YOUTUBE_REFRESH_TOKEN"
        );
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        let client = connected(&server).await;

        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [item("i2", "v2", "Second")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "PLin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [item("i1", "v1", "First")],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let items = client.list_pending_items("PLin").await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.video_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
        assert_eq!(items[0].playlist_item_id, "i1");
        assert_eq!(items[0].channel_name, "Channel");
    }

    #[tokio::test]
    async fn quota_error_is_classified() {
        let server = MockServer::start().await;
        let client = connected(&server).await;

        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"message": "quota", "errors": [{"reason": "quotaExceeded"}]}
            })))
            .mount(&server)
            .await;

        let err = client.list_pending_items("PLin").await.unwrap_err();
        assert!(matches!(err, YouTubeError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn move_adds_then_removes() {
        let server = MockServer::start().await;
        let client = connected(&server).await;

        Mock::given(method("POST"))
            .and(path("/playlistItems"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "new-item"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/playlistItems"))
            .and(query_param("id", "old-item"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let new_id = client
            .move_item("v1", "PLin", "PLout", Some("old-item"))
            .await
            .unwrap();
        assert_eq!(new_id, "new-item");
    }

    #[tokio::test]
    async fn move_without_item_id_requires_video_in_source() {
        let server = MockServer::start().await;
        let client = connected(&server).await;

        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [item("i1", "other", "Other")]
            })))
            .mount(&server)
            .await;

        let err = client.move_item("v1", "PLin", "PLout", None).await.unwrap_err();
        assert!(matches!(err, YouTubeError::NotFound(_)));
    }
}
