//! Data passed between the pipeline stages

/// One entry of the input playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    /// Playlist item ID, required to remove the entry from its playlist
    pub playlist_item_id: String,
}

/// What gets written to the record store and posted to chat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub channel: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub target_audience: String,
}

impl VideoRecord {
    /// Record for a playlist item before it has been summarized
    pub fn from_item(item: &PlaylistItem) -> Self {
        Self {
            video_id: item.video_id.clone(),
            title: item.title.clone(),
            url: watch_url(&item.video_id),
            channel: item.channel_name.clone(),
            ..Self::default()
        }
    }

    /// Key points as one bullet per line
    pub fn key_points_text(&self) -> String {
        self.key_points
            .iter()
            .map(|point| format!("• {}", point))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Summarizer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summary {
        summary: String,
        key_points: Vec<String>,
        target_audience: String,
    },
    Error(String),
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
