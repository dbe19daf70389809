//! Slack notifications over an incoming webhook (Block Kit payloads)

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::SlackConfig;
use crate::cooldown::BACKOFF_SCHEDULE_MINUTES;
use crate::models::VideoRecord;

/// Chat channel notifications. Best effort: `false` means not delivered.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_summary(&self, record: &VideoRecord) -> bool;

    async fn notify_processing_error(&self, title: &str, url: &str, error: &str) -> bool;

    /// Run-level failure with the attempt number and the wait before the next retry
    async fn notify_run_failure(&self, error: &str, attempt: u32, next_retry_minutes: u32) -> bool;

    async fn notify_recovery(&self, previous_failures: u32) -> bool;
}

/// Human-readable retry delay used in failure notifications
pub fn format_retry_delay(minutes: u32) -> String {
    let cap = BACKOFF_SCHEDULE_MINUTES[BACKOFF_SCHEDULE_MINUTES.len() - 1];
    if minutes >= cap {
        return "24 hours".to_string();
    }
    if minutes < 60 {
        return format!("{} minutes", minutes);
    }
    match (minutes / 60, minutes % 60) {
        (hours, 0) => format!("{}h", hours),
        (hours, rest) => format!("{}h {}m", hours, rest),
    }
}

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
        })
    }

    async fn post(&self, payload: Value, what: &str) -> bool {
        let Some(webhook_url) = self.webhook_url.as_deref() else {
            warn!("SLACK_WEBHOOK_URL not set, skipping {} notification", what);
            return false;
        };

        match self.client.post(webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("💬 Sent Slack {} notification", what);
                true
            }
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                error!("Slack webhook error {}: {}", status, text);
                false
            }
            Err(e) if e.is_timeout() => {
                error!("Timeout sending Slack notification");
                false
            }
            Err(e) => {
                error!("Error sending Slack notification: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_summary(&self, record: &VideoRecord) -> bool {
        self.post(summary_payload(record), "summary").await
    }

    async fn notify_processing_error(&self, title: &str, url: &str, error: &str) -> bool {
        self.post(processing_error_payload(title, url, error), "processing error")
            .await
    }

    async fn notify_run_failure(&self, error: &str, attempt: u32, next_retry_minutes: u32) -> bool {
        self.post(run_failure_payload(error, attempt, next_retry_minutes), "run failure")
            .await
    }

    async fn notify_recovery(&self, previous_failures: u32) -> bool {
        self.post(recovery_payload(previous_failures), "recovery").await
    }
}

fn summary_payload(record: &VideoRecord) -> Value {
    let title = if record.title.is_empty() { "Untitled" } else { record.title.as_str() };
    let summary = if record.summary.is_empty() {
        "No summary available"
    } else {
        record.summary.as_str()
    };

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": format!("📺 {}", title), "emoji": true }
        }),
        json!({
            "type": "context",
            "elements": [{ "type": "mrkdwn", "text": format!("*Channel:* {}", record.channel) }]
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Summary*\n{}", summary) }
        }),
    ];

    let key_points = record.key_points_text();
    if !key_points.is_empty() {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Key Points*\n{}", key_points) }
        }));
    }

    if !record.target_audience.is_empty() {
        blocks.push(json!({
            "type": "context",
            "elements": [{ "type": "mrkdwn", "text": format!("*For:* {}", record.target_audience) }]
        }));
    }

    blocks.push(json!({
        "type": "actions",
        "elements": [{
            "type": "button",
            "text": { "type": "plain_text", "text": "Watch Video", "emoji": true },
            "url": record.url,
            "style": "primary"
        }]
    }));

    json!({
        "blocks": blocks,
        "text": format!("New video summary: {}", title),
    })
}

fn processing_error_payload(title: &str, url: &str, error: &str) -> Value {
    json!({
        "blocks": [
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!("⚠️ *Could not summarize:* <{}|{}>\n{}", url, title, error)
                }
            }
        ],
        "text": format!("Could not summarize: {}", title),
    })
}

fn run_failure_payload(error: &str, attempt: u32, next_retry_minutes: u32) -> Value {
    let delay = format_retry_delay(next_retry_minutes);
    json!({
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": "🚨 Video summarizer run failed", "emoji": true }
            },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("```{}```", error) }
            },
            {
                "type": "context",
                "elements": [{
                    "type": "mrkdwn",
                    "text": format!("Attempt #{} · next retry in {}", attempt, delay)
                }]
            }
        ],
        "text": format!("Video summarizer failed (attempt #{}), retrying in {}", attempt, delay),
    })
}

fn recovery_payload(previous_failures: u32) -> Value {
    let text = format!(
        "✅ Video summarizer recovered after {} consecutive failed run{}",
        previous_failures,
        if previous_failures == 1 { "" } else { "s" }
    );
    json!({
        "blocks": [{ "type": "section", "text": { "type": "mrkdwn", "text": text } }],
        "text": text,
    })
}
