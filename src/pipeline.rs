use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::cooldown::{CooldownController, CooldownState};
use crate::llm::summarizer::{LlmSummarizer, Summarizer};
use crate::models::{PlaylistItem, SummaryOutcome, VideoRecord};
use crate::notion::{NotionStore, RecordStore};
use crate::slack::Notifier;
use crate::transcript::{SupadataFetcher, TranscriptFetcher};
use crate::youtube::{VideoSource, YouTubeClient};

const NO_TRANSCRIPT: &str = "No transcript available (captions disabled or not found)";

/// The services a run talks to once the cooldown check has passed
pub struct Collaborators {
    pub source: Box<dyn VideoSource>,
    pub transcripts: Box<dyn TranscriptFetcher>,
    pub summarizer: Box<dyn Summarizer>,
    pub store: Box<dyn RecordStore>,
}

/// Builds the collaborators from validated configuration
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &Config) -> Result<Collaborators>;
}

/// Connects to the real YouTube, Supadata, LLM and Notion services
pub struct LiveConnector;

#[async_trait]
impl Connector for LiveConnector {
    async fn connect(&self, config: &Config) -> Result<Collaborators> {
        // Local configuration problems surface before any network call.
        let transcripts = SupadataFetcher::new(&config.transcript)
            .map_err(|e| anyhow!("Failed to initialize transcript client: {}", e))?;

        let summarizer = LlmSummarizer::new(&config.llm)
            .map_err(|e| anyhow!("Failed to initialize summarizer: {}", e))?;

        info!("🔧 Initializing Notion client...");
        let store = NotionStore::new(&config.notion)
            .map_err(|e| anyhow!("Failed to initialize Notion client: {}", e))?;

        info!("🔧 Initializing YouTube service...");
        let source = YouTubeClient::connect(&config.youtube)
            .await
            .map_err(|e| anyhow!("Failed to initialize YouTube service: {}", e))?;

        Ok(Collaborators {
            source: Box::new(source),
            transcripts: Box::new(transcripts),
            summarizer: Box::new(summarizer),
            store: Box::new(store),
        })
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Inside an active cooldown; nothing else was touched
    Skipped { state: CooldownState },

    /// No new videos. `recovered_from` is the failure streak this run ended.
    NothingToDo { recovered_from: Option<u32> },

    /// At least one video went through
    Completed {
        processed: usize,
        errors: usize,
        recovered_from: Option<u32>,
    },

    /// Run-level failure, already recorded in the cooldown state
    Failed { error: String, state: CooldownState },
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Skipped { .. } | RunOutcome::NothingToDo { .. } => 0,
            RunOutcome::Completed { errors, .. } => u8::from(*errors > 0),
            RunOutcome::Failed { .. } => 1,
        }
    }
}

/// Per-run counts
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    processed: usize,
    errors: usize,
}

/// One scheduled run: cooldown check, process the playlist, record the outcome
pub struct Pipeline<'a> {
    cooldown: &'a CooldownController,
    notifier: &'a dyn Notifier,
}

impl<'a> Pipeline<'a> {
    pub fn new(cooldown: &'a CooldownController, notifier: &'a dyn Notifier) -> Self {
        Self { cooldown, notifier }
    }

    pub async fn run(&self, config: &Config, connector: &dyn Connector) -> RunOutcome {
        let decision = self.cooldown.should_skip_run();
        if decision.skip {
            info!("⏸️ Skipping run due to active cooldown. Exiting cleanly.");
            return RunOutcome::Skipped {
                state: decision.state.unwrap_or_default(),
            };
        }

        let tally = match self.execute(config, connector).await {
            Ok(tally) => tally,
            Err(e) => {
                error!("{}", e);
                return self.fail(e.to_string()).await;
            }
        };

        if tally.errors > 0 && tally.processed == 0 {
            return self
                .fail(format!("All {} video(s) failed to process", tally.errors))
                .await;
        }

        let recovered_from = self.succeed().await;
        if tally.processed == 0 {
            RunOutcome::NothingToDo { recovered_from }
        } else {
            RunOutcome::Completed {
                processed: tally.processed,
                errors: tally.errors,
                recovered_from,
            }
        }
    }

    async fn execute(&self, config: &Config, connector: &dyn Connector) -> Result<Tally> {
        config.validate()?;
        let input_playlist = config.youtube.input_playlist.as_deref().unwrap_or_default();
        let output_playlist = config.youtube.output_playlist.as_deref().unwrap_or_default();

        info!("{}", "=".repeat(60));
        info!("🚀 YouTube Video Summarizer");
        info!("{}", "=".repeat(60));

        let services = connector.connect(config).await?;

        info!("🔍 Fetching videos from input playlist...");
        let playlist = services
            .source
            .list_pending_items(input_playlist)
            .await
            .map_err(|e| anyhow!("Failed to fetch playlist videos: {}", e))?;
        info!("📹 Found {} videos in input playlist", playlist.len());

        if playlist.is_empty() {
            info!("No videos in input playlist. Nothing to do.");
            return Ok(Tally::default());
        }

        info!("🔍 Checking for already-processed videos...");
        let known_ids: HashSet<String> = services
            .store
            .list_known_ids()
            .await
            .map_err(|e| anyhow!("Failed to fetch processed video IDs: {}", e))?;

        let new_videos: Vec<PlaylistItem> = playlist
            .into_iter()
            .filter(|item| !known_ids.contains(&item.video_id))
            .collect();
        info!("🆕 Found {} new videos to process", new_videos.len());

        if new_videos.is_empty() {
            info!("All videos already processed. Nothing to do.");
            return Ok(Tally::default());
        }

        let mut tally = Tally::default();
        for (index, item) in new_videos.iter().enumerate() {
            info!(
                "📹 Processing video {}/{}: {} ({})",
                index + 1,
                new_videos.len(),
                item.title,
                item.video_id
            );

            if !self.process_video(&services, item).await {
                tally.errors += 1;
                continue;
            }

            info!("  Moving to output playlist...");
            match services
                .source
                .move_item(
                    &item.video_id,
                    input_playlist,
                    output_playlist,
                    Some(item.playlist_item_id.as_str()),
                )
                .await
            {
                Ok(_) => {
                    info!("  Moved successfully");
                    tally.processed += 1;
                }
                Err(e) => {
                    error!("  Failed to move video: {}", e);
                    tally.errors += 1;
                }
            }
        }

        info!("{}", "=".repeat(60));
        info!("🎉 Processing complete!");
        info!("✅ Successfully processed: {}", tally.processed);
        info!("❌ Errors: {}", tally.errors);
        info!("{}", "=".repeat(60));

        Ok(tally)
    }

    /// Transcript, summary, record, notification. `true` when the video may be moved.
    async fn process_video(&self, services: &Collaborators, item: &PlaylistItem) -> bool {
        let mut record = VideoRecord::from_item(item);

        info!("  Fetching transcript...");
        let Some(transcript) = services.transcripts.fetch(&item.video_id).await else {
            warn!("  {}: {}", NO_TRANSCRIPT, item.title);
            self.report_video_error(services, &record, NO_TRANSCRIPT).await;
            return false;
        };

        info!("  Summarizing...");
        match services
            .summarizer
            .summarize(&item.title, &item.channel_name, &transcript)
            .await
        {
            SummaryOutcome::Summary {
                summary,
                key_points,
                target_audience,
            } => {
                record.summary = summary;
                record.key_points = key_points;
                record.target_audience = target_audience;
            }
            SummaryOutcome::Error(e) => {
                let message = format!("Summarization failed: {}", e);
                error!("  {}", message);
                self.report_video_error(services, &record, &message).await;
                return false;
            }
        }

        info!("  Saving record...");
        match services.store.create_summary_record(&record).await {
            Ok(record_id) => info!("  Created record: {}", record_id),
            Err(e) => {
                error!("  Failed to create record: {}", e);
                return false;
            }
        }

        if self.notifier.notify_summary(&record).await {
            info!("  Slack notification sent");
        } else {
            warn!("  Slack notification skipped or failed");
        }
        true
    }

    async fn report_video_error(&self, services: &Collaborators, record: &VideoRecord, message: &str) {
        self.notifier
            .notify_processing_error(&record.title, &record.url, message)
            .await;

        match services.store.create_error_record(record, message).await {
            Ok(_) => info!("  Created error entry"),
            Err(e) => error!("  Failed to create error record: {}", e),
        }
    }

    async fn fail(&self, message: String) -> RunOutcome {
        let state = self.cooldown.record_failure(&message);
        let backoff = state.backoff_minutes.unwrap_or_default();

        self.notifier
            .notify_run_failure(&message, state.consecutive_failures, backoff)
            .await;

        RunOutcome::Failed {
            error: message,
            state,
        }
    }

    /// Clear the cooldown; announce it when this run ended a failure streak.
    async fn succeed(&self) -> Option<u32> {
        let previous = self.cooldown.record_success()?;
        let failures = previous.consecutive_failures;

        if self.notifier.notify_recovery(failures).await {
            info!("Sent recovery notification (was failing for {} runs)", failures);
        }
        Some(failures)
    }
}
