use super::{create_llm, ChatMessage, LLMConfig, LLM};
use crate::models::SummaryOutcome;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Longest transcript sent to the model, in characters
pub const MAX_TRANSCRIPT_CHARS: usize = 100_000;

const TRUNCATION_NOTICE: &str = "\n\n[Transcript truncated due to length...]";

const SYSTEM_PROMPT: &str = "You summarize YouTube video transcripts concisely.";

/// Turns a transcript into a short structured summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, channel: &str, transcript: &str) -> SummaryOutcome;
}

/// Shape the model is asked to answer with
#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default, alias = "audience")]
    target_audience: String,
}

/// Summarizer backed by any configured LLM provider
pub struct LlmSummarizer {
    llm: Box<dyn LLM>,
}

impl LlmSummarizer {
    pub fn new(config: &LLMConfig) -> super::Result<Self> {
        Ok(Self {
            llm: create_llm(config)?,
        })
    }

    pub fn with_llm(llm: Box<dyn LLM>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, title: &str, channel: &str, transcript: &str) -> SummaryOutcome {
        let transcript = truncate_transcript(transcript);
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(title, channel, &transcript)),
        ];

        let response = match self.llm.chat(messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{:?} summarization failed: {}", self.llm.provider_type(), e);
                return SummaryOutcome::Error(e.to_string());
            }
        };

        debug!("Summary received (tokens: {:?})", response.tokens_used);
        parse_summary(&response.content)
    }
}

/// Keep the transcript within the model's context budget.
///
/// Cuts at the last sentence end when one falls in the final 20% of the
/// budget, then appends a notice so the model knows text is missing.
pub fn truncate_transcript(transcript: &str) -> String {
    let Some((byte_limit, _)) = transcript.char_indices().nth(MAX_TRANSCRIPT_CHARS) else {
        return transcript.to_string();
    };

    let mut truncated = &transcript[..byte_limit];
    if let Some(last_period) = truncated.rfind(". ") {
        let chars_before = truncated[..last_period].chars().count();
        if chars_before * 10 > MAX_TRANSCRIPT_CHARS * 8 {
            truncated = &truncated[..last_period + 1];
        }
    }

    format!("{}{}", truncated, TRUNCATION_NOTICE)
}

fn build_prompt(title: &str, channel: &str, transcript: &str) -> String {
    format!(
        r#"Summarize this video transcript.

Title: {title}
Channel: {channel}
Transcript: {transcript}

Provide:
1. A 2-3 sentence summary
2. 3-5 key takeaways
3. Who would find this video useful

Respond with only a JSON object of this exact shape:
{{
  "summary": "your summary",
  "key_points": ["point 1", "point 2"],
  "target_audience": "who would benefit"
}}"#
    )
}

/// Strip a surrounding Markdown code fence, if any
fn clean_llm_response(content: &str) -> &str {
    let content = content.trim();

    if content.starts_with("```") {
        if let (Some(start), Some(end)) = (content.find('\n'), content.rfind("```")) {
            if end > start {
                return content[start + 1..end].trim();
            }
        }
    }

    content
}

fn parse_summary(content: &str) -> SummaryOutcome {
    match serde_json::from_str::<SummaryPayload>(clean_llm_response(content)) {
        Ok(payload) => SummaryOutcome::Summary {
            summary: payload.summary.trim().to_string(),
            key_points: payload
                .key_points
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            target_audience: payload.target_audience.trim().to_string(),
        },
        Err(e) => SummaryOutcome::Error(format!("Could not decode model response: {}", e)),
    }
}
