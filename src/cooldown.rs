//! Failure cooldown with exponential backoff.
//!
//! A small JSON record persisted between scheduled runs. It stops a run from
//! hammering the upstream APIs (and the chat channel) while a known failure
//! such as an expired token is still present.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Wait in minutes after the 1st, 2nd, ... consecutive failure.
/// Saturates at the last entry.
pub const BACKOFF_SCHEDULE_MINUTES: [u32; 5] = [15, 30, 120, 480, 1440];

/// Longest error message kept in the record, in characters
pub const MAX_ERROR_CHARS: usize = 500;

/// Used when neither the config file nor `COOLDOWN_STATE_PATH` names a path
pub const DEFAULT_STATE_PATH: &str = "/tmp/cooldown_state.json";

/// Persisted cooldown record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownState {
    /// Failed runs since the last successful one
    pub consecutive_failures: u32,

    /// When the most recent failure was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<DateTime<Utc>>,

    /// Truncated description of the most recent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Runs before this instant are skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_after: Option<DateTime<Utc>>,

    /// Interval that produced `next_retry_after`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_minutes: Option<u32>,
}

impl CooldownState {
    /// Record with no failures and no active cooldown
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Result of the start-of-run check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    /// The run must exit before touching anything else
    pub skip: bool,
    /// Whatever was loaded from disk
    pub state: Option<CooldownState>,
}

/// Minutes to wait after `consecutive_failures` failed runs.
pub fn backoff_minutes(consecutive_failures: u32) -> u32 {
    if consecutive_failures == 0 {
        return 0;
    }
    let index = (consecutive_failures as usize - 1).min(BACKOFF_SCHEDULE_MINUTES.len() - 1);
    BACKOFF_SCHEDULE_MINUTES[index]
}

/// Cut `message` to at most `MAX_ERROR_CHARS` characters.
fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}

/// Owns the cooldown record at a single path
#[derive(Debug, Clone)]
pub struct CooldownController {
    state_path: PathBuf,
}

impl CooldownController {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Read the record. Anything unreadable counts as "no state".
    pub fn load(&self) -> Option<CooldownState> {
        if !self.state_path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&self.state_path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read cooldown state {}: {}", self.state_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<CooldownState>(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Could not parse cooldown state {}: {}", self.state_path.display(), e);
                None
            }
        }
    }

    /// Overwrite the record. Best effort: failures are only logged.
    pub fn save(&self, state: &CooldownState) {
        let json = match serde_json::to_string_pretty(state) {
            Ok(json) => json,
            Err(e) => {
                error!("Could not serialize cooldown state: {}", e);
                return;
            }
        };

        if let Err(e) = std::fs::write(&self.state_path, json) {
            error!("Could not write cooldown state {}: {}", self.state_path.display(), e);
        }
    }

    pub fn should_skip_run(&self) -> SkipDecision {
        self.should_skip_run_at(Utc::now())
    }

    /// Decide whether a run starting at `now` falls inside an active cooldown.
    ///
    /// An expired cooldown lets the run through but leaves the failure count
    /// alone; only `record_success` resets it.
    pub fn should_skip_run_at(&self, now: DateTime<Utc>) -> SkipDecision {
        let state = self.load();

        // No record, no failures, or failures without a retry time: run.
        let active = state
            .as_ref()
            .filter(|s| s.is_failing())
            .and_then(|s| s.next_retry_after.map(|at| (s.consecutive_failures, at)));
        let Some((failures, retry_at)) = active else {
            return SkipDecision { skip: false, state };
        };

        if now < retry_at {
            let minutes_left = (retry_at - now).num_minutes();
            info!(
                "⏸️ Cooldown active: {} consecutive failures. Next retry in {} minutes (at {})",
                failures,
                minutes_left,
                retry_at.to_rfc3339()
            );
            return SkipDecision { skip: true, state };
        }

        info!("🔁 Cooldown expired. Retrying after {} consecutive failures...", failures);
        SkipDecision { skip: false, state }
    }

    pub fn record_failure(&self, error_message: &str) -> CooldownState {
        self.record_failure_at(error_message, Utc::now())
    }

    /// Extend the streak by one and push the next retry out by the schedule.
    pub fn record_failure_at(&self, error_message: &str, now: DateTime<Utc>) -> CooldownState {
        let previous = self.load().map(|s| s.consecutive_failures).unwrap_or(0);
        let failures = previous.saturating_add(1);
        let backoff = backoff_minutes(failures);
        let next_retry = now + Duration::minutes(i64::from(backoff));

        let state = CooldownState {
            consecutive_failures: failures,
            last_failure_time: Some(now),
            last_error: Some(truncate_error(error_message)),
            next_retry_after: Some(next_retry),
            backoff_minutes: Some(backoff),
        };

        self.save(&state);
        info!(
            "📉 Recorded failure #{}. Next retry after {} minutes (at {})",
            failures,
            backoff,
            next_retry.format("%Y-%m-%d %H:%M UTC")
        );
        state
    }

    /// Clear the streak. Returns the old record only when this run ends one.
    pub fn record_success(&self) -> Option<CooldownState> {
        let previous = self.load();
        self.save(&CooldownState::clean());

        match previous {
            Some(state) if state.is_failing() => {
                info!(
                    "✅ Recovered after {} consecutive failures! Cooldown cleared.",
                    state.consecutive_failures
                );
                Some(state)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn controller(dir: &TempDir) -> CooldownController {
        CooldownController::new(dir.path().join("cooldown_state.json"))
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_minutes(0), 0);
        assert_eq!(backoff_minutes(1), 15);
        assert_eq!(backoff_minutes(2), 30);
        assert_eq!(backoff_minutes(3), 120);
        assert_eq!(backoff_minutes(4), 480);
        assert_eq!(backoff_minutes(5), 1440);
    }

    #[test]
    fn test_backoff_saturates() {
        for n in 6..50 {
            assert_eq!(backoff_minutes(n), 1440);
        }
        assert_eq!(backoff_minutes(u32::MAX), 1440);
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        for n in 0..20 {
            assert!(backoff_minutes(n) <= backoff_minutes(n + 1));
        }
    }

    #[test]
    fn test_truncate_error_respects_char_boundaries() {
        let message = "é".repeat(600);
        let truncated = truncate_error(&message);
        assert_eq!(truncated.chars().count(), MAX_ERROR_CHARS);
        assert!(truncated.chars().all(|c| c == 'é'));

        assert_eq!(truncate_error("short"), "short");
    }

    #[test]
    fn test_clean_state_serializes_to_single_field() {
        let json = serde_json::to_value(CooldownState::clean()).unwrap();
        assert_eq!(json, serde_json::json!({ "consecutive_failures": 0 }));
    }

    #[test]
    fn test_failure_state_invariants() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let state = controller.record_failure_at("token expired", now);

        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.last_failure_time, Some(now));
        assert_eq!(state.backoff_minutes, Some(15));
        assert_eq!(state.next_retry_after, Some(now + Duration::minutes(15)));
        assert_eq!(state.last_error.as_deref(), Some("token expired"));
    }

    #[test]
    fn test_skip_boundary_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let state = controller.record_failure_at("boom", now);
        let retry_at = state.next_retry_after.unwrap();

        assert!(controller.should_skip_run_at(retry_at - Duration::seconds(1)).skip);
        assert!(!controller.should_skip_run_at(retry_at).skip);
    }

    #[test]
    fn test_failures_without_retry_time_never_block() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        std::fs::write(controller.state_path(), r#"{"consecutive_failures": 4}"#).unwrap();

        let decision = controller.should_skip_run();
        assert!(!decision.skip);
        assert_eq!(decision.state.unwrap().consecutive_failures, 4);
    }

    #[test]
    fn test_save_to_missing_directory_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let controller = CooldownController::new(dir.path().join("missing").join("state.json"));

        controller.save(&CooldownState::clean());
        let state = controller.record_failure("unwritable");

        assert_eq!(state.consecutive_failures, 1);
        assert!(controller.load().is_none());
    }
}
