use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use yt_summarizer::cooldown::{backoff_minutes, MAX_ERROR_CHARS};
use yt_summarizer::{CooldownController, CooldownState};

fn controller(dir: &TempDir) -> CooldownController {
    CooldownController::new(dir.path().join("cooldown_state.json"))
}

#[test]
fn test_fresh_install_runs() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);

    let decision = cooldown.should_skip_run();
    assert!(!decision.skip);
    assert!(decision.state.is_none());
    assert!(!cooldown.state_path().exists());
}

#[test]
fn test_three_failures_enter_two_hour_cooldown() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

    cooldown.record_failure_at("token expired", start);
    cooldown.record_failure_at("token expired", start);
    let state = cooldown.record_failure_at("token expired", start);

    assert_eq!(state.consecutive_failures, 3);
    assert_eq!(state.backoff_minutes, Some(120));
    assert_eq!(state.next_retry_after, Some(start + Duration::minutes(120)));

    let decision = cooldown.should_skip_run_at(start + Duration::minutes(5));
    assert!(decision.skip);
    assert_eq!(decision.state, Some(state));
}

#[test]
fn test_expired_cooldown_runs_without_touching_state() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

    let state = cooldown.record_failure_at("boom", start);
    let before = std::fs::read_to_string(cooldown.state_path()).unwrap();

    let decision = cooldown.should_skip_run_at(start + Duration::hours(1));
    assert!(!decision.skip);
    assert_eq!(decision.state, Some(state));

    let after = std::fs::read_to_string(cooldown.state_path()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_long_error_is_truncated() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);

    let state = cooldown.record_failure(&"e".repeat(1000));
    let stored = state.last_error.unwrap();
    assert_eq!(stored.chars().count(), MAX_ERROR_CHARS);

    let reloaded = cooldown.load().unwrap();
    assert_eq!(reloaded.last_error.as_deref(), Some(stored.as_str()));
}

#[test]
fn test_success_on_healthy_system_reports_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);

    assert!(cooldown.record_success().is_none());
    assert!(cooldown.record_success().is_none());
    assert_eq!(cooldown.load(), Some(CooldownState::clean()));
}

#[test]
fn test_success_after_failures_returns_previous_state() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);

    cooldown.record_failure("first");
    let last = cooldown.record_failure("second");

    let previous = cooldown.record_success().unwrap();
    assert_eq!(previous, last);
    assert_eq!(previous.consecutive_failures, 2);

    let decision = cooldown.should_skip_run();
    assert!(!decision.skip);
    assert_eq!(decision.state, Some(CooldownState::clean()));
}

#[test]
fn test_save_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);
    let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

    let state = CooldownState {
        consecutive_failures: 4,
        last_failure_time: Some(at),
        last_error: Some("Notion 502".to_string()),
        next_retry_after: Some(at + Duration::minutes(480)),
        backoff_minutes: Some(480),
    };
    cooldown.save(&state);

    assert_eq!(cooldown.load(), Some(state));
}

#[test]
fn test_corrupt_state_is_treated_as_missing() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);

    std::fs::write(cooldown.state_path(), "{ not json").unwrap();
    assert!(cooldown.load().is_none());
    assert!(!cooldown.should_skip_run().skip);

    std::fs::write(cooldown.state_path(), r#"{"last_error": "x"}"#).unwrap();
    assert!(cooldown.load().is_none());

    // A corrupt record restarts the streak.
    let state = cooldown.record_failure("again");
    assert_eq!(state.consecutive_failures, 1);
}

#[test]
fn test_failure_count_tracks_every_failed_run() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    for k in 1..=7u32 {
        let state = cooldown.record_failure_at("still broken", start);
        assert_eq!(state.consecutive_failures, k);
        assert_eq!(state.backoff_minutes, Some(backoff_minutes(k)));
    }

    let state = cooldown.load().unwrap();
    assert_eq!(state.backoff_minutes, Some(1440));
    assert!(cooldown.should_skip_run_at(start + Duration::hours(23)).skip);
    assert!(!cooldown.should_skip_run_at(start + Duration::hours(24)).skip);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let cooldown = controller(&temp_dir);
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    let retry_at = now + Duration::minutes(30);

    let content = serde_json::json!({
        "consecutive_failures": 2,
        "next_retry_after": retry_at.to_rfc3339(),
        "backoff_minutes": 30,
        "future": { "schema": 2, "notes": ["added later"] }
    });
    std::fs::write(cooldown.state_path(), content.to_string()).unwrap();

    let state = cooldown.load().unwrap();
    assert_eq!(state.consecutive_failures, 2);
    assert_eq!(state.next_retry_after, Some(retry_at));

    assert!(cooldown.should_skip_run_at(now).skip);
    assert!(!cooldown.should_skip_run_at(retry_at).skip);
}
