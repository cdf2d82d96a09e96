//! Integration tests for the feed summary logged by the monitor.

use warden_core::alert::AlertLevel;
use warden_core::event::{EventType, SecurityEvent};
use warden_feed::state::{FeedState, LoadPhase};
use warden_monitor::summary::FeedSummary;

fn event(json: serde_json::Value) -> SecurityEvent {
    serde_json::from_value(json).unwrap()
}

// ---------------------------------------------------------------------------
// Test: summary reflects the head of each list
// ---------------------------------------------------------------------------

#[test]
fn summary_reports_counts_and_newest_alert() {
    let mut state = FeedState::new(true, 20, None);
    state.set_live(true);
    state.apply_push(event(serde_json::json!({
        "id": 1, "event_type": "FAILED_LOGIN", "created_at": "2026-03-01T10:00:00Z",
        "event_metadata": {"lat": 52.52, "lon": 13.4}
    })));
    state.apply_push(event(serde_json::json!({
        "id": 2, "event_type": "SUSPICIOUS_ACTIVITY", "created_at": "2026-03-01T10:00:05Z",
        "username": "kai", "event_metadata": {"reason": "impossible travel"}
    })));

    let summary = FeedSummary::from(&state.snapshot());

    assert!(summary.live);
    assert_eq!(summary.logs, 2);
    assert_eq!(summary.newest_log_id, Some(2));
    assert_eq!(summary.alerts, 1);
    assert_eq!(summary.mapped, 1);
    assert_eq!(summary.logs_phase, LoadPhase::Idle);

    let alert = summary.newest_alert.unwrap();
    assert_eq!(alert.event_type, EventType::SuspiciousActivity);
    assert_eq!(alert.level, Some(AlertLevel::Warning));
    assert_eq!(alert.actor, "kai");
    assert_eq!(alert.reason.as_deref(), Some("impossible travel"));
}

// ---------------------------------------------------------------------------
// Test: summary serialization
// ---------------------------------------------------------------------------

#[test]
fn summary_serializes_with_null_optionals() {
    let state = FeedState::new(false, 10, Some(EventType::ActiveSession));

    let json = serde_json::to_value(FeedSummary::from(&state.snapshot())).unwrap();

    assert_eq!(json["filter"], "ACTIVE_SESSION");
    assert_eq!(json["logs"], 0);
    assert!(json["newest_alert"].is_null());
    assert_eq!(json["logs_phase"]["state"], "idle");
    assert_eq!(json["session_expired"], false);
    assert!(json["reconnect_attempt"].is_null());
    assert_eq!(json["logs_truncated"], false);
}

// ---------------------------------------------------------------------------
// Test: reconnect state
// ---------------------------------------------------------------------------

#[test]
fn reconnecting_feed_is_summarized_as_down() {
    let mut state = FeedState::new(true, 20, None);
    state.set_live(true);
    state.set_reconnecting(4);

    let summary = FeedSummary::from(&state.snapshot());

    assert!(!summary.live);
    assert_eq!(summary.reconnect_attempt, Some(4));
}

#[test]
fn identical_snapshots_summarize_equal() {
    let state = FeedState::new(true, 20, None);
    assert_eq!(
        FeedSummary::from(&state.snapshot()),
        FeedSummary::from(&state.snapshot())
    );
}
