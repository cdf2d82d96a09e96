//! Integration tests for monitor configuration parsing.

use std::collections::HashMap;

use assert_matches::assert_matches;
use warden_core::event::EventType;
use warden_monitor::config::{ConfigError, MonitorConfig};

fn load(vars: &[(&str, &str)]) -> Result<MonitorConfig, ConfigError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    MonitorConfig::from_lookup(|key| vars.get(key).cloned())
}

const REQUIRED: [(&str, &str); 2] = [
    ("WARDEN_API_URL", "http://localhost:8081"),
    ("WARDEN_TOKEN", "tok"),
];

// ---------------------------------------------------------------------------
// Test: defaults
// ---------------------------------------------------------------------------

#[test]
fn minimal_environment_uses_defaults() {
    let config = load(&REQUIRED).unwrap();

    assert_eq!(config.role, "user");
    assert_eq!(config.user_id, None);
    assert_eq!(config.page_size, None);
    assert_eq!(config.event_filter, None);
    assert!(!config.ws_reconnect);
    assert_eq!(config.active_user_days, 7);

    let feed = config.feed_config();
    assert!(feed.transport.reconnect.is_none());
    let session = config.session_context().unwrap();
    assert_eq!(feed.limit_for(&session), 10);
}

// ---------------------------------------------------------------------------
// Test: required variables
// ---------------------------------------------------------------------------

#[test]
fn missing_token_is_reported() {
    let err = load(&[("WARDEN_API_URL", "http://localhost:8081")]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("WARDEN_TOKEN"));
}

#[test]
fn blank_url_counts_as_missing() {
    let err = load(&[("WARDEN_API_URL", "  "), ("WARDEN_TOKEN", "tok")]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("WARDEN_API_URL"));
}

// ---------------------------------------------------------------------------
// Test: optional variables
// ---------------------------------------------------------------------------

#[test]
fn admin_environment_is_fully_parsed() {
    let mut vars = REQUIRED.to_vec();
    vars.extend([
        ("WARDEN_ROLE", "Admin"),
        ("WARDEN_USER_ID", "12"),
        ("WARDEN_PAGE_SIZE", "50"),
        ("WARDEN_EVENT_FILTER", "account_locked"),
        ("WARDEN_WS_RECONNECT", "yes"),
        ("WARDEN_ACTIVE_USER_DAYS", "30"),
    ]);

    let config = load(&vars).unwrap();

    assert_eq!(config.role, "admin");
    assert_eq!(config.user_id, Some(12));
    assert_eq!(config.event_filter, Some(EventType::AccountLocked));

    let session = config.session_context().unwrap();
    assert!(session.is_admin());
    assert_eq!(session.user_id(), Some(12));

    let feed = config.feed_config();
    assert_eq!(feed.limit_for(&session), 50);
    assert_eq!(feed.activity_days, 30);
    assert_eq!(feed.initial_filter, Some(EventType::AccountLocked));
    assert!(feed.transport.reconnect.is_some());
}

#[test]
fn invalid_values_name_the_variable() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("WARDEN_PAGE_SIZE", "twenty"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "WARDEN_PAGE_SIZE", .. })
    );

    let mut vars = REQUIRED.to_vec();
    vars.push(("WARDEN_PAGE_SIZE", "0"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "WARDEN_PAGE_SIZE", .. })
    );

    let mut vars = REQUIRED.to_vec();
    vars.push(("WARDEN_EVENT_FILTER", "PASSWORD_RESET"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "WARDEN_EVENT_FILTER", .. })
    );

    let mut vars = REQUIRED.to_vec();
    vars.push(("WARDEN_WS_RECONNECT", "maybe"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "WARDEN_WS_RECONNECT", .. })
    );
}

#[test]
fn non_http_url_fails_at_session_construction() {
    let config = load(&[("WARDEN_API_URL", "ftp://host"), ("WARDEN_TOKEN", "tok")]).unwrap();
    assert_matches!(config.session_context(), Err(ConfigError::Session(_)));
}
