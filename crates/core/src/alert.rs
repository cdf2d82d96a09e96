//! Alert-panel classification for high-severity security events.

use serde::Serialize;

use crate::event::{EventType, SecurityEvent};

/// Maximum number of entries kept in the alerts panel.
pub const ALERT_CAPACITY: usize = 10;

/// Severity level of an alert-panel entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Flagged by the anomaly detector; the account is still usable.
    Warning,
    /// The account has been locked.
    Critical,
}

impl AlertLevel {
    /// Level for an event, or `None` if the event is not alert-worthy.
    pub fn for_event(event: &SecurityEvent) -> Option<Self> {
        match event.event_type {
            EventType::SuspiciousActivity => Some(AlertLevel::Warning),
            EventType::AccountLocked => Some(AlertLevel::Critical),
            _ => None,
        }
    }
}
