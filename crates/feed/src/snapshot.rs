//! Read-only view of the feed published to consumers.

use serde::Serialize;
use warden_core::activity::ActiveUserStat;
use warden_core::alert::AlertLevel;
use warden_core::event::{EventType, SecurityEvent};
use warden_core::session::Session;
use warden_core::types::DbId;

use crate::state::LoadPhase;

/// A point-in-time copy of the feed state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub is_admin: bool,
    /// Newest first, at most [`ALERT_CAPACITY`](warden_core::alert::ALERT_CAPACITY).
    pub alerts: Vec<SecurityEvent>,
    /// Newest first, at most `limit`.
    pub logs: Vec<SecurityEvent>,
    pub my_sessions: Vec<Session>,
    pub active_users: Vec<ActiveUserStat>,
    pub filter: Option<EventType>,
    pub page: u32,
    pub limit: u32,
    pub logs_phase: LoadPhase,
    /// The session listing held more rows than one page shows.
    pub logs_truncated: bool,
    pub alerts_phase: LoadPhase,
    pub sessions_phase: LoadPhase,
    pub can_go_next: bool,
    pub can_go_prev: bool,
    /// Whether the push channel is currently connected.
    pub live: bool,
    /// Pending reconnection attempt while the push channel is down.
    pub reconnect_attempt: Option<u32>,
    pub session_expired: bool,
}

/// A log entry with usable coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapMarker {
    pub event_id: DbId,
    pub lat: f64,
    pub lon: f64,
    pub threat: bool,
}

impl FeedSnapshot {
    pub fn newest_alert(&self) -> Option<&SecurityEvent> {
        self.alerts.first()
    }

    /// Alerts paired with their severity.
    pub fn leveled_alerts(&self) -> impl Iterator<Item = (AlertLevel, &SecurityEvent)> {
        self.alerts
            .iter()
            .filter_map(|e| AlertLevel::for_event(e).map(|level| (level, e)))
    }

    /// Markers for every log entry that carries non-zero coordinates.
    pub fn map_markers(&self) -> Vec<MapMarker> {
        self.logs
            .iter()
            .filter_map(|e| {
                let (lat, lon) = e.coordinates()?;
                Some(MapMarker {
                    event_id: e.id,
                    lat,
                    lon,
                    threat: e.event_type.is_threat(),
                })
            })
            .collect()
    }

    /// The `n` users with the most logins in the chart window.
    pub fn top_active_users(&self, n: usize) -> Vec<&ActiveUserStat> {
        let mut rows: Vec<_> = self.active_users.iter().collect();
        rows.sort_by(|a, b| b.total_logins.cmp(&a.total_logins));
        rows.truncate(n);
        rows
    }
}
