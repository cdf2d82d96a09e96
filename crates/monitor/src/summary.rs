//! Condensed view of a feed snapshot for log output.
//!
//! The monitor logs one line per change of [`FeedSummary`], so repeated
//! snapshots that differ only in list contents below the head stay quiet.

use serde::Serialize;
use warden_core::alert::AlertLevel;
use warden_core::event::EventType;
use warden_core::types::DbId;
use warden_feed::snapshot::FeedSnapshot;
use warden_feed::state::LoadPhase;

/// The newest entry of the alerts panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertHead {
    pub id: DbId,
    pub event_type: EventType,
    pub level: Option<AlertLevel>,
    pub actor: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub live: bool,
    pub reconnect_attempt: Option<u32>,
    pub session_expired: bool,
    pub filter: Option<EventType>,
    pub page: u32,
    pub logs: usize,
    pub logs_phase: LoadPhase,
    pub logs_truncated: bool,
    pub newest_log_id: Option<DbId>,
    pub alerts: usize,
    pub newest_alert: Option<AlertHead>,
    pub sessions: usize,
    pub mapped: usize,
}

impl From<&FeedSnapshot> for FeedSummary {
    fn from(snapshot: &FeedSnapshot) -> Self {
        Self {
            live: snapshot.live,
            reconnect_attempt: snapshot.reconnect_attempt,
            session_expired: snapshot.session_expired,
            filter: snapshot.filter,
            page: snapshot.page,
            logs: snapshot.logs.len(),
            logs_phase: snapshot.logs_phase.clone(),
            logs_truncated: snapshot.logs_truncated,
            newest_log_id: snapshot.logs.first().map(|e| e.id),
            alerts: snapshot.alerts.len(),
            newest_alert: snapshot.newest_alert().map(|e| AlertHead {
                id: e.id,
                event_type: e.event_type,
                level: AlertLevel::for_event(e),
                actor: e.actor_label(),
                reason: e.reason().map(str::to_string),
            }),
            sessions: snapshot.my_sessions.len(),
            mapped: snapshot.map_markers().len(),
        }
    }
}

impl FeedSummary {
    /// Emit the summary as one structured log line.
    pub fn log(&self) {
        let alert_id = self.newest_alert.as_ref().map(|a| a.id);
        let alert_type = self.newest_alert.as_ref().map(|a| a.event_type.as_str());

        if let LoadPhase::Failed(message) = &self.logs_phase {
            tracing::warn!(
                page = self.page,
                filter = ?self.filter,
                %message,
                "Audit log unavailable",
            );
        }

        if let Some(attempt) = self.reconnect_attempt {
            tracing::warn!(attempt, "Live feed down, reconnecting");
        }

        tracing::info!(
            live = self.live,
            page = self.page,
            filter = ?self.filter,
            logs = self.logs,
            logs_truncated = self.logs_truncated,
            newest_log_id = ?self.newest_log_id,
            alerts = self.alerts,
            newest_alert_id = ?alert_id,
            newest_alert_type = ?alert_type,
            sessions = self.sessions,
            mapped = self.mapped,
            "Security feed updated",
        );
    }
}
