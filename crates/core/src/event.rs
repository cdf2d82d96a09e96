//! Security events as served by the REST API and pushed over WebSocket.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{deserialize_timestamp, DbId, Timestamp};

/// Kind of security-relevant occurrence recorded by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A password or OAuth login attempt was rejected.
    FailedLogin,
    /// A login succeeded and opened a session.
    ActiveSession,
    /// The anomaly detector flagged the request.
    SuspiciousActivity,
    /// Repeated failures locked the account.
    AccountLocked,
    /// A live session record projected into the event shape.
    ActiveUserSession,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::FailedLogin,
        EventType::ActiveSession,
        EventType::SuspiciousActivity,
        EventType::AccountLocked,
        EventType::ActiveUserSession,
    ];

    /// Wire name, e.g. `FAILED_LOGIN`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::FailedLogin => "FAILED_LOGIN",
            EventType::ActiveSession => "ACTIVE_SESSION",
            EventType::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            EventType::AccountLocked => "ACCOUNT_LOCKED",
            EventType::ActiveUserSession => "ACTIVE_USER_SESSION",
        }
    }

    /// High-severity types that always land in the alerts panel.
    pub fn is_alert(self) -> bool {
        matches!(self, EventType::SuspiciousActivity | EventType::AccountLocked)
    }

    /// Types drawn as danger markers on the map.
    pub fn is_threat(self) -> bool {
        matches!(
            self,
            EventType::FailedLogin | EventType::SuspiciousActivity | EventType::AccountLocked
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("Unknown event type '{s}'")))
    }
}

/// One security event.
///
/// Immutable once created: the client only ever drops events (truncation
/// or session revocation), it never edits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: DbId,
    pub event_type: EventType,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: Timestamp,
    /// Absent for anonymous failed attempts.
    #[serde(default)]
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub username: Option<String>,
    /// Only populated on session projections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Open mapping; may carry `location`, `lat`, `lon`, `reason`,
    /// `device`, `is_active`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub event_metadata: Map<String, Value>,
    /// True when this entry is a projected [`Session`](crate::session::Session).
    #[serde(default)]
    pub is_session: bool,
}

impl SecurityEvent {
    pub fn is_alert(&self) -> bool {
        self.event_type.is_alert()
    }

    /// String metadata value, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.event_metadata.get(key).and_then(Value::as_str)
    }

    pub fn location(&self) -> Option<&str> {
        self.metadata_str("location")
    }

    pub fn reason(&self) -> Option<&str> {
        self.metadata_str("reason")
    }

    /// `(lat, lon)` when both are present and non-zero.
    ///
    /// Numbers and numeric strings are both accepted; a zero coordinate is
    /// treated as "geolocation unavailable".
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.metadata_f64("lat")?;
        let lon = self.metadata_f64("lon")?;
        (lat != 0.0 && lon != 0.0).then_some((lat, lon))
    }

    /// Label for the acting user, falling back to the raw ID.
    pub fn actor_label(&self) -> String {
        match (&self.username, self.user_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("Unknown (ID: {id})"),
            (None, None) => "Unknown (ID: N/A)".to_string(),
        }
    }

    fn metadata_f64(&self, key: &str) -> Option<f64> {
        match self.event_metadata.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SecurityEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn deserializes_full_event() {
        let evt = parse(
            r#"{"id":7,"event_type":"SUSPICIOUS_ACTIVITY","created_at":"2026-03-01T10:00:00Z",
                "user_id":3,"username":"dana","ip_address":"10.0.0.4",
                "event_metadata":{"reason":"impossible travel","lat":48.85,"lon":2.35}}"#,
        );
        assert_eq!(evt.id, 7);
        assert_eq!(evt.event_type, EventType::SuspiciousActivity);
        assert!(evt.is_alert());
        assert_eq!(evt.reason(), Some("impossible travel"));
        assert_eq!(evt.coordinates(), Some((48.85, 2.35)));
        assert!(!evt.is_session);
    }

    #[test]
    fn anonymous_event_with_null_metadata() {
        let evt = parse(
            r#"{"id":1,"event_type":"FAILED_LOGIN","created_at":"2026-03-01T10:00:00",
                "user_id":null,"event_metadata":null}"#,
        );
        assert!(evt.user_id.is_none());
        assert!(evt.event_metadata.is_empty());
        assert_eq!(evt.actor_label(), "Unknown (ID: N/A)");
    }

    #[test]
    fn zero_or_missing_coordinates_are_unmappable() {
        let evt = parse(
            r#"{"id":1,"event_type":"ACTIVE_SESSION","created_at":"2026-03-01T10:00:00Z",
                "event_metadata":{"lat":0,"lon":12.5}}"#,
        );
        assert_eq!(evt.coordinates(), None);

        let evt = parse(
            r#"{"id":2,"event_type":"ACTIVE_SESSION","created_at":"2026-03-01T10:00:00Z",
                "event_metadata":{"lat":"51.5","lon":"-0.12"}}"#,
        );
        assert_eq!(evt.coordinates(), Some((51.5, -0.12)));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let res = serde_json::from_str::<SecurityEvent>(
            r#"{"id":1,"event_type":"PASSWORD_RESET","created_at":"2026-03-01T10:00:00Z"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn event_type_from_str_is_case_insensitive() {
        assert_eq!(
            "failed_login".parse::<EventType>().unwrap(),
            EventType::FailedLogin
        );
        assert!("nope".parse::<EventType>().is_err());
    }

    #[test]
    fn alert_and_threat_classification() {
        let alerts: Vec<_> = EventType::ALL.into_iter().filter(|t| t.is_alert()).collect();
        assert_eq!(
            alerts,
            vec![EventType::SuspiciousActivity, EventType::AccountLocked]
        );
        assert!(EventType::FailedLogin.is_threat());
        assert!(!EventType::ActiveSession.is_threat());
    }
}
