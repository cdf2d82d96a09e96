//! Live authenticated device sessions and their event projection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::{EventType, SecurityEvent};
use crate::types::{deserialize_timestamp, DbId, Timestamp};

/// A live device/browser session, revocable by its owner or an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: DbId,
    pub user_id: DbId,
    /// Present on the admin listing only.
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub device_info: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_active: Timestamp,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Session {
    /// Project into the event shape so sessions can share the log table.
    ///
    /// `last_active` becomes `created_at`; device, location and activity
    /// flag move into `event_metadata`.
    pub fn to_event(&self) -> SecurityEvent {
        let mut metadata = Map::new();
        metadata.insert("device".into(), opt_string(&self.device_info));
        metadata.insert("location".into(), opt_string(&self.location));
        metadata.insert("is_active".into(), Value::Bool(self.is_active));

        SecurityEvent {
            id: self.id,
            event_type: EventType::ActiveUserSession,
            created_at: self.last_active,
            user_id: Some(self.user_id),
            username: self.user_name.clone(),
            user_email: self.user_email.clone(),
            ip_address: self.ip_address.clone(),
            event_metadata: metadata,
            is_session: true,
        }
    }
}

impl From<Session> for SecurityEvent {
    fn from(session: Session) -> Self {
        session.to_event()
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}
