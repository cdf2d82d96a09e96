//! Aggregated login counts for the "recent user logins" chart.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Default trailing window for the activity chart.
pub const DEFAULT_ACTIVITY_DAYS: u32 = 7;

/// Login activity for one user over a trailing window.
///
/// Chart data only; never merged into the event feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveUserStat {
    #[serde(default)]
    pub user_id: Option<DbId>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    pub last_seen: Option<Timestamp>,
    #[serde(default)]
    pub last_ip: Option<String>,
    pub total_logins: u64,
}

fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| crate::types::parse_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}
