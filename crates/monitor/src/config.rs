use warden_client::reconnect::ReconnectConfig;
use warden_client::session::SessionContext;
use warden_client::transport::TransportOptions;
use warden_core::activity::DEFAULT_ACTIVITY_DAYS;
use warden_core::error::CoreError;
use warden_core::event::EventType;
use warden_core::roles::ROLE_USER;
use warden_core::types::DbId;
use warden_feed::config::FeedConfig;

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// REST base URL of the security service.
    pub api_url: String,
    pub token: String,
    /// Role of the token's owner (default: `user`).
    pub role: String,
    pub user_id: Option<DbId>,
    /// Page size override; the role default applies when unset.
    pub page_size: Option<u32>,
    pub event_filter: Option<EventType>,
    /// Reconnect with backoff after the push channel drops (default: off).
    pub ws_reconnect: bool,
    /// Trailing window of the login-activity chart (default: `7`).
    pub active_user_days: u32,
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Session(#[from] CoreError),
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default              |
    /// |--------------------------|----------------------|
    /// | `WARDEN_API_URL`         | required             |
    /// | `WARDEN_TOKEN`           | required             |
    /// | `WARDEN_ROLE`            | `user`               |
    /// | `WARDEN_USER_ID`         | none                 |
    /// | `WARDEN_PAGE_SIZE`       | `20` admin, `10` user |
    /// | `WARDEN_EVENT_FILTER`    | none                 |
    /// | `WARDEN_WS_RECONNECT`    | `false`              |
    /// | `WARDEN_ACTIVE_USER_DAYS`| `7`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = var("WARDEN_API_URL").ok_or(ConfigError::Missing("WARDEN_API_URL"))?;
        let token = var("WARDEN_TOKEN").ok_or(ConfigError::Missing("WARDEN_TOKEN"))?;
        let role = var("WARDEN_ROLE")
            .map(|r| r.to_ascii_lowercase())
            .unwrap_or_else(|| ROLE_USER.to_string());

        let user_id = var("WARDEN_USER_ID")
            .map(|v| parse_var("WARDEN_USER_ID", v))
            .transpose()?;
        let page_size = var("WARDEN_PAGE_SIZE")
            .map(|v| parse_var("WARDEN_PAGE_SIZE", v))
            .transpose()?;
        if page_size == Some(0) {
            return Err(ConfigError::Invalid {
                var: "WARDEN_PAGE_SIZE",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let event_filter = var("WARDEN_EVENT_FILTER")
            .map(|v| parse_var("WARDEN_EVENT_FILTER", v))
            .transpose()?;
        let ws_reconnect = var("WARDEN_WS_RECONNECT")
            .map(|v| parse_flag("WARDEN_WS_RECONNECT", v))
            .transpose()?
            .unwrap_or(false);
        let active_user_days = var("WARDEN_ACTIVE_USER_DAYS")
            .map(|v| parse_var("WARDEN_ACTIVE_USER_DAYS", v))
            .transpose()?
            .unwrap_or(DEFAULT_ACTIVITY_DAYS);

        Ok(Self {
            api_url,
            token,
            role,
            user_id,
            page_size,
            event_filter,
            ws_reconnect,
            active_user_days,
        })
    }

    /// Build the explicit session context handed to both clients.
    pub fn session_context(&self) -> Result<SessionContext, ConfigError> {
        let session = SessionContext::new(&self.api_url, self.token.clone(), self.role.clone())?;
        Ok(match self.user_id {
            Some(id) => session.with_user_id(id),
            None => session,
        })
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            page_size: self.page_size,
            initial_filter: self.event_filter,
            activity_days: self.active_user_days,
            transport: TransportOptions {
                reconnect: self.ws_reconnect.then(ReconnectConfig::default),
                ..TransportOptions::default()
            },
        }
    }
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected true or false".into(),
        }),
    }
}
