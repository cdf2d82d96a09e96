//! Explicit per-login context shared by the REST and WebSocket clients.
//!
//! The bearer token and role are handed to each client at construction
//! time; nothing reads them from global state.

use reqwest::Url;
use warden_core::error::CoreError;
use warden_core::roles;
use warden_core::types::DbId;

/// Path of the admin push channel, relative to the API base URL.
pub const SECURITY_WS_PATH: &str = "/api/admin/security/ws";

/// Identity and credentials of the signed-in operator.
#[derive(Clone)]
pub struct SessionContext {
    api_url: Url,
    token: String,
    role: String,
    user_id: Option<DbId>,
}

impl SessionContext {
    /// Build a context for `api_url` (e.g. `http://host:8081`).
    ///
    /// Only `http` and `https` base URLs are accepted, and the token must
    /// be non-empty.
    pub fn new(
        api_url: &str,
        token: impl Into<String>,
        role: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| CoreError::Validation(format!("Invalid API URL '{api_url}': {e}")))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(CoreError::Validation(format!(
                "API URL must use http or https, got '{}'",
                api_url.scheme()
            )));
        }

        let token = token.into();
        if token.trim().is_empty() {
            return Err(CoreError::Validation("missing bearer token".into()));
        }

        Ok(Self {
            api_url,
            token,
            role: role.into(),
            user_id: None,
        })
    }

    /// Attach the signed-in user's ID.
    pub fn with_user_id(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn user_id(&self) -> Option<DbId> {
        self.user_id
    }

    /// Whether this session may see the organisation-wide feed.
    pub fn is_admin(&self) -> bool {
        roles::is_privileged(&self.role)
    }

    /// Base URL without a trailing slash, e.g. `http://host:8081`.
    pub fn api_base(&self) -> &str {
        self.api_url.as_str().trim_end_matches('/')
    }

    /// Absolute URL for an API path such as `/api/users/me/sessions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base())
    }

    /// Push-channel URL: the API base with its scheme upgraded
    /// (`http` -> `ws`, `https` -> `wss`).
    pub fn ws_url(&self) -> String {
        let base = self.api_base();
        let upgraded = match base.strip_prefix("https") {
            Some(rest) => format!("wss{rest}"),
            None => format!("ws{}", base.strip_prefix("http").unwrap_or(base)),
        };
        format!("{upgraded}{SECURITY_WS_PATH}")
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("api_url", &self.api_base())
            .field("role", &self.role)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrades_http_to_ws() {
        let ctx = SessionContext::new("http://localhost:8081", "t", "admin").unwrap();
        assert_eq!(ctx.ws_url(), "ws://localhost:8081/api/admin/security/ws");
    }

    #[test]
    fn upgrades_https_to_wss_and_keeps_prefix() {
        let ctx = SessionContext::new("https://portal.example.com/backend/", "t", "user").unwrap();
        assert_eq!(
            ctx.ws_url(),
            "wss://portal.example.com/backend/api/admin/security/ws"
        );
        assert_eq!(
            ctx.endpoint("/api/users/me/sessions"),
            "https://portal.example.com/backend/api/users/me/sessions"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(SessionContext::new("ftp://host", "t", "admin").is_err());
        assert!(SessionContext::new("not a url", "t", "admin").is_err());
    }

    #[test]
    fn rejects_blank_token() {
        let err = SessionContext::new("http://host", "  ", "admin").unwrap_err();
        assert!(matches!(err, CoreError::Validation(m) if m == "missing bearer token"));
    }

    #[test]
    fn role_gate() {
        let admin = SessionContext::new("http://host", "t", "admin").unwrap();
        let user = SessionContext::new("http://host", "t", "user").unwrap();
        assert!(admin.is_admin());
        assert!(!user.is_admin());
    }

    #[test]
    fn debug_output_hides_token() {
        let ctx = SessionContext::new("http://host", "s3cret", "admin").unwrap();
        assert!(!format!("{ctx:?}").contains("s3cret"));
    }
}
