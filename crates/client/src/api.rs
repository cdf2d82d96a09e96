//! REST client for the security audit endpoints.
//!
//! Wraps the paginated event queries, session listings, login-activity
//! aggregation and session revocation using [`reqwest`]. Stateless beyond
//! the request/response pair: no caching and no retries.

use async_trait::async_trait;
use serde::Deserialize;
use warden_core::activity::ActiveUserStat;
use warden_core::event::{EventType, SecurityEvent};
use warden_core::session::Session;
use warden_core::types::DbId;

use crate::session::SessionContext;

/// Paging and filter parameters for an event query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub skip: u32,
    pub limit: u32,
    pub event_type: Option<EventType>,
    pub user_id: Option<DbId>,
}

impl EventQuery {
    /// Query for zero-based `page` of size `limit`.
    pub fn page(page: u32, limit: u32, event_type: Option<EventType>) -> Self {
        Self {
            skip: page.saturating_mul(limit),
            limit,
            event_type,
            user_id: None,
        }
    }

    /// Restrict the admin query to one user's events.
    pub fn for_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("skip", self.skip.to_string()), ("limit", self.limit.to_string())];
        if let Some(event_type) = self.event_type {
            params.push(("event_type", event_type.as_str().to_string()));
        }
        if let Some(user_id) = self.user_id {
            params.push(("user_id", user_id.to_string()));
        }
        params
    }
}

/// Errors from the security REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The bearer token was rejected; the session is no longer valid.
    #[error("Session expired: {}", .detail.as_deref().unwrap_or("unauthorized"))]
    Unauthorized { detail: Option<String> },

    /// The caller lacks the role required by the endpoint.
    #[error("Access denied: {}", .detail.as_deref().unwrap_or("forbidden"))]
    Forbidden { detail: Option<String> },

    /// Any other non-2xx status.
    #[error("Security API error ({status}): {body}")]
    Status {
        status: u16,
        /// Server-provided `detail` message, when the body carried one.
        detail: Option<String>,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ApiError {
    /// Whether this error means the session token is no longer accepted.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Server-supplied human-readable reason, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { detail }
            | ApiError::Forbidden { detail }
            | ApiError::Status { detail, .. } => detail.as_deref(),
            ApiError::Request(_) => None,
        }
    }
}

/// Query and mutation operations the feed depends on.
///
/// [`SecurityApi`] is the production implementation; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait AuditQuery: Send + Sync + 'static {
    /// Organisation-wide events, newest first, at most `query.limit`.
    async fn events(&self, query: &EventQuery) -> Result<Vec<SecurityEvent>, ApiError>;

    /// The caller's own events, newest first.
    async fn own_events(&self, query: &EventQuery) -> Result<Vec<SecurityEvent>, ApiError>;

    /// Login counts per user over the trailing `days`.
    async fn active_users(&self, days: u32) -> Result<Vec<ActiveUserStat>, ApiError>;

    /// The caller's own device sessions.
    async fn own_sessions(&self) -> Result<Vec<Session>, ApiError>;

    /// Every active session (admin only).
    async fn all_sessions(&self) -> Result<Vec<Session>, ApiError>;

    /// Revoke one of the caller's own sessions.
    async fn revoke_session(&self, session_id: DbId) -> Result<(), ApiError>;

    /// Revoke any user's session (admin only).
    async fn admin_revoke_session(&self, session_id: DbId) -> Result<(), ApiError>;
}

/// HTTP client for the security service.
pub struct SecurityApi {
    client: reqwest::Client,
    session: SessionContext,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl SecurityApi {
    /// Create a new API client for the given session.
    pub fn new(session: SessionContext) -> Self {
        Self {
            client: reqwest::Client::new(),
            session,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, session: SessionContext) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.session.endpoint(path))
            .bearer_auth(self.session.token())
            .query(params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.session.endpoint(path))
            .bearer_auth(self.session.token())
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, classifying
    /// 401/403 separately so callers can react to an expired session.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let detail = extract_detail(&body);

        Err(match status.as_u16() {
            401 => ApiError::Unauthorized { detail },
            403 => ApiError::Forbidden { detail },
            code => ApiError::Status {
                status: code,
                detail,
                body,
            },
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Pull a readable message out of a `{"detail": ...}` error body.
///
/// Validation errors carry a list under `detail`; its first `msg` is used.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl AuditQuery for SecurityApi {
    async fn events(&self, query: &EventQuery) -> Result<Vec<SecurityEvent>, ApiError> {
        tracing::debug!(
            skip = query.skip,
            limit = query.limit,
            event_type = ?query.event_type,
            "Fetching security events",
        );
        self.get_json("/api/admin/security/events", &query.params())
            .await
    }

    async fn own_events(&self, query: &EventQuery) -> Result<Vec<SecurityEvent>, ApiError> {
        // The personal endpoint is always scoped to the caller.
        let mut params = query.params();
        params.retain(|(key, _)| *key != "user_id");
        self.get_json("/api/users/me/security-events", &params).await
    }

    async fn active_users(&self, days: u32) -> Result<Vec<ActiveUserStat>, ApiError> {
        self.get_json(
            "/api/admin/security/active-users",
            &[("days", days.to_string())],
        )
        .await
    }

    async fn own_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.get_json("/api/users/me/sessions", &[]).await
    }

    async fn all_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.get_json("/api/admin/security/sessions", &[]).await
    }

    async fn revoke_session(&self, session_id: DbId) -> Result<(), ApiError> {
        tracing::info!(session_id, "Revoking own session");
        self.delete(&format!("/api/users/me/sessions/{session_id}"))
            .await
    }

    async fn admin_revoke_session(&self, session_id: DbId) -> Result<(), ApiError> {
        tracing::info!(session_id, "Revoking user session as admin");
        self.delete(&format!("/api/admin/security/sessions/{session_id}"))
            .await
    }
}
