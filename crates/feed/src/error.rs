use warden_client::api::ApiError;
use warden_core::types::DbId;

/// Errors surfaced to callers of the feed handle.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Revocation was rejected; the feed state is unchanged.
    #[error("Failed to revoke session {session_id}: {source}")]
    Revoke {
        session_id: DbId,
        #[source]
        source: ApiError,
    },

    /// The operation needs the admin role.
    #[error("Role '{role}' may not perform this operation")]
    NotPrivileged { role: String },

    /// A previous request was rejected with 401; the caller must log in again.
    #[error("Session expired")]
    SessionExpired,

    /// The reconciler task has stopped.
    #[error("Feed reconciler is not running")]
    Closed,
}
