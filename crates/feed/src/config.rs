//! Reconciler settings.

use warden_client::session::SessionContext;
use warden_client::transport::TransportOptions;
use warden_core::activity::DEFAULT_ACTIVITY_DAYS;
use warden_core::event::EventType;

/// Page size of the organisation-wide admin view.
pub const ADMIN_PAGE_SIZE: u32 = 20;

/// Page size of the personal view.
pub const USER_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Overrides the role default when set.
    pub page_size: Option<u32>,
    /// Filter applied to the first load.
    pub initial_filter: Option<EventType>,
    /// Trailing window of the login-activity chart.
    pub activity_days: u32,
    pub transport: TransportOptions,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            initial_filter: None,
            activity_days: DEFAULT_ACTIVITY_DAYS,
            transport: TransportOptions::default(),
        }
    }
}

impl FeedConfig {
    /// Effective page size for `session`. Never zero.
    pub fn limit_for(&self, session: &SessionContext) -> u32 {
        let default = if session.is_admin() {
            ADMIN_PAGE_SIZE
        } else {
            USER_PAGE_SIZE
        };
        self.page_size.unwrap_or(default).max(1)
    }
}
