//! `warden-monitor` -- headless consumer of the live security feed.
//!
//! Starts a feed reconciler for the configured session and logs every
//! change of the feed as a structured line until Ctrl-C or until the
//! session token is rejected.
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default      | Description                          |
//! |---------------------------|----------|--------------|--------------------------------------|
//! | `WARDEN_API_URL`          | yes      | --           | REST base URL, e.g. `http://host:8081` |
//! | `WARDEN_TOKEN`            | yes      | --           | Bearer token of the signed-in user   |
//! | `WARDEN_ROLE`             | no       | `user`       | `admin` opens the live push channel  |
//! | `WARDEN_USER_ID`          | no       | --           | ID of the signed-in user             |
//! | `WARDEN_PAGE_SIZE`        | no       | `20` / `10`  | Rows per audit-log page              |
//! | `WARDEN_EVENT_FILTER`     | no       | --           | Initial event-type filter            |
//! | `WARDEN_WS_RECONNECT`     | no       | `false`      | Reconnect the push channel on drop   |
//! | `WARDEN_ACTIVE_USER_DAYS` | no       | `7`          | Window of the login-activity chart   |

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_client::api::{AuditQuery, SecurityApi};
use warden_feed::reconciler;
use warden_monitor::config::MonitorConfig;
use warden_monitor::summary::FeedSummary;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warden_monitor=info,warden_feed=info,warden_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env()?;
    let session = config.session_context()?;

    tracing::info!(
        api_url = %session.api_base(),
        role = %session.role(),
        user_id = ?session.user_id(),
        page_size = ?config.page_size,
        filter = ?config.event_filter,
        ws_reconnect = config.ws_reconnect,
        "Starting warden-monitor",
    );

    let api: Arc<dyn AuditQuery> = Arc::new(SecurityApi::new(session.clone()));
    let feed = reconciler::start(api, session, config.feed_config()).await;

    let mut updates = feed.subscribe();
    let mut last: Option<FeedSummary> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    tracing::warn!("Feed reconciler stopped unexpectedly");
                    break;
                }

                let summary = FeedSummary::from(&*updates.borrow_and_update());
                if last.as_ref() != Some(&summary) {
                    summary.log();
                }

                if summary.session_expired {
                    tracing::error!("Session expired; sign in again and restart the monitor");
                    break;
                }
                last = Some(summary);
            }
        }
    }

    if let Err(e) = feed.shutdown().await {
        tracing::debug!(error = %e, "Feed reconciler already stopped");
    }
    tracing::info!("warden-monitor stopped");

    Ok(())
}
