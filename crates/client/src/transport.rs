//! Owned push-channel connection for one admin session.
//!
//! [`EventTransport`] is the single WebSocket connection of a session. It
//! is acquired with [`EventTransport::open`], which refuses to touch the
//! network for non-privileged roles, and released with
//! [`EventTransport::close`] or by dropping it. Decoded events arrive on
//! the [`mpsc::Receiver`] returned alongside the handle.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, SecurityConnection, SecurityWsClient, CONNECT_TIMEOUT};
use crate::events::TransportEvent;
use crate::processor::process_frames;
use crate::reconnect::{Backoff, ReconnectConfig};
use crate::session::SessionContext;

/// Capacity of the decoded-event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long [`EventTransport::close`] waits for the connection task.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for opening the push channel.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Backoff policy after a dropped connection. `None` leaves the feed
    /// push-silent until the transport is reopened.
    pub reconnect: Option<ReconnectConfig>,
    pub channel_capacity: usize,
    /// Bound on each connection attempt, including reconnects.
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            reconnect: None,
            channel_capacity: EVENT_CHANNEL_CAPACITY,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Handle to the live push channel.
#[derive(Debug)]
pub struct EventTransport {
    ws_url: String,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl EventTransport {
    /// Connect to the push channel of `session`.
    ///
    /// Fails with [`TransportError::NotPrivileged`] for non-admin roles
    /// without opening a socket. The initial connection attempt happens
    /// here so a failure surfaces to the caller; later drops are handled
    /// by the background task according to `options.reconnect`.
    pub async fn open(
        session: &SessionContext,
        options: TransportOptions,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), TransportError> {
        if !session.is_admin() {
            return Err(TransportError::NotPrivileged {
                role: session.role().to_string(),
            });
        }

        let client = SecurityWsClient::new(session.ws_url(), session.token().to_string())
            .with_connect_timeout(options.connect_timeout);
        let conn = client.connect().await?;

        let (event_tx, event_rx) = mpsc::channel(options.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let ws_url = client.ws_url().to_string();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_connection_loop(client, conn, event_tx, options.reconnect, task_cancel).await;
            tracing::debug!("Security feed connection task exited");
        });

        Ok((
            Self {
                ws_url,
                task: Some(task),
                cancel,
            },
            event_rx,
        ))
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Whether the connection task is still running.
    pub fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Close the push channel.
    ///
    /// Idempotent: the first call cancels the connection task (which sends
    /// a Close frame only if the socket is still open) and waits up to five
    /// seconds for it to exit. Returns `false` when already closed.
    pub async fn close(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };

        self.cancel.cancel();
        if tokio::time::timeout(CLOSE_TIMEOUT, task).await.is_err() {
            tracing::warn!(ws_url = %self.ws_url, "Security feed task did not exit in time");
        }

        tracing::info!(ws_url = %self.ws_url, "Security event feed closed");
        true
    }
}

impl Drop for EventTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Core connection loop: process frames -> (optionally) reconnect.
///
/// Runs until the token is cancelled, the consumer goes away, the
/// connection drops with reconnection disabled, or the backoff schedule
/// runs out of attempts.
async fn run_connection_loop(
    client: SecurityWsClient,
    initial: SecurityConnection,
    event_tx: mpsc::Sender<TransportEvent>,
    reconnect: Option<ReconnectConfig>,
    cancel: CancellationToken,
) {
    let mut conn = initial;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = event_tx.send(TransportEvent::Connected) => {
                if sent.is_err() {
                    return;
                }
            }
        }

        let exit = process_frames(&mut conn.ws_stream, &event_tx, &cancel).await;

        if exit.is_local() || cancel.is_cancelled() {
            // The owner may be the one reading the channel; never block it.
            let _ = event_tx.try_send(TransportEvent::Disconnected);
            return;
        }
        let _ = event_tx.send(TransportEvent::Disconnected).await;

        let Some(config) = reconnect.as_ref() else {
            tracing::warn!(
                ws_url = %client.ws_url(),
                ?exit,
                "Security feed lost; live updates paused until the view is reopened",
            );
            return;
        };

        tracing::info!(ws_url = %client.ws_url(), ?exit, "Connection lost, reconnecting");
        match reconnect_with_backoff(&client, config, &event_tx, &cancel).await {
            Some(next) => conn = next,
            None => return,
        }
    }
}

/// Dial until a connection succeeds, reporting every attempt to the
/// consumer before its delay starts.
///
/// Returns `None` when cancelled, when the consumer is gone, or when the
/// schedule is exhausted.
async fn reconnect_with_backoff(
    client: &SecurityWsClient,
    config: &ReconnectConfig,
    event_tx: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
) -> Option<SecurityConnection> {
    let mut backoff = Backoff::new(config);

    while let Some(attempt) = backoff.next_attempt() {
        let notice = TransportEvent::Reconnecting {
            attempt: attempt.number,
            delay: attempt.delay,
        };
        tokio::select! {
            _ = cancel.cancelled() => return None,
            sent = event_tx.send(notice) => {
                if sent.is_err() {
                    return None;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(attempt.delay) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(
                        ws_url = %client.ws_url(),
                        attempt = attempt.number,
                        "Reconnected to security event feed",
                    );
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        ws_url = %client.ws_url(),
                        attempt = attempt.number,
                        error = %e,
                        "Reconnect attempt failed",
                    );
                }
            }
        }
    }

    tracing::error!(
        ws_url = %client.ws_url(),
        max_attempts = ?config.max_attempts,
        "Giving up on security feed",
    );
    None
}

/// Errors from opening the push channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Only the admin role may open the organisation-wide feed.
    #[error("Role '{role}' may not open the security feed")]
    NotPrivileged { role: String },

    /// The initial WebSocket connection failed.
    #[error(transparent)]
    Connect(#[from] ClientError),
}
