//! The reconciler actor and its command handle.
//!
//! One task owns [`FeedState`] and serializes every writer: user commands
//! from [`FeedHandle`], pushes from the transport, and completions of the
//! REST calls it spawns. Network calls never run on the actor itself, so
//! pushes keep flowing while a page load is in flight.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use warden_client::api::{ApiError, AuditQuery, EventQuery};
use warden_client::events::TransportEvent;
use warden_client::session::SessionContext;
use warden_client::transport::EventTransport;
use warden_core::activity::ActiveUserStat;
use warden_core::alert::ALERT_CAPACITY;
use warden_core::event::{EventType, SecurityEvent};
use warden_core::session::Session;
use warden_core::types::DbId;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::snapshot::FeedSnapshot;
use crate::state::{FeedState, LoadOutcome, PageRequest};

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Which revocation endpoint a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevokeScope {
    Own,
    Any,
}

enum FeedCommand {
    SetFilter(Option<EventType>),
    SetPage(u32),
    NextPage,
    PrevPage,
    Refresh,
    Revoke {
        scope: RevokeScope,
        session_id: DbId,
        reply: oneshot::Sender<Result<(), FeedError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results of spawned REST calls, reported back to the actor.
enum Completion {
    Page {
        seq: u64,
        result: Result<Vec<SecurityEvent>, ApiError>,
    },
    Alerts {
        seq: u64,
        result: Result<[Vec<SecurityEvent>; 2], ApiError>,
    },
    ActiveUsers(Result<Vec<ActiveUserStat>, ApiError>),
    OwnSessions(Result<Vec<Session>, ApiError>),
    Revoke {
        scope: RevokeScope,
        session_id: DbId,
        result: Result<(), ApiError>,
        reply: oneshot::Sender<Result<(), FeedError>>,
    },
}

/// Cloneable handle to a running reconciler.
///
/// The actor stops (closing its push channel) when [`FeedHandle::shutdown`]
/// is called or when every handle has been dropped.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    snapshot: watch::Receiver<FeedSnapshot>,
}

impl FeedHandle {
    /// Change the filter and reload from page 0.
    pub async fn set_filter(&self, filter: Option<EventType>) -> Result<(), FeedError> {
        self.send(FeedCommand::SetFilter(filter)).await
    }

    pub async fn set_page(&self, page: u32) -> Result<(), FeedError> {
        self.send(FeedCommand::SetPage(page)).await
    }

    /// Advance one page; ignored when the current page is not full.
    pub async fn next_page(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::NextPage).await
    }

    /// Go back one page; ignored on page 0.
    pub async fn prev_page(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::PrevPage).await
    }

    /// Reload the current page and the side panels.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::Refresh).await
    }

    /// Revoke one of the caller's own sessions.
    ///
    /// Resolves after the snapshot reflects the removal. On failure the
    /// feed is unchanged.
    pub async fn revoke_session(&self, session_id: DbId) -> Result<(), FeedError> {
        self.revoke(RevokeScope::Own, session_id).await
    }

    /// Revoke any user's session (admin only).
    pub async fn admin_revoke_session(&self, session_id: DbId) -> Result<(), FeedError> {
        self.revoke(RevokeScope::Any, session_id).await
    }

    /// The latest published state.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the actor and wait until the push channel is closed.
    pub async fn shutdown(&self) -> Result<(), FeedError> {
        let (reply, done) = oneshot::channel();
        self.send(FeedCommand::Shutdown { reply }).await?;
        done.await.map_err(|_| FeedError::Closed)
    }

    async fn revoke(&self, scope: RevokeScope, session_id: DbId) -> Result<(), FeedError> {
        let (reply, result) = oneshot::channel();
        self.send(FeedCommand::Revoke {
            scope,
            session_id,
            reply,
        })
        .await?;
        result.await.map_err(|_| FeedError::Closed)?
    }

    async fn send(&self, command: FeedCommand) -> Result<(), FeedError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FeedError::Closed)
    }
}

/// Start a reconciler for `session`.
///
/// Admin sessions open the push channel first; if that fails the feed
/// still runs, push-silent, on REST data alone.
pub async fn start(
    api: Arc<dyn AuditQuery>,
    session: SessionContext,
    config: FeedConfig,
) -> FeedHandle {
    let (transport, push_rx) = if session.is_admin() {
        match EventTransport::open(&session, config.transport.clone()).await {
            Ok((transport, rx)) => {
                tracing::info!(ws_url = %transport.ws_url(), "Security event feed opened");
                (Some(transport), Some(rx))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Security event feed unavailable, continuing without live updates");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    spawn_actor(api, session, config, transport, push_rx)
}

/// Start a reconciler fed by an externally managed push stream.
pub fn start_with_push(
    api: Arc<dyn AuditQuery>,
    session: SessionContext,
    config: FeedConfig,
    push_rx: mpsc::Receiver<TransportEvent>,
) -> FeedHandle {
    spawn_actor(api, session, config, None, Some(push_rx))
}

fn spawn_actor(
    api: Arc<dyn AuditQuery>,
    session: SessionContext,
    config: FeedConfig,
    transport: Option<EventTransport>,
    push_rx: Option<mpsc::Receiver<TransportEvent>>,
) -> FeedHandle {
    let state = FeedState::new(
        session.is_admin(),
        config.limit_for(&session),
        config.initial_filter,
    );
    let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let actor = FeedActor {
        api,
        session,
        activity_days: config.activity_days,
        state,
        snapshot_tx,
        commands: command_rx,
        completion_tx,
        completions: completion_rx,
        transport,
        push_rx,
    };
    tokio::spawn(actor.run());

    FeedHandle {
        commands: command_tx,
        snapshot: snapshot_rx,
    }
}

struct FeedActor {
    api: Arc<dyn AuditQuery>,
    session: SessionContext,
    activity_days: u32,
    state: FeedState,
    snapshot_tx: watch::Sender<FeedSnapshot>,
    commands: mpsc::Receiver<FeedCommand>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    transport: Option<EventTransport>,
    push_rx: Option<mpsc::Receiver<TransportEvent>>,
}

impl FeedActor {
    async fn run(mut self) {
        tracing::info!(
            role = %self.session.role(),
            user_id = ?self.session.user_id(),
            limit = self.state.limit(),
            filter = ?self.state.filter(),
            "Feed reconciler started",
        );

        let request = self.state.begin_load();
        self.spawn_page_load(request);
        self.load_side_panels();
        self.publish();

        let shutdown_reply = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(FeedCommand::Shutdown { reply }) => break Some(reply),
                    Some(command) => self.handle_command(command),
                    None => break None,
                },
                Some(done) = self.completions.recv() => self.handle_completion(done).await,
                push = next_push(&mut self.push_rx) => self.handle_push(push),
            }
            self.publish();
        };

        self.commands.close();
        self.close_transport().await;
        self.publish();
        tracing::info!("Feed reconciler stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn publish(&self) {
        let next = self.state.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    // ---- commands ----

    fn handle_command(&mut self, command: FeedCommand) {
        let request = match command {
            FeedCommand::Revoke {
                scope,
                session_id,
                reply,
            } => {
                self.spawn_revoke(scope, session_id, reply);
                return;
            }
            _ if self.state.session_expired() => {
                tracing::debug!("Ignoring feed command after session expiry");
                return;
            }
            FeedCommand::SetFilter(filter) => Some(self.state.set_filter(filter)),
            FeedCommand::SetPage(page) => Some(self.state.set_page(page)),
            FeedCommand::NextPage => self.state.next_page(),
            FeedCommand::PrevPage => self.state.prev_page(),
            FeedCommand::Refresh => {
                self.load_side_panels();
                Some(self.state.begin_load())
            }
            FeedCommand::Shutdown { .. } => None,
        };

        match request {
            Some(request) => self.spawn_page_load(request),
            None => tracing::debug!(page = self.state.page(), "Page change not allowed"),
        }
    }

    fn spawn_page_load(&self, request: PageRequest) {
        tracing::debug!(
            seq = request.seq,
            page = request.page,
            filter = ?request.filter,
            limit = request.limit,
            "Loading audit log page",
        );

        let api = Arc::clone(&self.api);
        let is_admin = self.session.is_admin();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = fetch_page(api.as_ref(), is_admin, &request).await;
            let _ = tx.send(Completion::Page {
                seq: request.seq,
                result,
            });
        });
    }

    /// Alerts and the activity chart for admins, own sessions otherwise.
    fn load_side_panels(&mut self) {
        let api = Arc::clone(&self.api);
        let tx = self.completion_tx.clone();

        if !self.session.is_admin() {
            self.state.begin_sessions_load();
            tokio::spawn(async move {
                let result = api.own_sessions().await;
                let _ = tx.send(Completion::OwnSessions(result));
            });
            return;
        }

        let seq = self.state.begin_alerts_load();
        let days = self.activity_days;
        tokio::spawn(async move {
            let suspicious = EventQuery::page(0, ALERT_CAPACITY as u32, Some(EventType::SuspiciousActivity));
            let locked = EventQuery::page(0, ALERT_CAPACITY as u32, Some(EventType::AccountLocked));
            let alerts = tokio::try_join!(api.events(&suspicious), api.events(&locked))
                .map(|(suspicious, locked)| [suspicious, locked]);
            let _ = tx.send(Completion::Alerts { seq, result: alerts });

            let _ = tx.send(Completion::ActiveUsers(api.active_users(days).await));
        });
    }

    fn spawn_revoke(
        &self,
        scope: RevokeScope,
        session_id: DbId,
        reply: oneshot::Sender<Result<(), FeedError>>,
    ) {
        if self.state.session_expired() {
            let _ = reply.send(Err(FeedError::SessionExpired));
            return;
        }
        if scope == RevokeScope::Any && !self.session.is_admin() {
            let _ = reply.send(Err(FeedError::NotPrivileged {
                role: self.session.role().to_string(),
            }));
            return;
        }

        let api = Arc::clone(&self.api);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = match scope {
                RevokeScope::Own => api.revoke_session(session_id).await,
                RevokeScope::Any => api.admin_revoke_session(session_id).await,
            };
            let _ = tx.send(Completion::Revoke {
                scope,
                session_id,
                result,
                reply,
            });
        });
    }

    // ---- completions ----

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Page { seq, result } => match self.state.finish_load(seq, result) {
                LoadOutcome::Applied => tracing::debug!(seq, "Audit log page applied"),
                LoadOutcome::Superseded => tracing::debug!(seq, "Discarding superseded page load"),
                LoadOutcome::Failed => {
                    tracing::warn!(seq, phase = ?self.state.logs_phase(), "Audit log load failed")
                }
                LoadOutcome::Expired => self.expire_session().await,
            },
            Completion::Alerts { seq, result: Ok(batches) } => {
                if !self.state.set_alerts(seq, batches) {
                    tracing::debug!(seq, "Discarding superseded alert bootstrap");
                }
            }
            Completion::Alerts { seq, result: Err(e) } => {
                if self.state.alerts_failed(seq, &e) {
                    tracing::warn!(error = %e, "Failed to load security alerts");
                }
                self.expire_if_needed().await;
            }
            Completion::ActiveUsers(Ok(rows)) => self.state.set_active_users(rows),
            Completion::ActiveUsers(Err(e)) => {
                tracing::warn!(error = %e, "Failed to load login activity");
                self.state.note_unauthorized(&e);
                self.expire_if_needed().await;
            }
            Completion::OwnSessions(Ok(sessions)) => self.state.set_my_sessions(sessions),
            Completion::OwnSessions(Err(e)) => {
                tracing::warn!(error = %e, "Failed to load sessions");
                self.state.sessions_failed(&e);
                self.expire_if_needed().await;
            }
            Completion::Revoke {
                scope,
                session_id,
                result,
                reply,
            } => {
                let outcome = self.finish_revoke(scope, session_id, result).await;
                // The caller should observe the removal once its call resolves.
                self.publish();
                let _ = reply.send(outcome);
            }
        }
    }

    async fn finish_revoke(
        &mut self,
        scope: RevokeScope,
        session_id: DbId,
        result: Result<(), ApiError>,
    ) -> Result<(), FeedError> {
        match result {
            Ok(()) => {
                let removed = match scope {
                    RevokeScope::Own => self.state.remove_own_session(session_id),
                    RevokeScope::Any => self.state.remove_session_entry(session_id),
                };
                tracing::info!(session_id, ?scope, removed, "Session revoked");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id, ?scope, error = %e, "Session revocation failed");
                self.state.note_unauthorized(&e);
                self.expire_if_needed().await;
                Err(FeedError::Revoke {
                    session_id,
                    source: e,
                })
            }
        }
    }

    // ---- pushes ----

    fn handle_push(&mut self, push: Option<TransportEvent>) {
        match push {
            Some(TransportEvent::Connected) => {
                tracing::info!("Live security feed connected");
                self.state.set_live(true);
            }
            Some(TransportEvent::Disconnected) => {
                tracing::warn!("Live security feed disconnected");
                self.state.set_live(false);
            }
            Some(TransportEvent::Reconnecting { attempt, delay }) => {
                tracing::info!(attempt, ?delay, "Live security feed reconnecting");
                self.state.set_reconnecting(attempt);
            }
            Some(TransportEvent::Event(event)) => {
                let event_id = event.id;
                let event_type = event.event_type;
                let outcome = self.state.apply_push(event);
                tracing::debug!(
                    event_id,
                    %event_type,
                    alerted = outcome.alerted,
                    logged = outcome.logged,
                    "Merged pushed event",
                );
            }
            None => {
                tracing::debug!("Push stream ended");
                self.push_rx = None;
                self.state.set_live(false);
            }
        }
    }

    // ---- session lifecycle ----

    async fn expire_if_needed(&mut self) {
        if self.state.session_expired() {
            self.expire_session().await;
        }
    }

    async fn expire_session(&mut self) {
        tracing::warn!("Session token rejected; closing live feed");
        self.close_transport().await;
    }

    async fn close_transport(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close().await;
        }
        self.transport = None;
        self.push_rx = None;
        self.state.set_live(false);
    }
}

/// Receive from the push stream, or wait forever when there is none.
async fn next_push(rx: &mut Option<mpsc::Receiver<TransportEvent>>) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Pick the source for a page: the session listing for the admin
/// session view, the organisation feed for other admin views, and the
/// caller's own events otherwise.
async fn fetch_page(
    api: &dyn AuditQuery,
    is_admin: bool,
    request: &PageRequest,
) -> Result<Vec<SecurityEvent>, ApiError> {
    if is_admin && request.filter == Some(EventType::ActiveUserSession) {
        let sessions = api.all_sessions().await?;
        return Ok(sessions.into_iter().map(SecurityEvent::from).collect());
    }

    let query = EventQuery::page(request.page, request.limit, request.filter);
    if is_admin {
        api.events(&query).await
    } else {
        api.own_events(&query).await
    }
}
