//! The feed's working set and its update rules.
//!
//! [`FeedState`] is plain data with synchronous transitions; the
//! reconciler actor is its only writer. Every rule about what a push, a
//! page load or a revocation does to the lists lives here.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use warden_client::api::ApiError;
use warden_core::activity::ActiveUserStat;
use warden_core::alert::ALERT_CAPACITY;
use warden_core::event::{EventType, SecurityEvent};
use warden_core::session::Session;
use warden_core::types::DbId;

use crate::snapshot::FeedSnapshot;

/// Shown when a page load fails without a server-provided reason.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load audit logs.";

/// Shown when a load fails because the session token was rejected.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// Load state of one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadPhase {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl LoadPhase {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadPhase::Loading)
    }

    fn failed(err: &ApiError) -> Self {
        let message = if err.is_unauthorized() {
            SESSION_EXPIRED_MESSAGE
        } else {
            err.detail().unwrap_or(LOAD_FAILED_MESSAGE)
        };
        LoadPhase::Failed(message.to_string())
    }
}

/// One issued page load. Only the completion carrying the latest `seq`
/// is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub seq: u64,
    pub page: u32,
    pub filter: Option<EventType>,
    pub limit: u32,
}

/// What a page-load completion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result replaced `logs`.
    Applied,
    /// A newer request was issued meanwhile; nothing changed.
    Superseded,
    /// The load failed and the phase records why.
    Failed,
    /// The server rejected the session token.
    Expired,
}

/// Where a push ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOutcome {
    pub alerted: bool,
    pub logged: bool,
}

/// The reconciler's authoritative working set.
#[derive(Debug)]
pub struct FeedState {
    is_admin: bool,
    alerts: VecDeque<SecurityEvent>,
    logs: VecDeque<SecurityEvent>,
    my_sessions: Vec<Session>,
    active_users: Vec<ActiveUserStat>,
    filter: Option<EventType>,
    page: u32,
    limit: u32,
    logs_phase: LoadPhase,
    alerts_phase: LoadPhase,
    sessions_phase: LoadPhase,
    latest_seq: u64,
    /// The source returned more rows than `logs` holds.
    logs_truncated: bool,
    alerts_seq: u64,
    /// Alert pushes seen while a bootstrap is in flight, newest first.
    pushed_alerts: Vec<SecurityEvent>,
    live: bool,
    reconnect_attempt: Option<u32>,
    session_expired: bool,
}

impl FeedState {
    pub fn new(is_admin: bool, limit: u32, filter: Option<EventType>) -> Self {
        Self {
            is_admin,
            alerts: VecDeque::with_capacity(ALERT_CAPACITY + 1),
            logs: VecDeque::new(),
            my_sessions: Vec::new(),
            active_users: Vec::new(),
            filter,
            page: 0,
            limit: limit.max(1),
            logs_phase: LoadPhase::Idle,
            alerts_phase: LoadPhase::Idle,
            sessions_phase: LoadPhase::Idle,
            latest_seq: 0,
            logs_truncated: false,
            alerts_seq: 0,
            pushed_alerts: Vec::new(),
            live: false,
            reconnect_attempt: None,
            session_expired: false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn filter(&self) -> Option<EventType> {
        self.filter
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn logs(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.logs.iter()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.alerts.iter()
    }

    pub fn my_sessions(&self) -> &[Session] {
        &self.my_sessions
    }

    pub fn logs_phase(&self) -> &LoadPhase {
        &self.logs_phase
    }

    pub fn session_expired(&self) -> bool {
        self.session_expired
    }

    // ---- pushes ----

    /// Merge one pushed event.
    ///
    /// Alert types always go to the head of `alerts`. The event goes to the
    /// head of `logs` unless a filter is set and the type differs. Both
    /// lists are then cut back to their bounds from the tail. Pushes are
    /// never re-sorted; page 2+ views grow at the head like page 0.
    pub fn apply_push(&mut self, event: SecurityEvent) -> PushOutcome {
        let alerted = event.is_alert();
        let logged = self.filter.map_or(true, |filter| filter == event.event_type);

        if let Some(head) = self.logs.front() {
            if logged && event.created_at < head.created_at {
                tracing::debug!(
                    event_id = event.id,
                    head_id = head.id,
                    "Pushed event is older than the current head",
                );
            }
        }

        match (alerted, logged) {
            (true, true) => {
                self.push_alert(event.clone());
                self.push_log(event);
            }
            (true, false) => self.push_alert(event),
            (false, true) => self.push_log(event),
            (false, false) => {}
        }

        PushOutcome { alerted, logged }
    }

    fn push_alert(&mut self, event: SecurityEvent) {
        if self.alerts_phase.is_loading() {
            self.pushed_alerts.insert(0, event.clone());
            self.pushed_alerts.truncate(ALERT_CAPACITY);
        }
        self.alerts.push_front(event);
        self.alerts.truncate(ALERT_CAPACITY);
    }

    fn push_log(&mut self, event: SecurityEvent) {
        self.logs.push_front(event);
        self.logs.truncate(self.limit as usize);
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
        self.reconnect_attempt = None;
    }

    /// The push channel dropped and reconnection attempt `attempt` is
    /// pending.
    pub fn set_reconnecting(&mut self, attempt: u32) {
        self.live = false;
        self.reconnect_attempt = Some(attempt);
    }

    // ---- page loads ----

    /// Issue a load of the current page and filter.
    pub fn begin_load(&mut self) -> PageRequest {
        self.latest_seq += 1;
        self.logs_phase = LoadPhase::Loading;
        PageRequest {
            seq: self.latest_seq,
            page: self.page,
            filter: self.filter,
            limit: self.limit,
        }
    }

    /// Change the filter; always returns to page 0.
    pub fn set_filter(&mut self, filter: Option<EventType>) -> PageRequest {
        self.filter = filter;
        self.page = 0;
        self.begin_load()
    }

    pub fn set_page(&mut self, page: u32) -> PageRequest {
        self.page = page;
        self.begin_load()
    }

    /// Advance one page, if the current page was full.
    pub fn next_page(&mut self) -> Option<PageRequest> {
        let next = self.page.checked_add(1).filter(|_| self.can_go_next())?;
        Some(self.set_page(next))
    }

    /// Go back one page; a no-op on page 0.
    pub fn prev_page(&mut self) -> Option<PageRequest> {
        self.can_go_prev().then(|| self.set_page(self.page - 1))
    }

    /// A full page may have a successor. The session listing is a single
    /// unpaginated page.
    pub fn can_go_next(&self) -> bool {
        self.page < u32::MAX && self.logs.len() >= self.limit as usize && !self.showing_sessions()
    }

    pub fn can_go_prev(&self) -> bool {
        self.page > 0
    }

    /// Whether `logs` holds projected sessions rather than events.
    ///
    /// The session listing is fetched whole but cut to `limit` like any
    /// other page, and has no second page. Sessions past the cut are not
    /// reachable from this view; `logs_truncated` reports when that
    /// happened.
    pub fn showing_sessions(&self) -> bool {
        self.filter == Some(EventType::ActiveUserSession)
    }

    /// Apply a page-load completion.
    ///
    /// Results of superseded requests are dropped. A 401 marks the session
    /// expired even when the request was superseded.
    pub fn finish_load(
        &mut self,
        seq: u64,
        result: Result<Vec<SecurityEvent>, ApiError>,
    ) -> LoadOutcome {
        let current = seq == self.latest_seq;

        match result {
            Ok(events) if current => {
                self.logs_truncated = events.len() > self.limit as usize;
                if self.logs_truncated {
                    tracing::debug!(
                        rows = events.len(),
                        limit = self.limit,
                        "Page result cut to the page size",
                    );
                }
                self.logs = events.into_iter().take(self.limit as usize).collect();
                self.logs_phase = LoadPhase::Ready;
                LoadOutcome::Applied
            }
            Ok(_) => LoadOutcome::Superseded,
            Err(err) => {
                if current {
                    self.logs_phase = LoadPhase::failed(&err);
                }
                if err.is_unauthorized() {
                    self.session_expired = true;
                    LoadOutcome::Expired
                } else if current {
                    LoadOutcome::Failed
                } else {
                    LoadOutcome::Superseded
                }
            }
        }
    }

    // ---- side panels ----

    /// Start an alert bootstrap and return its sequence number.
    pub fn begin_alerts_load(&mut self) -> u64 {
        self.alerts_seq += 1;
        self.pushed_alerts.clear();
        self.alerts_phase = LoadPhase::Loading;
        self.alerts_seq
    }

    /// Rebuild `alerts` from a bootstrap result.
    ///
    /// Alerts pushed since the bootstrap began are merged with the queried
    /// batches, duplicates by ID collapse to one entry, and the newest
    /// [`ALERT_CAPACITY`] are kept. Returns `false` and changes nothing
    /// when a newer bootstrap has been issued.
    pub fn set_alerts(
        &mut self,
        seq: u64,
        batches: impl IntoIterator<Item = Vec<SecurityEvent>>,
    ) -> bool {
        if seq != self.alerts_seq {
            return false;
        }

        let mut seen = HashSet::new();
        let mut merged: Vec<SecurityEvent> = std::mem::take(&mut self.pushed_alerts)
            .into_iter()
            .chain(batches.into_iter().flatten())
            .filter(|e| seen.insert(e.id))
            .collect();
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        merged.truncate(ALERT_CAPACITY);

        self.alerts = merged.into();
        self.alerts_phase = LoadPhase::Ready;
        true
    }

    /// Record a failed alert bootstrap. The current alerts stay, and a 401
    /// expires the session even when the bootstrap was superseded.
    pub fn alerts_failed(&mut self, seq: u64, err: &ApiError) -> bool {
        self.note_unauthorized(err);
        if seq != self.alerts_seq {
            return false;
        }
        self.pushed_alerts.clear();
        self.alerts_phase = LoadPhase::failed(err);
        true
    }

    pub fn set_active_users(&mut self, rows: Vec<ActiveUserStat>) {
        self.active_users = rows;
    }

    pub fn begin_sessions_load(&mut self) {
        self.sessions_phase = LoadPhase::Loading;
    }

    pub fn set_my_sessions(&mut self, sessions: Vec<Session>) {
        self.my_sessions = sessions;
        self.sessions_phase = LoadPhase::Ready;
    }

    pub fn sessions_failed(&mut self, err: &ApiError) {
        self.sessions_phase = LoadPhase::failed(err);
        self.note_unauthorized(err);
    }

    /// Mark the session expired if `err` is a 401. Returns whether it was.
    pub fn note_unauthorized(&mut self, err: &ApiError) -> bool {
        if err.is_unauthorized() {
            self.session_expired = true;
        }
        err.is_unauthorized()
    }

    // ---- revocation ----

    /// Drop a revoked session from the personal list.
    pub fn remove_own_session(&mut self, session_id: DbId) -> bool {
        let before = self.my_sessions.len();
        self.my_sessions.retain(|s| s.id != session_id);
        self.my_sessions.len() != before
    }

    /// Drop a revoked session projection from `logs`. Events sharing the
    /// numeric ID are left alone.
    pub fn remove_session_entry(&mut self, session_id: DbId) -> bool {
        let before = self.logs.len();
        self.logs.retain(|e| !(e.is_session && e.id == session_id));
        self.logs.len() != before
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            is_admin: self.is_admin,
            alerts: self.alerts.iter().cloned().collect(),
            logs: self.logs.iter().cloned().collect(),
            my_sessions: self.my_sessions.clone(),
            active_users: self.active_users.clone(),
            filter: self.filter,
            page: self.page,
            limit: self.limit,
            logs_phase: self.logs_phase.clone(),
            logs_truncated: self.logs_truncated,
            alerts_phase: self.alerts_phase.clone(),
            sessions_phase: self.sessions_phase.clone(),
            can_go_next: self.can_go_next(),
            can_go_prev: self.can_go_prev(),
            live: self.live,
            reconnect_attempt: self.reconnect_attempt,
            session_expired: self.session_expired,
        }
    }
}
