//! Integration tests for `SecurityApi` against an in-process axum server
//! that mimics the security REST endpoints.

use std::collections::HashMap;

use assert_matches::assert_matches;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use warden_client::api::{ApiError, AuditQuery, EventQuery, SecurityApi};
use warden_client::session::SessionContext;
use warden_core::event::EventType;

const ADMIN_TOKEN: &str = "admin-token";
const USER_TOKEN: &str = "user-token";

// ---------------------------------------------------------------------------
// Fixture server
// ---------------------------------------------------------------------------

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// 401 for unknown tokens, 403 for non-admin tokens on admin routes.
fn authorize(headers: &HeaderMap, admin_only: bool) -> Result<(), Response> {
    match bearer(headers) {
        Some(ADMIN_TOKEN) => Ok(()),
        Some(USER_TOKEN) if !admin_only => Ok(()),
        Some(USER_TOKEN) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Access denied. Your role is 'user'. Admin privileges required."})),
        )
            .into_response()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Could not validate credentials"})),
        )
            .into_response()),
    }
}

/// One event whose metadata echoes the received query string.
fn echo_event(params: HashMap<String, String>) -> Value {
    json!([{
        "id": 1,
        "event_type": "FAILED_LOGIN",
        "created_at": "2026-03-01T10:00:00",
        "event_metadata": params,
    }])
}

async fn admin_events(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&headers, true) {
        return resp;
    }
    Json(echo_event(params)).into_response()
}

async fn own_events(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&headers, false) {
        return resp;
    }
    Json(echo_event(params)).into_response()
}

async fn active_users(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&headers, true) {
        return resp;
    }
    let days: u64 = params.get("days").and_then(|d| d.parse().ok()).unwrap_or(0);
    Json(json!([
        {"user_id": 3, "name": "ola", "email": "ola@example.com",
         "last_seen": "2026-03-01T09:00:00", "last_ip": "192.0.2.1", "total_logins": days}
    ]))
    .into_response()
}

async fn all_sessions(headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&headers, true) {
        return resp;
    }
    Json(json!([
        {"id": 42, "user_id": 3, "user_name": "ola", "device_info": "Safari on iOS",
         "location": "Bergen, NO", "ip_address": "192.0.2.1",
         "last_active": "2026-03-01T09:00:00", "is_active": true},
        {"id": 43, "user_id": 4, "last_active": "2026-03-01T08:00:00Z", "is_active": true}
    ]))
    .into_response()
}

async fn own_sessions(headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&headers, false) {
        return resp;
    }
    Json(json!([
        {"id": 7, "user_id": 4, "device_info": "Chrome on Windows",
         "last_active": "2026-03-01T08:00:00Z", "is_active": true}
    ]))
    .into_response()
}

async fn revoke_own(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(resp) = authorize(&headers, false) {
        return resp;
    }
    if id == 42 {
        Json(json!({"message": "Session revoked"})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Session not found"})),
        )
            .into_response()
    }
}

async fn revoke_any(headers: HeaderMap, Path(_id): Path<i64>) -> Response {
    if let Err(resp) = authorize(&headers, true) {
        return resp;
    }
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/api/admin/security/events", get(admin_events))
        .route("/api/admin/security/active-users", get(active_users))
        .route("/api/admin/security/sessions", get(all_sessions))
        .route("/api/admin/security/sessions/{id}", delete(revoke_any))
        .route("/api/users/me/security-events", get(own_events))
        .route("/api/users/me/sessions", get(own_sessions))
        .route("/api/users/me/sessions/{id}", delete(revoke_own));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

async fn api_with(token: &str, role: &str) -> SecurityApi {
    let url = spawn_server().await;
    SecurityApi::new(SessionContext::new(&url, token, role).unwrap())
}

// ---------------------------------------------------------------------------
// Test: event queries send paging, filter and bearer token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_query_sends_paging_and_filter() {
    let api = api_with(ADMIN_TOKEN, "admin").await;

    let query = EventQuery::page(2, 20, Some(EventType::FailedLogin)).for_user(9);
    let events = api.events(&query).await.unwrap();

    assert_eq!(events.len(), 1);
    let echoed = &events[0];
    assert_eq!(echoed.metadata_str("skip"), Some("40"));
    assert_eq!(echoed.metadata_str("limit"), Some("20"));
    assert_eq!(echoed.metadata_str("event_type"), Some("FAILED_LOGIN"));
    assert_eq!(echoed.metadata_str("user_id"), Some("9"));
}

#[tokio::test]
async fn unfiltered_query_omits_event_type() {
    let api = api_with(ADMIN_TOKEN, "admin").await;

    let events = api.events(&EventQuery::page(0, 10, None)).await.unwrap();

    assert_eq!(events[0].metadata_str("skip"), Some("0"));
    assert!(events[0].event_metadata.get("event_type").is_none());
}

#[tokio::test]
async fn own_events_never_send_user_filter() {
    let api = api_with(USER_TOKEN, "user").await;

    let query = EventQuery::page(1, 10, Some(EventType::ActiveSession)).for_user(99);
    let events = api.own_events(&query).await.unwrap();

    assert_eq!(events[0].metadata_str("skip"), Some("10"));
    assert_eq!(events[0].metadata_str("event_type"), Some("ACTIVE_SESSION"));
    assert!(events[0].event_metadata.get("user_id").is_none());
}

// ---------------------------------------------------------------------------
// Test: chart data and session listings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn active_users_passes_window() {
    let api = api_with(ADMIN_TOKEN, "admin").await;

    let rows = api.active_users(7).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "ola");
    assert_eq!(rows[0].total_logins, 7);
}

#[tokio::test]
async fn session_listings_deserialize() {
    let api = api_with(ADMIN_TOKEN, "admin").await;

    let all = api.all_sessions().await.unwrap();
    assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![42, 43]);
    assert_eq!(all[0].user_name.as_deref(), Some("ola"));

    let mine = api.own_sessions().await.unwrap();
    assert_eq!(mine[0].device_info.as_deref(), Some("Chrome on Windows"));
}

// ---------------------------------------------------------------------------
// Test: revocation outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn revoke_own_session_succeeds() {
    let api = api_with(USER_TOKEN, "user").await;

    api.revoke_session(42).await.unwrap();
}

#[tokio::test]
async fn revoke_unknown_session_carries_detail() {
    let api = api_with(USER_TOKEN, "user").await;

    let err = api.revoke_session(41).await.unwrap_err();

    assert_matches!(err, ApiError::Status { status: 404, .. });
    assert_eq!(err.detail(), Some("Session not found"));
}

#[tokio::test]
async fn admin_revoke_server_error_keeps_raw_body() {
    let api = api_with(ADMIN_TOKEN, "admin").await;

    let err = api.admin_revoke_session(42).await.unwrap_err();

    assert_matches!(err, ApiError::Status { status: 500, ref body, detail: None } if body == "boom");
}

// ---------------------------------------------------------------------------
// Test: 401 / 403 classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let api = api_with("expired", "admin").await;

    let err = api.own_sessions().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.detail(), Some("Could not validate credentials"));
}

#[tokio::test]
async fn non_admin_on_admin_route_is_forbidden() {
    let api = api_with(USER_TOKEN, "user").await;

    let err = api.all_sessions().await.unwrap_err();

    assert_matches!(err, ApiError::Forbidden { .. });
    assert!(!err.is_unauthorized());
}
