//! REST and WebSocket clients for the security service.
//!
//! Provides the explicit session context, the paginated audit query
//! client, typed push-frame parsing, WebSocket connection management with
//! idempotent teardown, and optional reconnection logic.

pub mod api;
pub mod client;
pub mod events;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod session;
pub mod transport;
