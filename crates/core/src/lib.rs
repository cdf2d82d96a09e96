//! Shared domain types for the Warden security feed.
//!
//! Zero internal dependencies: the REST/WebSocket clients, the feed
//! reconciler, and the monitor binary all build on these definitions.

pub mod activity;
pub mod alert;
pub mod error;
pub mod event;
pub mod roles;
pub mod session;
pub mod types;
