//! Feed reconciler for the live security dashboard.
//!
//! Merges the WebSocket push stream with paginated REST loads into one
//! bounded working set, owned by a single actor task. Consumers drive it
//! through a [`FeedHandle`](reconciler::FeedHandle) and observe it through
//! [`FeedSnapshot`](snapshot::FeedSnapshot) values.

pub mod config;
pub mod error;
pub mod reconciler;
pub mod snapshot;
pub mod state;
