//! Events emitted by the push transport to its consumer.

use std::time::Duration;

use warden_core::event::SecurityEvent;

/// Connection lifecycle and decoded payloads, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The WebSocket connection was established (or re-established).
    Connected,

    /// One decoded security event.
    Event(SecurityEvent),

    /// The WebSocket connection was lost or closed.
    Disconnected,

    /// A reconnection attempt is scheduled after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
}
