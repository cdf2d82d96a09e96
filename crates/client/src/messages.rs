//! Push-channel frame parser.
//!
//! Every server-to-client text frame is exactly one JSON-encoded
//! [`SecurityEvent`]. No envelope, no client-to-server messages.

use warden_core::event::SecurityEvent;

/// Parse a push-channel text frame into a typed event.
///
/// Returns `Err` for malformed JSON, missing fields, or unknown
/// `event_type` values. Callers should log and drop the frame.
pub fn parse_frame(text: &str) -> Result<SecurityEvent, serde_json::Error> {
    serde_json::from_str(text)
}
