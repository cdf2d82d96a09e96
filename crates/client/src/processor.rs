//! WebSocket frame processing loop.
//!
//! Reads raw frames from the push channel, parses text frames into
//! [`SecurityEvent`](warden_core::event::SecurityEvent)s and forwards
//! them to the consumer channel in arrival order.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::WsStream;
use crate::events::TransportEvent;
use crate::messages::parse_frame;

/// Why [`process_frames`] stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoopExit {
    /// The cancellation token fired; the socket was closed by us.
    Cancelled,
    /// The receiving side of the event channel was dropped.
    ConsumerGone,
    /// The server closed the connection or the stream ended.
    RemoteClosed,
    /// A receive error broke the connection.
    Failed,
}

impl FrameLoopExit {
    /// Whether the connection ended from our side.
    pub fn is_local(self) -> bool {
        matches!(self, FrameLoopExit::Cancelled | FrameLoopExit::ConsumerGone)
    }
}

/// Process frames from the push channel until it closes or is cancelled.
///
/// Malformed text frames are logged and dropped; they never end the
/// connection. Binary frames are ignored. When the loop ends from our side
/// a Close frame is sent, so the socket is shut down exactly once.
pub async fn process_frames(
    ws_stream: &mut WsStream,
    event_tx: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
) -> FrameLoopExit {
    let exit = loop {
        let msg_result = tokio::select! {
            _ = cancel.cancelled() => break FrameLoopExit::Cancelled,
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => {
                    tracing::info!("Security feed stream exhausted");
                    break FrameLoopExit::RemoteClosed;
                }
            },
        };

        match msg_result {
            Ok(Message::Text(text)) => {
                if let Some(event) = decode_text_frame(&text) {
                    let delivered = tokio::select! {
                        _ = cancel.cancelled() => break FrameLoopExit::Cancelled,
                        sent = event_tx.send(TransportEvent::Event(event)) => sent.is_ok(),
                    };
                    if !delivered {
                        tracing::debug!("Feed consumer dropped, stopping frame loop");
                        break FrameLoopExit::ConsumerGone;
                    }
                }
            }
            Ok(Message::Binary(data)) => {
                tracing::trace!(len = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Security feed closed by server");
                break FrameLoopExit::RemoteClosed;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "Security feed receive error");
                break FrameLoopExit::Failed;
            }
        }
    };

    if exit.is_local() {
        if let Err(e) = ws_stream.close(None).await {
            tracing::debug!(error = %e, "Close handshake did not complete");
        }
    }

    exit
}

/// Parse one text frame, logging and discarding it on failure.
fn decode_text_frame(text: &str) -> Option<warden_core::event::SecurityEvent> {
    match parse_frame(text) {
        Ok(event) => {
            tracing::debug!(
                event_id = event.id,
                event_type = %event.event_type,
                "Security event received",
            );
            Some(event)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Dropping malformed security event frame",
            );
            None
        }
    }
}
