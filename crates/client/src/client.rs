//! WebSocket client for the admin security push channel.
//!
//! [`SecurityWsClient`] holds the connection configuration. Call
//! [`SecurityWsClient::connect`] to establish a live
//! [`SecurityConnection`].

use std::time::Duration;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Raw WebSocket stream type used by the push channel.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Upper bound on one connection attempt, TCP connect plus upgrade.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration handle for the push channel of one session.
pub struct SecurityWsClient {
    ws_url: String,
    token: String,
    connect_timeout: Duration,
}

/// A live WebSocket connection to the push channel.
pub struct SecurityConnection {
    /// The URL that was connected to.
    pub ws_url: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl SecurityWsClient {
    /// * `ws_url` - full push-channel URL, e.g. `ws://host:8081/api/admin/security/ws`.
    /// * `token`  - bearer token sent on the upgrade request.
    pub fn new(ws_url: String, token: String) -> Self {
        Self {
            ws_url,
            token,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the push channel.
    ///
    /// The bearer token travels in the `Authorization` header of the
    /// upgrade request. A peer that accepts the socket but never finishes
    /// the handshake fails with [`ClientError::Timeout`].
    pub async fn connect(&self) -> Result<SecurityConnection, ClientError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::InvalidRequest(format!("{}: {e}", self.ws_url)))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid bearer token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| ClientError::Timeout {
                ws_url: self.ws_url.clone(),
                after: self.connect_timeout,
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "Failed to connect to security feed at {}: {e}",
                    self.ws_url
                ))
            })?;

        tracing::info!(ws_url = %self.ws_url, "Connected to security event feed");

        Ok(SecurityConnection {
            ws_url: self.ws_url.clone(),
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The upgrade request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out after {after:?} connecting to {ws_url}")]
    Timeout { ws_url: String, after: Duration },
}
