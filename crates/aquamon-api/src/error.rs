use thiserror::Error;

/// Top-level error type for the `aquamon-api` crate.
///
/// Covers the transport (endpoint validation, WebSocket lifecycle) and the
/// wire boundary (envelope decoding). `aquamon-core` maps these into domain
/// diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The endpoint cannot be used to open a transport.
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer with a close frame.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The link's background task is gone; nothing can be sent on it.
    #[error("Transport link is closed")]
    LinkClosed,

    // ── Wire ────────────────────────────────────────────────────────
    /// The inbound payload could not be decoded, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A well-formed envelope carrying a `type` we do not handle.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Outbound serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>, body: &str) -> Self {
        Self::Deserialization {
            message: message.into(),
            body: body.to_owned(),
        }
    }
}
