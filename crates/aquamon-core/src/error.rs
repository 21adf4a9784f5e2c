// ── Core error types ──
//
// Domain-level errors from aquamon-core. The manager never returns these to
// callers of connect/send; they are logged and surfaced as connection
// events. They are returned from the pure helpers (classification,
// configuration) that callers may use directly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Not connected")]
    NotConnected,

    // ── Message errors ───────────────────────────────────────────────
    #[error("Malformed message: {message}")]
    MalformedMessage { message: String },

    #[error("Unknown message type: {message_type}")]
    UnknownMessageType { message_type: String },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for errors caused by a single bad inbound frame.
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::UnknownMessageType { .. } | Self::InvalidField { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<aquamon_api::Error> for CoreError {
    fn from(err: aquamon_api::Error) -> Self {
        match err {
            aquamon_api::Error::InvalidEndpoint { url, reason } => {
                CoreError::ConnectionFailed { url, reason }
            }
            aquamon_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            aquamon_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            aquamon_api::Error::LinkClosed => CoreError::NotConnected,
            aquamon_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedMessage { message }
            }
            aquamon_api::Error::UnknownMessageType(message_type) => {
                CoreError::UnknownMessageType { message_type }
            }
            aquamon_api::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}
