//! WebSocket transport for telemetry streams.
//!
//! [`WebSocketTransport`] implements [`Transport`] on top of
//! `tokio-tungstenite`. Each [`open`](Transport::open) validates the endpoint
//! up front, then spawns one task that owns the socket for the lifetime of
//! the link: it connects, forwards inbound text frames as
//! [`TransportEvent::Message`], writes queued outbound frames, and finishes
//! with exactly one [`TransportEvent::Closed`].
//!
//! Reconnection is deliberately *not* handled here. A link is single-use;
//! the connection manager in `aquamon-core` decides when to open another.
//!
//! # Example
//!
//! ```rust,ignore
//! use aquamon_api::{Transport, TransportEvent, WebSocketTransport};
//! use tokio::sync::mpsc;
//! use url::Url;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let link = WebSocketTransport::default().open(&Url::parse("ws://127.0.0.1:8080")?, tx)?;
//!
//! while let Some(event) = rx.recv().await {
//!     if let TransportEvent::Message(text) = event {
//!         println!("{text}");
//!     }
//! }
//! link.close();
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::{Transport, TransportEvent, TransportEvents, TransportLink};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── WebSocketTransport ───────────────────────────────────────────────

/// Opens `ws://` / `wss://` links.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl WebSocketTransport {
    /// `connect_timeout` bounds the TCP connect plus the WebSocket handshake.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, endpoint: &Url, events: TransportEvents) -> Result<TransportLink, Error> {
        let uri = validate_endpoint(endpoint)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::WebSocketConnect(format!("no async runtime: {e}")))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let url = endpoint.clone();
        let timeout = self.connect_timeout;
        runtime.spawn(async move {
            run_link(url, uri, timeout, events, outbound_rx, task_cancel).await;
        });

        Ok(TransportLink::new(outbound_tx, cancel))
    }
}

/// Reject anything that is not an absolute `ws`/`wss` URL with a host.
fn validate_endpoint(endpoint: &Url) -> Result<tungstenite::http::Uri, Error> {
    let invalid = |reason: &str| Error::InvalidEndpoint {
        url: endpoint.to_string(),
        reason: reason.to_owned(),
    };

    if !matches!(endpoint.scheme(), "ws" | "wss") {
        return Err(invalid("scheme must be ws or wss"));
    }
    if endpoint.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    endpoint
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| invalid(&e.to_string()))
}

// ── Link task ────────────────────────────────────────────────────────

/// How a link ended without an error.
struct CloseInfo {
    code: Option<u16>,
    reason: String,
}

impl CloseInfo {
    fn local() -> Self {
        Self {
            code: None,
            reason: "closed locally".into(),
        }
    }
}

/// Drive one link to completion and report exactly one `Closed`.
async fn run_link(
    url: Url,
    uri: tungstenite::http::Uri,
    timeout: Duration,
    events: TransportEvents,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let closed = match connect_and_pump(uri, timeout, &events, outbound_rx, &cancel).await {
        Ok(info) => TransportEvent::Closed {
            code: info.code,
            reason: info.reason,
        },
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "WebSocket link failed");
            let reason = e.to_string();
            // Receiver may already be gone; nothing else to do then.
            let _ = events.send(TransportEvent::Error(reason.clone()));
            TransportEvent::Closed { code: None, reason }
        }
    };

    let _ = events.send(closed);
    tracing::debug!(url = %url, "WebSocket link task exiting");
}

async fn connect_and_pump(
    uri: tungstenite::http::Uri,
    timeout: Duration,
    events: &TransportEvents,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<CloseInfo, Error> {
    let request = ClientRequestBuilder::new(uri);

    let ws_stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(CloseInfo::local()),
        result = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request)) => {
            let (stream, _response) = result
                .map_err(|_| Error::WebSocketConnect(format!("handshake timed out after {timeout:?}")))?
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            stream
        }
    };

    tracing::info!("WebSocket connected");
    let _ = events.send(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(CloseInfo::local());
            }
            Some(text) = outbound_rx.recv() => {
                tracing::trace!(bytes = text.len(), "WebSocket send");
                write
                    .send(tungstenite::Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong itself
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let info = frame.map_or_else(
                            || CloseInfo { code: None, reason: String::new() },
                            |cf| CloseInfo {
                                code: Some(u16::from(cf.code)),
                                reason: cf.reason.as_str().to_owned(),
                            },
                        );
                        tracing::info!(code = ?info.code, reason = %info.reason, "WebSocket close frame received");
                        return Ok(info);
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(CloseInfo { code: None, reason: "stream ended".into() });
                    }
                    _ => {
                        // Binary, Pong, Frame -- not part of the telemetry protocol
                    }
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
