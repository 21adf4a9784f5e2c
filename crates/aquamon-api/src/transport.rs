// Transport seam between the connection manager and the wire.
//
// A transport turns an endpoint into one live link. Construction is
// synchronous and may fail outright; everything after that (open, inbound
// frames, errors, close) is reported asynchronously as `TransportEvent`s
// on the channel handed to `Transport::open`.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Lifecycle and data events produced by one transport link, in arrival order.
///
/// An `Error` is always followed by a `Closed` for the same link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// Sending half of a link's event channel.
pub type TransportEvents = mpsc::UnboundedSender<TransportEvent>;

/// Handle to one live transport link.
///
/// Dropping the handle tears the link down.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl TransportLink {
    pub fn new(outbound: mpsc::UnboundedSender<String>, cancel: CancellationToken) -> Self {
        Self { outbound, cancel }
    }

    /// Queue one outbound text frame.
    pub fn send(&self, text: String) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::LinkClosed);
        }
        self.outbound.send(text).map_err(|_| Error::LinkClosed)
    }

    /// Signal the link's background task to shut down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outbound.is_closed()
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Something that can open a link to a telemetry endpoint.
pub trait Transport: Send + Sync + 'static {
    /// Start opening a link to `endpoint`.
    ///
    /// An `Err` means the link could not even be constructed (bad endpoint,
    /// no runtime); no events will follow. On `Ok`, progress is reported on
    /// `events` until a final [`TransportEvent::Closed`].
    fn open(&self, endpoint: &Url, events: TransportEvents) -> Result<TransportLink, Error>;
}
