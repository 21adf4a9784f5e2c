// ── Realtime connection manager ──
//
// Owns one transport link to a telemetry source and everything around it:
// lifecycle state, exponential-backoff reconnection, inbound
// classification, and fan-out to listeners.
//
// Concurrency model: callers use the synchronous methods below; transport
// events for one link are drained by a single pump task in arrival order;
// reconnect delays are single-shot timer tasks. Session state sits behind
// one mutex that is never held while a listener runs, so listeners may call
// back into the manager freely.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use aquamon_api::{InboundMessage, Transport, TransportEvent, TransportLink};

use crate::classify::classify;
use crate::config::ManagerConfig;
use crate::error::CoreError;
use crate::listeners::{Listener, ListenerRegistry};
use crate::model::{ConnectionEvent, EventKind, RealtimeEvent};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── RealtimeManager ──────────────────────────────────────────────────

/// The entry point for consumers.
///
/// Cheaply cloneable; clones share one session. Construct one per
/// telemetry source at the application's composition root and pass it to
/// whatever needs it. All methods must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ManagerConfig,
    transport: Arc<dyn Transport>,
    listeners: ListenerRegistry,
    session: Mutex<Session>,
}

/// Mutable session state. Only ever touched under `ManagerInner::session`.
struct Session {
    state: ConnectionState,
    link: Option<TransportLink>,
    /// Bumped for every link opened and on manual disconnect; events
    /// tagged with an older generation are discarded.
    generation: u64,
    attempts: u32,
    exhausted: bool,
    manual_disconnect: bool,
    pending_reconnect: Option<CancellationToken>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            link: None,
            generation: 0,
            attempts: 0,
            exhausted: false,
            manual_disconnect: false,
            pending_reconnect: None,
        }
    }

    fn cancel_pending_reconnect(&mut self) {
        if let Some(token) = self.pending_reconnect.take() {
            token.cancel();
        }
    }
}

/// What `schedule_reconnect` decided, computed under the lock.
enum ReconnectPlan {
    Skip { reason: &'static str },
    GiveUp { attempts: u32 },
    Retry {
        attempt: u32,
        delay: std::time::Duration,
        token: CancellationToken,
    },
}

impl RealtimeManager {
    pub fn new(config: ManagerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                transport,
                listeners: ListenerRegistry::new(),
                session: Mutex::new(Session::new()),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // Nothing panics while the lock is held; recover rather than cascade.
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn from_weak(weak: &Weak<ManagerInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ── Observers ────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.session().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.session().attempts
    }

    /// `true` once the reconnect budget is spent. Only a manual
    /// [`connect`](Self::connect) clears it.
    pub fn reconnect_exhausted(&self) -> bool {
        self.session().exhausted
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open a link to the configured endpoint.
    ///
    /// No-op while a link is connecting or open. Otherwise cancels any
    /// pending reconnect and, if the budget was exhausted, grants a fresh
    /// one. Failures are never returned; they surface as `connection`
    /// events and trigger backoff.
    pub fn connect(&self) {
        {
            let mut session = self.session();
            if session.link.is_some() || session.state != ConnectionState::Disconnected {
                debug!(state = %session.state, "connect ignored, link already active");
                return;
            }
            session.manual_disconnect = false;
            session.cancel_pending_reconnect();
            if session.exhausted {
                info!("reconnect budget reset by manual connect");
                session.exhausted = false;
                session.attempts = 0;
            }
        }
        self.open_link();
    }

    /// Tear the link down on purpose. Never triggers reconnection.
    pub fn disconnect(&self) {
        let was_active = {
            let mut session = self.session();
            session.manual_disconnect = true;
            session.cancel_pending_reconnect();
            session.generation += 1;

            let was_active = session.link.is_some() || session.state != ConnectionState::Disconnected;
            if let Some(link) = session.link.take() {
                link.close();
            }
            session.state = ConnectionState::Disconnected;
            was_active
        };

        if was_active {
            info!(url = %self.inner.config.endpoint, "disconnected by request");
            self.emit(&RealtimeEvent::Connection(ConnectionEvent::disconnected()));
        } else {
            debug!("disconnect with no active link");
        }
    }

    /// Construct a transport link unless one is already active.
    fn open_link(&self) {
        let generation = {
            let mut session = self.session();
            if session.link.is_some() || session.state != ConnectionState::Disconnected {
                debug!(state = %session.state, "reconnect skipped, link already active");
                return;
            }
            session.generation += 1;
            session.state = ConnectionState::Connecting;
            session.generation
        };

        let endpoint = &self.inner.config.endpoint;
        info!(url = %endpoint, generation, "connecting");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        match self.inner.transport.open(endpoint, events_tx) {
            Ok(link) => {
                let mut session = self.session();
                if session.generation != generation {
                    // Superseded (disconnect raced the open); drop it.
                    link.close();
                    return;
                }
                session.link = Some(link);
                drop(session);

                let weak = Arc::downgrade(&self.inner);
                tokio::spawn(pump(weak, generation, events_rx));
            }
            Err(e) => {
                warn!(url = %endpoint, error = %e, "transport construction failed");
                {
                    let mut session = self.session();
                    if session.generation != generation {
                        return;
                    }
                    session.state = ConnectionState::Disconnected;
                }
                self.emit(&RealtimeEvent::Connection(ConnectionEvent::error(
                    CoreError::from(e).to_string(),
                )));
                self.schedule_reconnect();
            }
        }
    }

    /// Arm the next backoff timer, or give up once the budget is spent.
    fn schedule_reconnect(&self) {
        let policy = &self.inner.config.reconnect;

        let plan = {
            let mut session = self.session();
            if session.manual_disconnect {
                ReconnectPlan::Skip {
                    reason: "manual disconnect",
                }
            } else if session.link.is_some() || session.state != ConnectionState::Disconnected {
                // A listener reconnected while the close was being reported.
                ReconnectPlan::Skip {
                    reason: "link already active",
                }
            } else if session.attempts >= policy.max_attempts {
                session.exhausted = true;
                ReconnectPlan::GiveUp {
                    attempts: session.attempts,
                }
            } else {
                session.attempts += 1;
                let token = CancellationToken::new();
                session.cancel_pending_reconnect();
                session.pending_reconnect = Some(token.clone());
                ReconnectPlan::Retry {
                    attempt: session.attempts,
                    delay: policy.delay_for(session.attempts),
                    token,
                }
            }
        };

        match plan {
            ReconnectPlan::Skip { reason } => debug!(reason, "reconnect not scheduled"),
            ReconnectPlan::GiveUp { attempts } => {
                error!(
                    attempts,
                    url = %self.inner.config.endpoint,
                    "reconnection limit reached, giving up until manual connect"
                );
            }
            ReconnectPlan::Retry {
                attempt,
                delay,
                token,
            } => {
                info!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling reconnect"
                );
                let weak = Arc::downgrade(&self.inner);
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            if let Some(manager) = Self::from_weak(&weak) {
                                manager.fire_reconnect(&token);
                            }
                        }
                    }
                });
            }
        }
    }

    fn fire_reconnect(&self, token: &CancellationToken) {
        {
            let mut session = self.session();
            if token.is_cancelled() || session.manual_disconnect {
                return;
            }
            session.pending_reconnect = None;
        }
        debug!("reconnect timer fired");
        self.open_link();
    }

    // ── Transport events ─────────────────────────────────────────

    fn handle_transport_event(&self, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_open(generation),
            TransportEvent::Closed { code, reason } => self.on_close(generation, code, &reason),
            TransportEvent::Message(text) => {
                if self.is_current(generation) {
                    self.on_message(&text);
                }
            }
            TransportEvent::Error(detail) => {
                if self.is_current(generation) {
                    warn!(error = %detail, "transport error");
                    self.emit(&RealtimeEvent::Connection(ConnectionEvent::error(detail)));
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let current = self.session().generation;
        if current != generation {
            trace!(generation, current, "stale transport event dropped");
        }
        current == generation
    }

    // Lifecycle transitions check the generation under the guard that
    // applies them; a concurrent `disconnect` or `connect` supersedes them.
    fn on_open(&self, generation: u64) {
        {
            let mut session = self.session();
            if session.generation != generation {
                trace!(generation, current = session.generation, "stale open dropped");
                return;
            }
            session.state = ConnectionState::Connected;
            session.attempts = 0;
            session.exhausted = false;
        }
        info!(url = %self.inner.config.endpoint, "connected");
        self.emit(&RealtimeEvent::Connection(ConnectionEvent::connected()));
    }

    fn on_close(&self, generation: u64, code: Option<u16>, reason: &str) {
        let manual = {
            let mut session = self.session();
            if session.generation != generation {
                trace!(generation, current = session.generation, "stale close dropped");
                return;
            }
            session.state = ConnectionState::Disconnected;
            session.link = None;
            session.manual_disconnect
        };
        info!(code = ?code, reason, "connection closed");
        self.emit(&RealtimeEvent::Connection(ConnectionEvent::disconnected()));

        if !manual {
            self.schedule_reconnect();
        }
    }

    /// Decode, classify and publish one inbound frame. Bad frames are
    /// logged and dropped; they never reach listeners.
    fn on_message(&self, raw: &str) {
        let msg = match InboundMessage::parse(raw) {
            Ok(msg) => msg,
            Err(aquamon_api::Error::UnknownMessageType(message_type)) => {
                warn!(message_type = %message_type, "dropping message of unknown type");
                return;
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed message");
                return;
            }
        };

        let kind = msg.kind();
        match classify(msg) {
            Ok(events) => {
                trace!(%kind, events = events.len(), "message classified");
                for event in &events {
                    self.emit(event);
                }
            }
            Err(e) => warn!(%kind, error = %e, "dropping invalid message"),
        }
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Serialize and transmit `message` if connected; otherwise log a
    /// warning and drop it. Nothing is queued or retried.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) {
        // Serialize before locking; `message` may call back into the manager.
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "outbound message could not be serialized, dropped");
                return;
            }
        };

        let session = self.session();
        let link = match (&session.state, &session.link) {
            (ConnectionState::Connected, Some(link)) => link,
            _ => {
                warn!(state = %session.state, "not connected, outbound message dropped");
                return;
            }
        };

        if let Err(e) = link.send(text) {
            warn!(error = %e, "outbound message dropped by transport");
        }
    }

    // ── Listeners ────────────────────────────────────────────────

    pub fn on(&self, kind: EventKind, callback: Listener) {
        self.inner.listeners.on(kind, callback);
    }

    /// Returns `false` if `callback` was not registered for `kind`.
    pub fn off(&self, kind: EventKind, callback: &Listener) -> bool {
        self.inner.listeners.off(kind, callback)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.count(kind)
    }

    fn emit(&self, event: &RealtimeEvent) {
        self.inner.listeners.emit(event);
    }
}

impl std::fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session();
        f.debug_struct("RealtimeManager")
            .field("endpoint", &self.inner.config.endpoint.as_str())
            .field("state", &session.state)
            .field("attempts", &session.attempts)
            .field("exhausted", &session.exhausted)
            .field("listeners", &self.inner.listeners)
            .finish_non_exhaustive()
    }
}

// ── Pump task ────────────────────────────────────────────────────────

/// Drain one link's events in order. Holds only a weak reference so
/// dropping every manager handle lets the task finish.
async fn pump(
    weak: Weak<ManagerInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(manager) = RealtimeManager::from_weak(&weak) else {
            break;
        };
        let closed = matches!(event, TransportEvent::Closed { .. });
        manager.handle_transport_event(generation, event);
        if closed {
            break;
        }
    }
    trace!(generation, "pump exiting");
}
