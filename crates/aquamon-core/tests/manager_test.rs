// Integration tests for `RealtimeManager` against an in-memory transport.
//
// Timer-driven behaviour runs on tokio's paused clock, so backoff delays
// are observed exactly and the tests finish instantly.
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use aquamon_api::{Error, Transport, TransportEvent, TransportEvents, TransportLink};
use aquamon_core::{
    AlertCategory, ConnectionEvent, ConnectionState, EventKind, ManagerConfig, RealtimeEvent,
    RealtimeManager, ReconnectPolicy, SensorStatus, listener,
};

// ── Mock transport ──────────────────────────────────────────────────

struct MockLink {
    events: TransportEvents,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct MockTransport {
    fail: AtomicBool,
    /// Every `open` call, successful or not.
    calls: Mutex<Vec<Instant>>,
    links: Mutex<Vec<MockLink>>,
}

impl MockTransport {
    fn failing() -> Arc<Self> {
        let mock = Self::default();
        mock.fail.store(true, Ordering::SeqCst);
        Arc::new(mock)
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn open_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_gaps_ms(&self) -> Vec<u128> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect()
    }

    fn push(&self, link: usize, event: TransportEvent) {
        let links = self.links.lock().unwrap();
        // The manager may already have dropped its receiver; that is fine.
        let _ = links[link].events.send(event);
    }

    fn sent(&self, link: usize) -> Vec<String> {
        let mut links = self.links.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(text) = links[link].outbound.try_recv() {
            out.push(text);
        }
        out
    }

    fn is_cancelled(&self, link: usize) -> bool {
        self.links.lock().unwrap()[link].cancel.is_cancelled()
    }
}

impl Transport for MockTransport {
    fn open(&self, _endpoint: &Url, events: TransportEvents) -> Result<TransportLink, Error> {
        self.calls.lock().unwrap().push(Instant::now());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::WebSocketConnect("connection refused".into()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.links.lock().unwrap().push(MockLink {
            events,
            outbound: outbound_rx,
            cancel: cancel.clone(),
        });
        Ok(TransportLink::new(outbound_tx, cancel))
    }
}

// ── Log capture ─────────────────────────────────────────────────────

/// Collects formatted tracing output for the current thread.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Install as the thread default. Tests run on the current-thread
    /// runtime, so spawned tasks log here too.
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn lines_at(&self, level: &str) -> Vec<String> {
        let raw = self.0.lock().unwrap();
        String::from_utf8_lossy(&raw)
            .lines()
            .filter(|line| line.split_whitespace().next() == Some(level))
            .map(str::to_owned)
            .collect()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn manager(transport: &Arc<MockTransport>) -> RealtimeManager {
    let config = ManagerConfig::from_endpoint("ws://localhost:8080").unwrap();
    RealtimeManager::new(config, Arc::clone(transport) as Arc<dyn Transport>)
}

type Recorded = Arc<Mutex<Vec<RealtimeEvent>>>;

fn record_all(manager: &RealtimeManager) -> Recorded {
    let log: Recorded = Arc::default();
    for kind in [
        EventKind::Connection,
        EventKind::SensorData,
        EventKind::DeviceStatus,
        EventKind::Alert,
        EventKind::Heartbeat,
    ] {
        let log = Arc::clone(&log);
        manager.on(kind, listener(move |e| log.lock().unwrap().push(e.clone())));
    }
    log
}

fn take(log: &Recorded) -> Vec<RealtimeEvent> {
    std::mem::take(&mut *log.lock().unwrap())
}

fn connection(event: ConnectionEvent) -> RealtimeEvent {
    RealtimeEvent::Connection(event)
}

/// Let the pump and timer tasks run without advancing the clock.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn connected(transport: &Arc<MockTransport>) -> (RealtimeManager, Recorded) {
    let manager = manager(transport);
    let log = record_all(&manager);
    manager.connect();
    transport.push(0, TransportEvent::Opened);
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Connected);
    take(&log);
    (manager, log)
}

fn sensor_frame(temperature: f64, ph: f64, oxygen: f64, ammonia: f64) -> String {
    json!({
        "type": "sensor_data",
        "data": {
            "temperature": temperature, "ph": ph, "dissolvedOxygen": oxygen,
            "turbidity": 4.0, "ammonia": ammonia, "nitrite": 0.1, "nitrate": 15.0
        },
        "timestamp": "2026-03-01T08:30:00Z",
        "deviceMac": "AA:BB:CC:DD:EE:01"
    })
    .to_string()
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_connect_then_open_emits_connected() {
    let transport = Arc::new(MockTransport::default());
    let manager = manager(&transport);
    let log = record_all(&manager);

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.connect();
    assert_eq!(manager.state(), ConnectionState::Connecting);

    transport.push(0, TransportEvent::Opened);
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(take(&log), vec![connection(ConnectionEvent::connected())]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_idempotent() {
    let transport = Arc::new(MockTransport::default());
    let manager = manager(&transport);

    manager.connect();
    manager.connect();
    manager.clone().connect();
    assert_eq!(transport.open_count(), 1);

    transport.push(0, TransportEvent::Opened);
    settle().await;
    manager.connect();
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_and_give_up() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let transport = MockTransport::failing();
    let manager = manager(&transport);
    let log = record_all(&manager);

    manager.connect();
    tokio::time::sleep(Duration::from_secs(120)).await;

    // Initial attempt plus five retries, then nothing.
    assert_eq!(transport.open_count(), 6);
    assert_eq!(transport.call_gaps_ms(), vec![1000, 2000, 4000, 8000, 16000]);
    assert!(manager.reconnect_exhausted());
    assert_eq!(manager.reconnect_attempts(), 5);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    let events = take(&log);
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| matches!(
        e,
        RealtimeEvent::Connection(ConnectionEvent { error: Some(_), .. })
    )));

    let errors = logs.lines_at("ERROR");
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("reconnection limit reached"), "{errors:?}");

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.open_count(), 6);
    assert_eq!(logs.lines_at("ERROR").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_connect_after_give_up_starts_fresh() {
    let transport = MockTransport::failing();
    let manager = manager(&transport);

    manager.connect();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(manager.reconnect_exhausted());

    transport.set_failing(false);
    manager.connect();
    assert_eq!(transport.open_count(), 7);
    assert!(!manager.reconnect_exhausted());
    assert_eq!(manager.reconnect_attempts(), 0);

    transport.push(0, TransportEvent::Opened);
    settle().await;
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_close_reconnects_after_base_delay() {
    let transport = Arc::new(MockTransport::default());
    let (manager, log) = connected(&transport).await;

    transport.push(0, TransportEvent::Error("connection reset".into()));
    transport.push(
        0,
        TransportEvent::Closed {
            code: None,
            reason: "connection reset".into(),
        },
    );
    settle().await;

    assert_eq!(
        take(&log),
        vec![
            connection(ConnectionEvent::error("connection reset")),
            connection(ConnectionEvent::disconnected()),
        ]
    );
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.reconnect_attempts(), 1);

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(transport.open_count(), 1);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(manager.state(), ConnectionState::Connecting);

    transport.push(1, TransportEvent::Opened);
    settle().await;
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(take(&log), vec![connection(ConnectionEvent::connected())]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let transport = Arc::new(MockTransport::default());
    let (manager, _log) = connected(&transport).await;

    transport.push(
        0,
        TransportEvent::Closed {
            code: Some(1006),
            reason: String::new(),
        },
    );
    settle().await;
    assert_eq!(manager.reconnect_attempts(), 1);

    manager.disconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connected() {
    let transport = Arc::new(MockTransport::default());
    let (manager, log) = connected(&transport).await;

    manager.disconnect();
    assert!(transport.is_cancelled(0));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(take(&log), vec![connection(ConnectionEvent::disconnected())]);

    // The torn-down link reporting its close must not resurrect anything.
    transport.push(
        0,
        TransportEvent::Closed {
            code: None,
            reason: "closed locally".into(),
        },
    );
    settle().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(take(&log).is_empty());
    assert_eq!(transport.open_count(), 1);

    manager.disconnect();
    assert!(take(&log).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_listener_reconnect_on_disconnected_does_not_charge_budget() {
    let transport = Arc::new(MockTransport::default());
    let (manager, log) = connected(&transport).await;

    let handle = manager.clone();
    manager.on(
        EventKind::Connection,
        listener(move |e| {
            if matches!(e, RealtimeEvent::Connection(c) if c == &ConnectionEvent::disconnected()) {
                handle.connect();
            }
        }),
    );

    transport.push(
        0,
        TransportEvent::Closed {
            code: Some(1006),
            reason: String::new(),
        },
    );
    settle().await;

    assert_eq!(transport.open_count(), 2);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert_eq!(manager.reconnect_attempts(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(manager.reconnect_attempts(), 0);

    transport.push(1, TransportEvent::Opened);
    settle().await;
    assert!(manager.is_connected());
    assert_eq!(
        take(&log),
        vec![
            connection(ConnectionEvent::disconnected()),
            connection(ConnectionEvent::connected()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_from_superseded_link_is_ignored() {
    let transport = Arc::new(MockTransport::default());
    let manager = manager(&transport);
    let log = record_all(&manager);

    manager.connect();
    manager.disconnect();
    take(&log);

    // The first link finishes its handshake after the manual disconnect.
    transport.push(0, TransportEvent::Opened);
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(take(&log).is_empty());

    manager.connect();
    assert_eq!(transport.open_count(), 2);
    transport.push(1, TransportEvent::Opened);
    settle().await;
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_close_from_superseded_link_keeps_new_link() {
    let transport = Arc::new(MockTransport::default());
    let (manager, log) = connected(&transport).await;

    manager.disconnect();
    manager.connect();
    assert_eq!(transport.open_count(), 2);
    take(&log);

    transport.push(
        0,
        TransportEvent::Closed {
            code: None,
            reason: "closed locally".into(),
        },
    );
    settle().await;

    assert!(!transport.is_cancelled(1));
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert!(take(&log).is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_manager_stops_background_work() {
    let transport = MockTransport::failing();
    let manager = manager(&transport);

    manager.connect();
    drop(manager);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy() {
    let transport = MockTransport::failing();
    let config = ManagerConfig::from_endpoint("ws://localhost:8080")
        .unwrap()
        .with_reconnect(ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_attempts: 2,
        });
    let manager = RealtimeManager::new(config, Arc::clone(&transport) as Arc<dyn Transport>);

    manager.connect();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(transport.call_gaps_ms(), vec![100, 200]);
    assert!(manager.reconnect_exhausted());
}

// ── Inbound messages ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_critical_reading_emits_reading_then_ordered_alerts() {
    let transport = Arc::new(MockTransport::default());
    let (_manager, log) = connected(&transport).await;

    transport.push(0, TransportEvent::Message(sensor_frame(13.0, 9.5, 2.0, 1.2)));
    settle().await;

    let events = take(&log);
    assert_eq!(events.len(), 5);
    let RealtimeEvent::SensorData(reading) = &events[0] else {
        panic!("expected reading first, got {:?}", events[0]);
    };
    assert_eq!(reading.status, SensorStatus::Critical);

    let categories: Vec<AlertCategory> = events[1..]
        .iter()
        .map(|e| match e {
            RealtimeEvent::Alert(a) => a.category,
            other => panic!("expected alert, got {other:?}"),
        })
        .collect();
    assert_eq!(
        categories,
        vec![
            AlertCategory::Temperature,
            AlertCategory::Ph,
            AlertCategory::Oxygen,
            AlertCategory::Ammonia,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_warning_reading_emits_no_alert() {
    let transport = Arc::new(MockTransport::default());
    let (_manager, log) = connected(&transport).await;

    transport.push(0, TransportEvent::Message(sensor_frame(16.0, 7.0, 8.0, 0.1)));
    settle().await;

    let events = take(&log);
    assert_eq!(events.len(), 1);
    let RealtimeEvent::SensorData(reading) = &events[0] else {
        panic!("expected reading");
    };
    assert_eq!(reading.status, SensorStatus::Warning);
}

#[tokio::test(start_paused = true)]
async fn test_bad_frames_are_dropped_and_connection_survives() {
    let transport = Arc::new(MockTransport::default());
    let (manager, log) = connected(&transport).await;

    transport.push(0, TransportEvent::Message("{not json".into()));
    transport.push(
        0,
        TransportEvent::Message(
            json!({"type": "firmware", "data": {}, "timestamp": "2026-03-01T08:30:00Z"})
                .to_string(),
        ),
    );
    transport.push(
        0,
        TransportEvent::Message(
            json!({"type": "alert", "data": {"type": "salinity", "message": "?"},
                   "timestamp": "2026-03-01T08:30:00Z"})
            .to_string(),
        ),
    );
    transport.push(
        0,
        TransportEvent::Message(
            json!({"type": "heartbeat", "data": {}, "timestamp": "2026-03-01T08:31:00Z",
                   "deviceMac": "AA:BB:CC:DD:EE:01"})
            .to_string(),
        ),
    );
    settle().await;

    let events = take(&log);
    assert_eq!(events.len(), 1, "only the heartbeat should get through: {events:?}");
    assert_eq!(events[0].kind(), EventKind::Heartbeat);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_messages_dispatch_in_arrival_order() {
    let transport = Arc::new(MockTransport::default());
    let (_manager, log) = connected(&transport).await;

    for status in ["online", "offline", "online"] {
        transport.push(
            0,
            TransportEvent::Message(
                json!({"type": "device_status", "data": {"status": status},
                       "timestamp": "2026-03-01T08:30:00Z", "deviceMac": "AA:BB:CC:DD:EE:09"})
                .to_string(),
            ),
        );
    }
    settle().await;

    let states: Vec<String> = take(&log)
        .iter()
        .map(|e| match e {
            RealtimeEvent::DeviceStatus(s) => s.state.to_string(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(states, ["online", "offline", "online"]);
}

// ── Listeners ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_off_listener_is_never_invoked() {
    let transport = Arc::new(MockTransport::default());
    let (manager, _log) = connected(&transport).await;

    let hits = Arc::new(Mutex::new(0_u32));
    let cb = {
        let hits = Arc::clone(&hits);
        listener(move |_| *hits.lock().unwrap() += 1)
    };
    manager.on(EventKind::Heartbeat, Arc::clone(&cb));
    assert!(manager.off(EventKind::Heartbeat, &cb));
    assert_eq!(manager.listener_count(EventKind::Heartbeat), 1);

    transport.push(
        0,
        TransportEvent::Message(
            json!({"type": "heartbeat", "data": {}, "timestamp": "2026-03-01T08:30:00Z"})
                .to_string(),
        ),
    );
    settle().await;
    assert_eq!(*hits.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_listener_is_isolated() {
    let transport = Arc::new(MockTransport::default());
    let manager = manager(&transport);

    manager.on(EventKind::Connection, listener(|_| panic!("broken widget")));
    let log = record_all(&manager);

    manager.connect();
    transport.push(0, TransportEvent::Opened);
    settle().await;

    assert_eq!(take(&log), vec![connection(ConnectionEvent::connected())]);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_listener_can_call_back_into_manager() {
    let transport = Arc::new(MockTransport::default());
    let manager = manager(&transport);

    let handle = manager.clone();
    manager.on(
        EventKind::Connection,
        listener(move |e| {
            if matches!(e, RealtimeEvent::Connection(c) if c == &ConnectionEvent::connected()) {
                handle.send(&json!({"type": "subscribe", "devices": ["AA:BB:CC:DD:EE:01"]}));
            }
        }),
    );

    manager.connect();
    transport.push(0, TransportEvent::Opened);
    settle().await;

    let sent = transport.sent(0);
    assert_eq!(sent.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(value["type"], "subscribe");
}

// ── Outbound ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_send_while_disconnected_is_dropped() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let transport = Arc::new(MockTransport::default());
    let manager = manager(&transport);

    manager.send(&json!({"type": "ping"}));
    assert_eq!(transport.open_count(), 0);
    let warnings = logs.lines_at("WARN");
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("not connected"), "{warnings:?}");

    // Still connecting: nothing reaches the link either.
    manager.connect();
    manager.send(&json!({"type": "ping"}));
    assert!(transport.sent(0).is_empty());
    assert_eq!(logs.lines_at("WARN").len(), 2);
}

/// Reads manager state while being serialized.
struct StateReport(RealtimeManager);

impl serde::Serialize for StateReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.state().to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_payload_may_read_manager_state() {
    let transport = Arc::new(MockTransport::default());
    let (manager, _log) = connected(&transport).await;

    manager.send(&StateReport(manager.clone()));

    assert_eq!(transport.sent(0), vec![r#""connected""#.to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_connected_serializes_once() {
    let transport = Arc::new(MockTransport::default());
    let (manager, _log) = connected(&transport).await;

    manager.send(&json!({"type": "calibrate", "channel": "ph"}));

    assert_eq!(
        transport.sent(0),
        vec![r#"{"channel":"ph","type":"calibrate"}"#.to_owned()]
    );
}
