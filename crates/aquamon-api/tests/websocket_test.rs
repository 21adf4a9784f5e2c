// Integration tests for `WebSocketTransport` against a local tungstenite server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use aquamon_api::{InboundMessage, MessageKind, Transport, TransportEvent, WebSocketTransport};

// ── Helpers ─────────────────────────────────────────────────────────

const SENSOR_FRAME: &str = r#"{
    "type": "sensor_data",
    "data": {
        "temperature": 23.9, "ph": 7.2, "dissolvedOxygen": 6.4, "turbidity": 3.0,
        "ammonia": 0.2, "nitrite": 0.1, "nitrate": 22.0
    },
    "timestamp": "2026-03-01T08:30:00Z",
    "deviceMac": "AA:BB:CC:DD:EE:01"
}"#;

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}")).unwrap();
    (listener, url)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_receives_frames_and_server_close() {
    let (listener, url) = bind().await;

    let (echo_tx, mut echo_rx) = mpsc::unbounded_channel::<String>();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::text(SENSOR_FRAME)).await.unwrap();

        // Wait for the client's outbound frame before closing.
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                echo_tx.send(text.as_str().to_owned()).unwrap();
                break;
            }
        }

        ws.close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "maintenance".into(),
        }))
        .await
        .unwrap();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let link = WebSocketTransport::default().open(&url, tx).unwrap();

    assert_eq!(next_event(&mut rx).await, TransportEvent::Opened);

    let TransportEvent::Message(text) = next_event(&mut rx).await else {
        panic!("expected a message frame");
    };
    let msg = InboundMessage::parse(&text).unwrap();
    assert_eq!(msg.kind(), MessageKind::SensorData);

    link.send(r#"{"type":"ping"}"#.to_owned()).unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), echo_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed, r#"{"type":"ping"}"#);

    let TransportEvent::Closed { code, reason } = next_event(&mut rx).await else {
        panic!("expected close");
    };
    assert_eq!(code, Some(1001));
    assert_eq!(reason, "maintenance");

    server.await.unwrap();
}

#[tokio::test]
async fn test_local_close_ends_link() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Drain until the client goes away.
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                break;
            }
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let link = WebSocketTransport::default().open(&url, tx).unwrap();
    assert_eq!(next_event(&mut rx).await, TransportEvent::Opened);

    link.close();

    let TransportEvent::Closed { code, .. } = next_event(&mut rx).await else {
        panic!("expected close");
    };
    assert_eq!(code, None);
    assert!(link.send("late".into()).is_err());

    server.await.unwrap();
}

#[tokio::test]
async fn test_handshake_failure_reports_error_then_close() {
    let (listener, url) = bind().await;

    // Accept TCP then hang up without speaking WebSocket.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _link = WebSocketTransport::default().open(&url, tx).unwrap();

    assert!(matches!(next_event(&mut rx).await, TransportEvent::Error(_)));
    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Closed { code: None, .. }
    ));

    server.await.unwrap();
}
