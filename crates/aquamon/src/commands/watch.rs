//! `aquamon watch`: stream classified events from a telemetry endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use aquamon_api::WebSocketTransport;
use aquamon_core::{EventKind, RealtimeEvent, RealtimeManager, listener};

use crate::cli::{GlobalOpts, WatchArgs, WatchKind};
use crate::config;
use crate::error::CliError;
use crate::output;

const ALL_KINDS: [EventKind; 5] = [
    EventKind::Connection,
    EventKind::SensorData,
    EventKind::DeviceStatus,
    EventKind::Alert,
    EventKind::Heartbeat,
];

/// How often the reconnect budget is polled while waiting for events.
const EXHAUSTION_POLL: Duration = Duration::from_millis(250);

impl From<WatchKind> for EventKind {
    fn from(kind: WatchKind) -> Self {
        match kind {
            WatchKind::Connection => Self::Connection,
            WatchKind::SensorData => Self::SensorData,
            WatchKind::DeviceStatus => Self::DeviceStatus,
            WatchKind::Alert => Self::Alert,
            WatchKind::Heartbeat => Self::Heartbeat,
        }
    }
}

// ── Filtering ───────────────────────────────────────────────────────

/// Which events get printed.
#[derive(Debug)]
struct EventFilter {
    kinds: Vec<EventKind>,
    device: Option<String>,
}

impl EventFilter {
    fn new(kinds: &[WatchKind], device: Option<String>) -> Self {
        let kinds = if kinds.is_empty() {
            ALL_KINDS.to_vec()
        } else {
            kinds.iter().copied().map(EventKind::from).collect()
        };
        Self { kinds, device }
    }

    /// Connection events carry no device and are never device-filtered.
    fn accepts(&self, event: &RealtimeEvent) -> bool {
        if !self.kinds.contains(&event.kind()) {
            return false;
        }
        match (&self.device, event) {
            (_, RealtimeEvent::Connection(_)) | (None, _) => true,
            (Some(wanted), _) => event
                .device_mac()
                .is_some_and(|mac| mac.eq_ignore_ascii_case(wanted)),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let manager_config = config::manager_config(global, &cfg, args.max_attempts)?;
    let url = manager_config.endpoint.to_string();

    let transport = WebSocketTransport::new(Duration::from_secs(args.connect_timeout));
    let manager = RealtimeManager::new(manager_config, Arc::new(transport));

    // Listeners run on the pump task; hand events to this task for printing.
    let (tx, mut rx) = mpsc::unbounded_channel::<RealtimeEvent>();
    for kind in ALL_KINDS {
        let tx = tx.clone();
        manager.on(
            kind,
            listener(move |event| {
                let _ = tx.send(event.clone());
            }),
        );
    }
    drop(tx);

    let filter = EventFilter::new(&args.kind, args.device);
    let color = output::should_color(global.color);
    let mut printed: u64 = 0;

    info!(url = %url, "watching");
    manager.connect();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(EXHAUSTION_POLL);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break Ok(());
            }
            _ = poll.tick() => {
                if manager.reconnect_exhausted() {
                    break Err(CliError::ReconnectExhausted {
                        url: url.clone(),
                        attempts: manager.reconnect_attempts(),
                    });
                }
            }
            received = rx.recv() => {
                let Some(event) = received else { break Ok(()) };
                if !filter.accepts(&event) {
                    continue;
                }
                let out = output::render_event(global.output, &event, color)?;
                output::print_output(&out, global.quiet);

                if event.kind() != EventKind::Connection {
                    printed += 1;
                    if args.count.is_some_and(|n| printed >= n) {
                        break Ok(());
                    }
                }
            }
        }
    };

    manager.disconnect();
    result
}
