//! Realtime data layer between `aquamon-api` and consumers (CLI, dashboards).
//!
//! - **[`RealtimeManager`]** owns one transport link to a telemetry source.
//!   It runs the connection lifecycle (`Disconnected` → `Connecting` →
//!   `Connected`), reconnects with exponential backoff, classifies inbound
//!   frames and republishes them as typed [`RealtimeEvent`]s to listeners
//!   registered with [`on`](RealtimeManager::on).
//!
//! - **Rules** ([`rules`]) derive a [`SensorStatus`] and zero or more
//!   [`Alert`]s from every [`SensorReading`]. The two threshold tables are
//!   independent; alert cutoffs are strictly wider than status cutoffs.
//!
//! - **Domain model** ([`model`]) holds the canonical entities emitted to
//!   listeners.

pub mod classify;
pub mod config;
pub mod error;
pub mod listeners;
pub mod manager;
pub mod model;
pub mod rules;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::classify;
pub use config::{ManagerConfig, ReconnectPolicy};
pub use error::CoreError;
pub use listeners::{Listener, ListenerRegistry, listener};
pub use manager::{ConnectionState, RealtimeManager};
pub use rules::{check_for_alerts, determine_sensor_status};

pub use model::{
    Alert, AlertCategory, AlertSeverity, ConnectionEvent, ConnectionStatus, DeviceState,
    DeviceStatus, EventKind, Heartbeat, RealtimeEvent, SensorReading, SensorStatus, SensorValues,
};
