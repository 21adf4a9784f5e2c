// ── Events emitted to listeners ──

use serde::{Deserialize, Serialize};

use super::alert::Alert;
use super::device::{DeviceStatus, Heartbeat};
use super::sensor::SensorReading;

/// Event names listeners subscribe to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Connection,
    SensorData,
    DeviceStatus,
    Alert,
    Heartbeat,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Payload of a `connection` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionEvent {
    pub fn connected() -> Self {
        Self {
            status: ConnectionStatus::Connected,
            error: None,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            error: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Error,
            error: Some(detail.into()),
        }
    }
}

/// Everything the manager publishes, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Connection(ConnectionEvent),
    SensorData(SensorReading),
    DeviceStatus(DeviceStatus),
    Alert(Alert),
    Heartbeat(Heartbeat),
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connection(_) => EventKind::Connection,
            Self::SensorData(_) => EventKind::SensorData,
            Self::DeviceStatus(_) => EventKind::DeviceStatus,
            Self::Alert(_) => EventKind::Alert,
            Self::Heartbeat(_) => EventKind::Heartbeat,
        }
    }

    /// Device the event concerns, if any.
    pub fn device_mac(&self) -> Option<&str> {
        match self {
            Self::Connection(_) => None,
            Self::SensorData(r) => r.device_mac.as_deref(),
            Self::DeviceStatus(s) => s.device_mac.as_deref(),
            Self::Alert(a) => a.device_mac.as_deref(),
            Self::Heartbeat(h) => h.device_mac.as_deref(),
        }
    }
}
