// ── Device status and heartbeat domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceState {
    Online,
    Offline,
    Error,
    #[serde(other)]
    Unknown,
}

impl DeviceState {
    /// Lenient parse; anything unrecognised is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or(Self::Unknown)
    }
}

/// Normalized `device_status` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_mac: Option<String>,
    pub state: DeviceState,
    pub timestamp: DateTime<Utc>,
    /// Remaining fields the device reported, untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// Liveness ping from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub device_mac: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}
