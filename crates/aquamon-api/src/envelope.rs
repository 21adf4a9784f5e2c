//! Wire envelope for telemetry messages.
//!
//! Every frame on the telemetry stream is a JSON object of the shape
//! `{ "type": ..., "data": {...}, "timestamp": "<ISO-8601>", "deviceMac"?: ... }`.
//! [`Envelope`] mirrors that shape verbatim; [`InboundMessage`] is the
//! validated, typed form the rest of the workspace consumes.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Envelope ─────────────────────────────────────────────────────────

/// Raw wire envelope, field-for-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// One of `sensor_data`, `device_status`, `alert`, `heartbeat`.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Per-kind payload object.
    pub data: Value,

    /// ISO-8601 timestamp set by the emitter.
    pub timestamp: String,

    /// Emitting device, when the envelope names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<String>,
}

// ── MessageKind ──────────────────────────────────────────────────────

/// The closed set of message kinds the stream carries.
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
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    SensorData,
    DeviceStatus,
    Alert,
    Heartbeat,
}

// ── Payloads ─────────────────────────────────────────────────────────

/// Water-quality sample from one device. All seven channels are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    /// Water temperature, °C.
    pub temperature: f64,
    #[serde(alias = "pH")]
    pub ph: f64,
    /// Dissolved oxygen, mg/L.
    pub dissolved_oxygen: f64,
    /// Turbidity, NTU.
    pub turbidity: f64,
    /// Ammonia, mg/L.
    pub ammonia: f64,
    /// Nitrite, mg/L.
    pub nitrite: f64,
    /// Nitrate, mg/L.
    pub nitrate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusPayload {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<String>,
    /// Anything else the device reports (firmware, RSSI, uptime...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Alert raised by the device itself, as opposed to one derived from a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "type")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed payload, one variant per [`MessageKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    SensorData(SensorPayload),
    DeviceStatus(DeviceStatusPayload),
    Alert(AlertPayload),
    Heartbeat(HeartbeatPayload),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::SensorData(_) => MessageKind::SensorData,
            Self::DeviceStatus(_) => MessageKind::DeviceStatus,
            Self::Alert(_) => MessageKind::Alert,
            Self::Heartbeat(_) => MessageKind::Heartbeat,
        }
    }

    /// Device identifier carried inside the payload object, if any.
    fn device_mac(&self) -> Option<&str> {
        match self {
            Self::SensorData(p) => p.device_mac.as_deref(),
            Self::DeviceStatus(p) => p.device_mac.as_deref(),
            Self::Alert(p) => p.device_mac.as_deref(),
            Self::Heartbeat(p) => p.device_mac.as_deref(),
        }
    }
}

// ── InboundMessage ───────────────────────────────────────────────────

/// A validated message from the telemetry stream.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub timestamp: DateTime<Utc>,
    /// Envelope `deviceMac`, falling back to the payload's own `deviceMac`.
    pub device_mac: Option<String>,
    pub payload: Payload,
}

impl InboundMessage {
    /// Build a message stamped with the current time.
    pub fn now(device_mac: Option<String>, payload: Payload) -> Self {
        Self {
            timestamp: Utc::now(),
            device_mac,
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Decode one text frame.
    ///
    /// Returns [`Error::UnknownMessageType`] for a well-formed envelope with
    /// an unrecognised `type`, and [`Error::Deserialization`] for everything
    /// else that does not fit the envelope or the per-kind payload.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string(), text))?;
        Self::from_envelope(envelope, text)
    }

    fn from_envelope(envelope: Envelope, body: &str) -> Result<Self, Error> {
        let kind = MessageKind::from_str(&envelope.message_type)
            .map_err(|_| Error::UnknownMessageType(envelope.message_type.clone()))?;

        if !envelope.data.is_object() {
            return Err(Error::malformed("`data` must be a JSON object", body));
        }

        let timestamp = DateTime::parse_from_rfc3339(&envelope.timestamp)
            .map_err(|e| Error::malformed(format!("invalid timestamp: {e}"), body))?
            .with_timezone(&Utc);

        let data = envelope.data;
        let decode_err = |e: serde_json::Error| Error::malformed(format!("{kind} payload: {e}"), body);
        let payload = match kind {
            MessageKind::SensorData => {
                Payload::SensorData(serde_json::from_value(data).map_err(decode_err)?)
            }
            MessageKind::DeviceStatus => {
                Payload::DeviceStatus(serde_json::from_value(data).map_err(decode_err)?)
            }
            MessageKind::Alert => Payload::Alert(serde_json::from_value(data).map_err(decode_err)?),
            MessageKind::Heartbeat => {
                Payload::Heartbeat(serde_json::from_value(data).map_err(decode_err)?)
            }
        };

        let device_mac = envelope
            .device_mac
            .or_else(|| payload.device_mac().map(str::to_owned));

        Ok(Self {
            timestamp,
            device_mac,
            payload,
        })
    }

    /// Re-encode into the wire shape.
    pub fn to_envelope(&self) -> Result<Envelope, Error> {
        let data = match &self.payload {
            Payload::SensorData(p) => serde_json::to_value(p)?,
            Payload::DeviceStatus(p) => serde_json::to_value(p)?,
            Payload::Alert(p) => serde_json::to_value(p)?,
            Payload::Heartbeat(p) => serde_json::to_value(p)?,
        };

        Ok(Envelope {
            message_type: self.kind().to_string(),
            data,
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            device_mac: self.device_mac.clone(),
        })
    }

    /// Serialize straight to a text frame.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.to_envelope()?)?)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
