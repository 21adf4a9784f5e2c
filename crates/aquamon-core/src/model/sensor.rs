// ── Sensor reading domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquamon_api::SensorPayload;

/// Coarse water-quality status derived from how many soft thresholds a
/// reading violates at once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SensorStatus {
    Normal,
    Warning,
    Critical,
}

/// The seven measured channels of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorValues {
    /// °C
    pub temperature: f64,
    pub ph: f64,
    /// mg/L
    pub dissolved_oxygen: f64,
    /// NTU
    pub turbidity: f64,
    /// mg/L
    pub ammonia: f64,
    /// mg/L
    pub nitrite: f64,
    /// mg/L
    pub nitrate: f64,
}

impl From<&SensorPayload> for SensorValues {
    fn from(p: &SensorPayload) -> Self {
        Self {
            temperature: p.temperature,
            ph: p.ph,
            dissolved_oxygen: p.dissolved_oxygen,
            turbidity: p.turbidity,
            ammonia: p.ammonia,
            nitrite: p.nitrite,
            nitrate: p.nitrate,
        }
    }
}

/// One immutable sample from one device, with its derived status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub device_mac: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub values: SensorValues,
    pub status: SensorStatus,
}

impl SensorReading {
    /// Build a reading and derive its status from the soft thresholds.
    pub fn new(device_mac: Option<String>, timestamp: DateTime<Utc>, values: SensorValues) -> Self {
        Self {
            device_mac,
            timestamp,
            values,
            status: crate::rules::determine_sensor_status(&values),
        }
    }
}
