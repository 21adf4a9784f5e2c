// ── Alert domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which metric an alert is about.
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
pub enum AlertCategory {
    Temperature,
    Ph,
    Oxygen,
    Ammonia,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A condition requiring operator attention.
///
/// Acknowledgement and clearing belong to whoever consumes the alert; this
/// crate only ever creates alerts with `acknowledged = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Time-ordered random identifier. Collisions are improbable, not impossible.
    pub id: String,
    pub device_mac: Option<String>,
    #[serde(rename = "type")]
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        device_mac: Option<String>,
        category: AlertCategory,
        severity: AlertSeverity,
        message: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_alert_id(),
            device_mac,
            category,
            severity,
            message,
            timestamp,
            acknowledged: false,
        }
    }
}

/// UUIDv7: millisecond timestamp prefix plus random bits.
pub(crate) fn new_alert_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Alert {
        Alert::new(
            Some("AA:BB:CC:DD:EE:01".into()),
            AlertCategory::Ph,
            AlertSeverity::Critical,
            "pH critical: 9.5".into(),
            "2026-03-01T08:30:00Z".parse().unwrap(),
        )
    }

    #[test]
    fn new_alert_is_unacknowledged() {
        assert!(!sample().acknowledged);
    }

    #[test]
    fn serde_round_trip_preserves_every_field() {
        let alert = sample();
        let json = serde_json::to_string(&alert).unwrap();
        let back: Alert = serde_json::from_str(&json).unwrap();

        assert_eq!(back, alert);
        assert!(!back.acknowledged);
    }

    #[test]
    fn wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["type"], "ph");
        assert_eq!(value["severity"], "critical");
        assert_eq!(value["deviceMac"], "AA:BB:CC:DD:EE:01");
        assert_eq!(value["acknowledged"], false);
    }

    #[test]
    fn ids_are_distinct() {
        let a = sample();
        let b = sample();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn category_parsing_is_case_insensitive() {
        assert_eq!(AlertCategory::from_str("pH").unwrap(), AlertCategory::Ph);
        assert_eq!(AlertCategory::from_str("OXYGEN").unwrap(), AlertCategory::Oxygen);
        assert!(AlertCategory::from_str("salinity").is_err());
    }
}
