// ── Wire → domain classification ──
//
// Maps one validated `InboundMessage` onto the events to publish, in
// publication order. Pure: no I/O, no listeners, no connection state.

use std::str::FromStr;

use aquamon_api::{AlertPayload, InboundMessage, Payload};

use crate::error::CoreError;
use crate::model::{
    Alert, AlertCategory, AlertSeverity, DeviceState, DeviceStatus, Heartbeat, RealtimeEvent,
    SensorReading, SensorValues,
};
use crate::rules::check_for_alerts;

const DEFAULT_HEARTBEAT_STATUS: &str = "alive";

/// Events produced by one inbound message.
///
/// `sensor_data` yields the reading followed by one alert per violated
/// hard threshold. Every other kind yields exactly one event.
pub fn classify(msg: InboundMessage) -> Result<Vec<RealtimeEvent>, CoreError> {
    let InboundMessage {
        timestamp,
        device_mac,
        payload,
    } = msg;

    let events = match payload {
        Payload::SensorData(p) => {
            let reading = SensorReading::new(device_mac, timestamp, SensorValues::from(&p));
            let alerts = check_for_alerts(&reading);
            std::iter::once(RealtimeEvent::SensorData(reading))
                .chain(alerts.into_iter().map(RealtimeEvent::Alert))
                .collect()
        }
        Payload::DeviceStatus(p) => vec![RealtimeEvent::DeviceStatus(DeviceStatus {
            device_mac,
            state: DeviceState::parse_lenient(&p.status),
            timestamp,
            details: p.details,
        })],
        Payload::Alert(p) => vec![RealtimeEvent::Alert(device_alert(p, device_mac, timestamp)?)],
        Payload::Heartbeat(p) => vec![RealtimeEvent::Heartbeat(Heartbeat {
            device_mac,
            timestamp,
            status: p
                .status
                .unwrap_or_else(|| DEFAULT_HEARTBEAT_STATUS.to_owned()),
        })],
    };

    Ok(events)
}

/// Normalize a device-raised alert. The category set is closed.
fn device_alert(
    p: AlertPayload,
    device_mac: Option<String>,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Result<Alert, CoreError> {
    let category = AlertCategory::from_str(&p.category).map_err(|_| CoreError::InvalidField {
        field: "alert category".into(),
        reason: format!(
            "expected temperature, ph, oxygen or ammonia, got '{}'",
            p.category
        ),
    })?;

    let severity = match p.severity.as_deref() {
        None => AlertSeverity::Critical,
        Some(raw) => AlertSeverity::from_str(raw).map_err(|_| CoreError::InvalidField {
            field: "alert severity".into(),
            reason: format!("expected info, warning or critical, got '{raw}'"),
        })?,
    };

    let mut alert = Alert::new(device_mac, category, severity, p.message, timestamp);
    if let Some(id) = p.id.filter(|id| !id.is_empty()) {
        alert.id = id;
    }
    Ok(alert)
}

// ── Tests ────────────────────────────────────────────────────────────
