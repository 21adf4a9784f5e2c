// ── Threshold rules ──
//
// Two independent rule tables run over every reading:
//
// - status: soft bands; the number of simultaneous violations picks
//   normal / warning / critical. Never produces an alert on its own.
// - alerts: hard bands; each violated rule yields one critical alert.
//
// Every alert band lies strictly outside the matching status band, so a
// reading that trips an alert rule always counts as a status issue too.

use crate::model::{Alert, AlertCategory, AlertSeverity, SensorReading, SensorStatus, SensorValues};

// ── Status bands ─────────────────────────────────────────────────────

pub const STATUS_TEMPERATURE_RANGE: (f64, f64) = (18.0, 28.0);
pub const STATUS_PH_RANGE: (f64, f64) = (6.5, 8.5);
pub const STATUS_MIN_OXYGEN: f64 = 5.0;
pub const STATUS_MAX_AMMONIA: f64 = 0.5;

const STATUS_CHECKS: [fn(&SensorValues) -> bool; 4] = [
    |v| outside(v.temperature, STATUS_TEMPERATURE_RANGE),
    |v| outside(v.ph, STATUS_PH_RANGE),
    |v| v.dissolved_oxygen < STATUS_MIN_OXYGEN,
    |v| v.ammonia > STATUS_MAX_AMMONIA,
];

fn outside(value: f64, (low, high): (f64, f64)) -> bool {
    value < low || value > high
}

/// Number of soft thresholds the reading violates.
pub fn status_issue_count(values: &SensorValues) -> usize {
    STATUS_CHECKS.iter().filter(|check| check(values)).count()
}

/// 0 issues → normal, 1–2 → warning, 3+ → critical.
pub fn determine_sensor_status(values: &SensorValues) -> SensorStatus {
    match status_issue_count(values) {
        0 => SensorStatus::Normal,
        1 | 2 => SensorStatus::Warning,
        _ => SensorStatus::Critical,
    }
}

// ── Alert rules ──────────────────────────────────────────────────────

pub const ALERT_TEMPERATURE_RANGE: (f64, f64) = (15.0, 32.0);
pub const ALERT_PH_RANGE: (f64, f64) = (6.0, 9.0);
pub const ALERT_MIN_OXYGEN: f64 = 3.0;
pub const ALERT_MAX_AMMONIA: f64 = 1.0;

/// One hard threshold. Evaluated in table order.
pub struct AlertRule {
    pub category: AlertCategory,
    pub violated: fn(&SensorValues) -> bool,
    describe: fn(&SensorValues) -> String,
}

pub const ALERT_RULES: [AlertRule; 4] = [
    AlertRule {
        category: AlertCategory::Temperature,
        violated: |v| outside(v.temperature, ALERT_TEMPERATURE_RANGE),
        describe: |v| format!("Temperature critical: {:.1}°C", v.temperature),
    },
    AlertRule {
        category: AlertCategory::Ph,
        violated: |v| outside(v.ph, ALERT_PH_RANGE),
        describe: |v| format!("pH critical: {:.2}", v.ph),
    },
    AlertRule {
        category: AlertCategory::Oxygen,
        violated: |v| v.dissolved_oxygen < ALERT_MIN_OXYGEN,
        describe: |v| format!("Dissolved oxygen critical: {:.1} mg/L", v.dissolved_oxygen),
    },
    AlertRule {
        category: AlertCategory::Ammonia,
        violated: |v| v.ammonia > ALERT_MAX_AMMONIA,
        describe: |v| format!("Ammonia critical: {:.2} mg/L", v.ammonia),
    },
];

/// Every alert the reading triggers, in rule order
/// (temperature, ph, oxygen, ammonia). All are `critical`.
pub fn check_for_alerts(reading: &SensorReading) -> Vec<Alert> {
    ALERT_RULES
        .iter()
        .filter(|rule| (rule.violated)(&reading.values))
        .map(|rule| {
            Alert::new(
                reading.device_mac.clone(),
                rule.category,
                AlertSeverity::Critical,
                (rule.describe)(&reading.values),
                reading.timestamp,
            )
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────
