// ── Domain model ──
//
// Canonical entities emitted to listeners. Wire payloads from aquamon-api
// are converted into these by `crate::classify`.

pub mod alert;
pub mod device;
pub mod event;
pub mod sensor;

pub use alert::{Alert, AlertCategory, AlertSeverity};
pub use device::{DeviceState, DeviceStatus, Heartbeat};
pub use event::{ConnectionEvent, ConnectionStatus, EventKind, RealtimeEvent};
pub use sensor::{SensorReading, SensorStatus, SensorValues};
