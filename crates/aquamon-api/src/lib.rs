// aquamon-api: wire envelope and transport layer for aquaponics telemetry streams

pub mod envelope;
pub mod error;
pub mod transport;
pub mod websocket;

pub use envelope::{
    AlertPayload, DeviceStatusPayload, Envelope, HeartbeatPayload, InboundMessage, MessageKind,
    Payload, SensorPayload,
};
pub use error::Error;
pub use transport::{Transport, TransportEvent, TransportEvents, TransportLink};
pub use websocket::WebSocketTransport;
