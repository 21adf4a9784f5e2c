//! Simulated ESP32 sensor fleet.
//!
//! Each device walks its seven channels randomly inside healthy bands,
//! pulled gently toward a nominal value. An optional excursion rate
//! occasionally throws one channel of one device into alarm range for a
//! single round so alert handling can be exercised end to end.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

use aquamon_api::{DeviceStatusPayload, HeartbeatPayload, InboundMessage, Payload, SensorPayload};

/// One sensor channel's random-walk parameters.
#[derive(Debug, Clone, Copy)]
struct Band {
    min: f64,
    max: f64,
    nominal: f64,
    step: f64,
}

const fn band(min: f64, max: f64, nominal: f64, step: f64) -> Band {
    Band {
        min,
        max,
        nominal,
        step,
    }
}

// Walks stay inside the status bands, so undisturbed readings are `normal`.
const TEMPERATURE: Band = band(19.0, 27.0, 24.0, 0.3);
const PH: Band = band(6.7, 8.2, 7.2, 0.05);
const OXYGEN: Band = band(5.5, 9.0, 7.2, 0.2);
const TURBIDITY: Band = band(1.0, 10.0, 4.0, 0.3);
const AMMONIA: Band = band(0.0, 0.45, 0.1, 0.02);
const NITRITE: Band = band(0.0, 0.5, 0.1, 0.02);
const NITRATE: Band = band(5.0, 40.0, 20.0, 1.0);

const PULL: f64 = 0.05;

/// Channels an excursion can hit, with the out-of-range value it jumps to.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Excursion {
    HotWater,
    ColdWater,
    Acidic,
    Alkaline,
    LowOxygen,
    AmmoniaSpike,
}

impl Excursion {
    const ALL: [Self; 6] = [
        Self::HotWater,
        Self::ColdWater,
        Self::Acidic,
        Self::Alkaline,
        Self::LowOxygen,
        Self::AmmoniaSpike,
    ];

    fn apply(self, s: &mut SensorPayload) {
        match self {
            Self::HotWater => s.temperature = 33.5,
            Self::ColdWater => s.temperature = 13.5,
            Self::Acidic => s.ph = 5.6,
            Self::Alkaline => s.ph = 9.4,
            Self::LowOxygen => s.dissolved_oxygen = 2.4,
            Self::AmmoniaSpike => s.ammonia = 1.6,
        }
    }
}

#[derive(Debug, Clone)]
struct Device {
    mac: String,
    state: SensorPayload,
}

impl Device {
    fn new(mac: String) -> Self {
        Self {
            mac,
            state: SensorPayload {
                temperature: TEMPERATURE.nominal,
                ph: PH.nominal,
                dissolved_oxygen: OXYGEN.nominal,
                turbidity: TURBIDITY.nominal,
                ammonia: AMMONIA.nominal,
                nitrite: NITRITE.nominal,
                nitrate: NITRATE.nominal,
                device_mac: None,
            },
        }
    }
}

fn walk(rng: &mut StdRng, value: f64, b: Band) -> f64 {
    let drift = rng.gen_range(-b.step..=b.step) + (b.nominal - value) * PULL;
    round2((value + drift).clamp(b.min, b.max))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// A fleet of simulated devices sharing one RNG.
#[derive(Debug)]
pub struct Fleet {
    devices: Vec<Device>,
    rng: StdRng,
    excursion_rate: f64,
    heartbeat_every: u64,
    round: u64,
}

impl Fleet {
    /// `excursion_rate` must be within `0.0..=1.0`; `heartbeat_every` of 0
    /// disables heartbeats.
    pub fn new(
        macs: &[String],
        seed: Option<u64>,
        excursion_rate: f64,
        heartbeat_every: u32,
    ) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            devices: macs.iter().cloned().map(Device::new).collect(),
            rng,
            excursion_rate: excursion_rate.clamp(0.0, 1.0),
            heartbeat_every: u64::from(heartbeat_every),
            round: 0,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Advance one round: a reading per device, then heartbeats when due.
    pub fn tick(&mut self) -> Vec<InboundMessage> {
        self.round += 1;

        for device in &mut self.devices {
            let s = &mut device.state;
            s.temperature = walk(&mut self.rng, s.temperature, TEMPERATURE);
            s.ph = walk(&mut self.rng, s.ph, PH);
            s.dissolved_oxygen = walk(&mut self.rng, s.dissolved_oxygen, OXYGEN);
            s.turbidity = walk(&mut self.rng, s.turbidity, TURBIDITY);
            s.ammonia = walk(&mut self.rng, s.ammonia, AMMONIA);
            s.nitrite = walk(&mut self.rng, s.nitrite, NITRITE);
            s.nitrate = walk(&mut self.rng, s.nitrate, NITRATE);
        }

        let mut readings: Vec<SensorPayload> =
            self.devices.iter().map(|d| d.state.clone()).collect();

        // Excursions touch the emitted copy only; the walk carries on from
        // the healthy value next round.
        if !readings.is_empty() && self.rng.gen_bool(self.excursion_rate) {
            let target = self.rng.gen_range(0..readings.len());
            let kind = Excursion::ALL[self.rng.gen_range(0..Excursion::ALL.len())];
            if let Some(reading) = readings.get_mut(target) {
                kind.apply(reading);
            }
        }

        let mut out: Vec<InboundMessage> = self
            .devices
            .iter()
            .zip(readings)
            .map(|(d, r)| InboundMessage::now(Some(d.mac.clone()), Payload::SensorData(r)))
            .collect();

        if self.heartbeat_every > 0 && self.round % self.heartbeat_every == 0 {
            out.extend(self.devices.iter().map(|d| {
                InboundMessage::now(
                    Some(d.mac.clone()),
                    Payload::Heartbeat(HeartbeatPayload {
                        status: Some("alive".into()),
                        ..HeartbeatPayload::default()
                    }),
                )
            }));
        }

        out
    }
}

/// `device_status: online` for each device, sent to every new client.
pub fn online_messages(macs: &[String]) -> Vec<InboundMessage> {
    macs.iter()
        .map(|mac| {
            let mut details = Map::new();
            details.insert("firmware".into(), Value::from("sim-1.0"));
            InboundMessage::now(
                Some(mac.clone()),
                Payload::DeviceStatus(DeviceStatusPayload {
                    status: "online".into(),
                    device_mac: None,
                    details,
                }),
            )
        })
        .collect()
}
