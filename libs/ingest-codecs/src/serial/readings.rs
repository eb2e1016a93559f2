//! Typed sensor readings
//!
//! Decoders are looked up by sensor type byte in an explicit registry built
//! at construction. Unknown types and short payloads yield no reading.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::packet::{SensorKind, SensorPacket};

/// Payload decoder for one sensor type
pub type DecodeFn = fn(&[u8]) -> Option<Reading>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reading {
    Temperature { celsius: f64 },
    Pressure { pascal: u32 },
    Flow { litres_per_minute: f32 },
    Vibration { frequency_hz: u16, amplitude_mm_s: f64 },
}

fn decode_temperature(payload: &[u8]) -> Option<Reading> {
    let raw = i16::from_be_bytes(payload.get(..2)?.try_into().ok()?);
    Some(Reading::Temperature {
        celsius: f64::from(raw) / 10.0,
    })
}

fn decode_pressure(payload: &[u8]) -> Option<Reading> {
    let raw = u32::from_be_bytes(payload.get(..4)?.try_into().ok()?);
    Some(Reading::Pressure { pascal: raw })
}

fn decode_flow(payload: &[u8]) -> Option<Reading> {
    let raw = f32::from_be_bytes(payload.get(..4)?.try_into().ok()?);
    Some(Reading::Flow {
        litres_per_minute: raw,
    })
}

fn decode_vibration(payload: &[u8]) -> Option<Reading> {
    let frequency_hz = u16::from_be_bytes(payload.get(..2)?.try_into().ok()?);
    let amplitude = u16::from_be_bytes(payload.get(2..4)?.try_into().ok()?);
    Some(Reading::Vibration {
        frequency_hz,
        amplitude_mm_s: f64::from(amplitude) / 100.0,
    })
}

/// Sensor type byte to decoder
#[derive(Debug, Clone, Default)]
pub struct ReadingRegistry {
    decoders: HashMap<u8, DecodeFn>,
}

impl ReadingRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with decoders for every [`SensorKind`]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SensorKind::Temperature.type_byte(), decode_temperature);
        registry.register(SensorKind::Pressure.type_byte(), decode_pressure);
        registry.register(SensorKind::Flow.type_byte(), decode_flow);
        registry.register(SensorKind::Vibration.type_byte(), decode_vibration);
        registry
    }

    /// Register or replace the decoder for a type byte
    pub fn register(&mut self, sensor_type: u8, decode: DecodeFn) -> &mut Self {
        self.decoders.insert(sensor_type, decode);
        self
    }

    pub fn contains(&self, sensor_type: u8) -> bool {
        self.decoders.contains_key(&sensor_type)
    }

    pub fn decode(&self, packet: &SensorPacket) -> Option<Reading> {
        let decode = self.decoders.get(&packet.sensor_type())?;
        decode(packet.payload())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SensorSummary {
    pub sensor_type: u8,
    pub packets: u64,
    pub malformed: u64,
}

/// Per-sensor packet counts
#[derive(Debug, Clone, Default)]
pub struct SensorTally {
    sensors: BTreeMap<u16, SensorSummary>,
}

impl SensorTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet(&mut self, packet: &SensorPacket) {
        let entry = self.entry(packet.sensor_id(), packet.sensor_type());
        entry.packets += 1;
    }

    pub fn record_malformed(&mut self, sensor_id: u16, sensor_type: u8) {
        let entry = self.entry(sensor_id, sensor_type);
        entry.malformed += 1;
    }

    /// Summaries ordered by sensor id
    pub fn iter(&self) -> impl Iterator<Item = (u16, &SensorSummary)> {
        self.sensors.iter().map(|(id, summary)| (*id, summary))
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    fn entry(&mut self, sensor_id: u16, sensor_type: u8) -> &mut SensorSummary {
        self.sensors.entry(sensor_id).or_insert(SensorSummary {
            sensor_type,
            ..SensorSummary::default()
        })
    }
}
