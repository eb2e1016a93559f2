use bytes::Bytes;
use serde::Serialize;

/// Sensor families deployed on the RS-485 bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Pressure,
    Flow,
    Vibration,
}

impl SensorKind {
    pub fn from_type(sensor_type: u8) -> Option<Self> {
        match sensor_type {
            0x01 => Some(Self::Temperature),
            0x02 => Some(Self::Pressure),
            0x03 => Some(Self::Flow),
            0x04 => Some(Self::Vibration),
            _ => None,
        }
    }

    pub fn type_byte(self) -> u8 {
        match self {
            Self::Temperature => 0x01,
            Self::Pressure => 0x02,
            Self::Flow => 0x03,
            Self::Vibration => 0x04,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Pressure => "Pressure",
            Self::Flow => "Flow",
            Self::Vibration => "Vibration",
        }
    }
}

/// A checksum-validated sensor packet
///
/// Only the framer constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorPacket {
    sensor_id: u16,
    sensor_type: u8,
    payload: Bytes,
}

impl SensorPacket {
    pub(crate) fn new(sensor_id: u16, sensor_type: u8, payload: Bytes) -> Self {
        Self {
            sensor_id,
            sensor_type,
            payload,
        }
    }

    pub fn sensor_id(&self) -> u16 {
        self.sensor_id
    }

    pub fn sensor_type(&self) -> u8 {
        self.sensor_type
    }

    pub fn kind(&self) -> Option<SensorKind> {
        SensorKind::from_type(self.sensor_type)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
