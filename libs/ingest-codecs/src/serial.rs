//! RS-485 sensor packet framer
//!
//! Frame layout:
//!
//! ```text
//! sync(0xAA) | len | sensor_id (u16 BE) | sensor_type | payload[len] | xor
//! ```
//!
//! The framer is an explicit pull-based state machine bound to one stream.
//! Checksum failures are reported as events and the framer resynchronizes;
//! the stream ending inside a frame is an error.

mod framer;
mod packet;
#[cfg(feature = "serial-port")]
mod port;
mod readings;

pub use framer::{
    ChecksumMode, FramerConfig, FramerEvent, FramerState, FramerStats, MalformedPacket,
    SerialPacketFramer, DEFAULT_SYNC_BYTE,
};
pub use packet::{SensorKind, SensorPacket};
#[cfg(feature = "serial-port")]
pub use port::{open_serial, Parity, SerialPortParams};
pub use readings::{DecodeFn, Reading, ReadingRegistry, SensorSummary, SensorTally};
