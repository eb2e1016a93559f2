//! Byte-exact ingest codecs
//!
//! Turns raw byte streams from field devices and mainframe batch feeds into
//! typed records. Codecs are feature-gated for selective compilation.
//!
//! # Features
//!
//! - `modbus` - MODBUS TCP/RTU request encoding, response decoding, CRC16
//! - `mqtt` - MQTT 3.1.1 control packets and remaining-length varint
//! - `serial` - RS-485 sensor packet framer and typed readings
//! - `serial-port` - open RS-485 ports through tokio-serial
//! - `mainframe` - EBCDIC fixed-width records (TEXT, ZONED, COMP-3, BINARY)
//!
//! # Architecture
//!
//! ```text
//! ingest-codecs
//!     ├── transport (Transport trait, IoTransport over any tokio stream)
//!     ├── modbus   (encode_request / decode_response / ModbusClient)
//!     ├── mqtt     (varint, packet encoders, parse_packet, MqttSession)
//!     ├── serial   (SerialPacketFramer state machine, ReadingRegistry)
//!     └── mainframe(CP037 table, decode_record, decode_batch, StoredBatch)
//! ```
//!
//! The codecs are independent leaves; none calls another. Typed records own
//! their bytes and never alias the buffer they were decoded from.

pub mod error;
pub mod transport;

#[cfg(feature = "modbus")]
pub mod modbus;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "mainframe")]
pub mod mainframe;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{CodecError, Result};
pub use transport::{IoTransport, Transport, TransportError};
