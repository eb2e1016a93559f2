//! MODBUS TCP and RTU codec
//!
//! Builds request ADUs and parses response ADUs for a request/response
//! master. Supports:
//! - MBAP framing (TCP) and CRC16 framing (RTU)
//! - Function codes FC01-06, FC15-16 request builders
//! - Exception responses surfaced as [`CodecError::ModbusException`]
//!
//! # Architecture
//!
//! ```text
//! modbus
//!     ├── crc       (CRC16, integer shifts only)
//!     ├── frame     (encode_request / decode_response, MBAP header)
//!     ├── pdu       (request builders, RegisterBank, exception codes)
//!     └── client    (ModbusClient over one Transport)
//! ```
//!
//! [`CodecError::ModbusException`]: crate::CodecError::ModbusException

mod client;
mod constants;
mod crc;
mod frame;
mod pdu;

pub use client::ModbusClient;
pub use constants::{
    EXCEPTION_BIT, MAX_PDU_SIZE, MBAP_HEADER_LEN, MODBUS_MAX_READ_COILS,
    MODBUS_MAX_READ_REGISTERS, MODBUS_MAX_WRITE_REGISTERS,
};
pub use crc::crc16;
pub use frame::{decode_response, encode_request, FrameMode, Framing, MbapHeader, ModbusRequest, ModbusResponse};
pub use pdu::{
    read_coils, read_discrete_inputs, read_holding_registers, read_input_registers,
    write_multiple_registers, write_single_coil, write_single_register, ExceptionCode,
    FunctionCode, RegisterBank,
};
