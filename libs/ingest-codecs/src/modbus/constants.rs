//! MODBUS protocol constants
//!
//! - Maximum PDU size: 253 bytes (RS485 ADU limit of 256 minus address and CRC)
//! - Register/coil limits are derived from the PDU size

// ============================================================================
// Frame Size Constants
// ============================================================================

/// MBAP header length including the unit identifier
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1) = 7 bytes
pub const MBAP_HEADER_LEN: usize = 7;

/// Maximum PDU (function code + data) size
pub const MAX_PDU_SIZE: usize = 253;

/// Minimum TCP response: MBAP header + function code
pub const MIN_TCP_FRAME: usize = MBAP_HEADER_LEN + 1;

/// Minimum RTU response: unit + function code + CRC
pub const MIN_RTU_FRAME: usize = 4;

/// RTU CRC trailer length
pub const CRC_LEN: usize = 2;

/// High bit of the function code marks an exception response
pub const EXCEPTION_BIT: u8 = 0x80;

// ============================================================================
// Operation Limits
// ============================================================================

/// FC03/FC04: 1 + 1 + (N × 2) ≤ 253 → N ≤ 125
pub const MODBUS_MAX_READ_REGISTERS: u16 = 125;

/// FC16: 1 + 2 + 2 + 1 + (N × 2) ≤ 253 → N ≤ 123
pub const MODBUS_MAX_WRITE_REGISTERS: u16 = 123;

/// FC01/FC02: 1 + 1 + ceil(N / 8) ≤ 253 → N ≤ 2000 (spec limit)
pub const MODBUS_MAX_READ_COILS: u16 = 2000;
