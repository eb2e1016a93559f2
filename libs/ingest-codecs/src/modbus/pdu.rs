//! MODBUS PDU builders and response views

use super::constants::{MODBUS_MAX_READ_COILS, MODBUS_MAX_READ_REGISTERS, MODBUS_MAX_WRITE_REGISTERS};
use super::frame::ModbusRequest;
use crate::error::{CodecError, Result};

/// Supported function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
    WriteMultipleCoils = 0x0F,
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::ReadCoils),
            0x02 => Some(Self::ReadDiscreteInputs),
            0x03 => Some(Self::ReadHoldingRegisters),
            0x04 => Some(Self::ReadInputRegisters),
            0x05 => Some(Self::WriteSingleCoil),
            0x06 => Some(Self::WriteSingleRegister),
            0x0F => Some(Self::WriteMultipleCoils),
            0x10 => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Read responses carry a byte count followed by data
    pub fn has_byte_count(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

/// Exception codes returned by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    NegativeAcknowledge,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailed,
    Unknown(u8),
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x07 => Self::NegativeAcknowledge,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetFailed,
            other => Self::Unknown(other),
        }
    }
}

impl ExceptionCode {
    pub fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::ServerDeviceFailure => "Slave Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Slave Device Busy",
            Self::NegativeAcknowledge => "Negative Acknowledge",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetFailed => "Gateway Target Device Failed to Respond",
            Self::Unknown(_) => "Unknown Exception",
        }
    }
}

// ============================================================================
// Request builders
// ============================================================================

fn check_quantity(function: FunctionCode, quantity: u16, max: u16) -> Result<()> {
    if quantity == 0 || quantity > max {
        return Err(CodecError::Protocol(format!(
            "{}: quantity {} out of range 1..={}",
            function.description(),
            quantity,
            max
        )));
    }
    Ok(())
}

fn read_request(
    unit_id: u8,
    function: FunctionCode,
    start: u16,
    quantity: u16,
    max: u16,
) -> Result<ModbusRequest> {
    check_quantity(function, quantity, max)?;
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&start.to_be_bytes());
    payload.extend_from_slice(&quantity.to_be_bytes());
    Ok(ModbusRequest::new(unit_id, function.code(), payload))
}

/// FC01
pub fn read_coils(unit_id: u8, start: u16, quantity: u16) -> Result<ModbusRequest> {
    read_request(unit_id, FunctionCode::ReadCoils, start, quantity, MODBUS_MAX_READ_COILS)
}

/// FC02
pub fn read_discrete_inputs(unit_id: u8, start: u16, quantity: u16) -> Result<ModbusRequest> {
    read_request(
        unit_id,
        FunctionCode::ReadDiscreteInputs,
        start,
        quantity,
        MODBUS_MAX_READ_COILS,
    )
}

/// FC03
pub fn read_holding_registers(unit_id: u8, start: u16, quantity: u16) -> Result<ModbusRequest> {
    read_request(
        unit_id,
        FunctionCode::ReadHoldingRegisters,
        start,
        quantity,
        MODBUS_MAX_READ_REGISTERS,
    )
}

/// FC04
pub fn read_input_registers(unit_id: u8, start: u16, quantity: u16) -> Result<ModbusRequest> {
    read_request(
        unit_id,
        FunctionCode::ReadInputRegisters,
        start,
        quantity,
        MODBUS_MAX_READ_REGISTERS,
    )
}

/// FC05: ON is encoded as 0xFF00, OFF as 0x0000
pub fn write_single_coil(unit_id: u8, address: u16, on: bool) -> ModbusRequest {
    let value: u16 = if on { 0xFF00 } else { 0x0000 };
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&address.to_be_bytes());
    payload.extend_from_slice(&value.to_be_bytes());
    ModbusRequest::new(unit_id, FunctionCode::WriteSingleCoil.code(), payload)
}

/// FC06
pub fn write_single_register(unit_id: u8, address: u16, value: u16) -> ModbusRequest {
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&address.to_be_bytes());
    payload.extend_from_slice(&value.to_be_bytes());
    ModbusRequest::new(unit_id, FunctionCode::WriteSingleRegister.code(), payload)
}

/// FC16
pub fn write_multiple_registers(unit_id: u8, start: u16, values: &[u16]) -> Result<ModbusRequest> {
    let quantity = u16::try_from(values.len()).unwrap_or(u16::MAX);
    check_quantity(
        FunctionCode::WriteMultipleRegisters,
        quantity,
        MODBUS_MAX_WRITE_REGISTERS,
    )?;

    let mut payload = Vec::with_capacity(5 + values.len() * 2);
    payload.extend_from_slice(&start.to_be_bytes());
    payload.extend_from_slice(&quantity.to_be_bytes());
    payload.push((values.len() * 2) as u8);
    for value in values {
        payload.extend_from_slice(&value.to_be_bytes());
    }
    Ok(ModbusRequest::new(
        unit_id,
        FunctionCode::WriteMultipleRegisters.code(),
        payload,
    ))
}

// ============================================================================
// RegisterBank
// ============================================================================

/// Registers returned by FC03/FC04, addressed from `base_address`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    base_address: u16,
    words: Vec<u16>,
}

impl RegisterBank {
    /// Build from a read-register response payload (`byte_count` then data)
    pub fn from_response(base_address: u16, payload: &[u8]) -> Result<Self> {
        let (&byte_count, data) = payload
            .split_first()
            .ok_or(CodecError::FrameTooShort {
                needed: 1,
                actual: 0,
            })?;
        let byte_count = usize::from(byte_count);

        if byte_count % 2 != 0 {
            return Err(CodecError::Protocol(format!(
                "Register byte count must be even, got {}",
                byte_count
            )));
        }
        if data.len() != byte_count {
            return Err(CodecError::Protocol(format!(
                "Byte count {} disagrees with {} data bytes",
                byte_count,
                data.len()
            )));
        }

        let words = data
            .chunks_exact(2)
            .map(|pair| (u16::from(pair[0]) << 8) | u16::from(pair[1]))
            .collect();
        Ok(Self {
            base_address,
            words,
        })
    }

    pub fn base_address(&self) -> u16 {
        self.base_address
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    fn index(&self, address: u16, count: usize) -> Result<usize> {
        let index = usize::from(address.wrapping_sub(self.base_address));
        if address < self.base_address || index + count > self.words.len() {
            return Err(CodecError::Protocol(format!(
                "Register {} outside bank {}..{}",
                address,
                self.base_address,
                usize::from(self.base_address) + self.words.len()
            )));
        }
        Ok(index)
    }

    /// Single register value
    pub fn register(&self, address: u16) -> Result<u16> {
        let i = self.index(address, 1)?;
        Ok(self.words[i])
    }

    /// Two registers, high word first
    pub fn u32_at(&self, address: u16) -> Result<u32> {
        let i = self.index(address, 2)?;
        Ok((u32::from(self.words[i]) << 16) | u32::from(self.words[i + 1]))
    }

    pub fn i32_at(&self, address: u16) -> Result<i32> {
        Ok(self.u32_at(address)? as i32)
    }

    /// IEEE-754 float across two registers, high word first
    pub fn f32_at(&self, address: u16) -> Result<f32> {
        Ok(f32::from_bits(self.u32_at(address)?))
    }
}
