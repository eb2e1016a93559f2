//! MODBUS ADU framing
//!
//! TCP frames carry an MBAP header, RTU frames a little-endian CRC16 trailer.

use tracing::debug;

use super::constants::{
    CRC_LEN, EXCEPTION_BIT, MAX_PDU_SIZE, MBAP_HEADER_LEN, MIN_RTU_FRAME, MIN_TCP_FRAME,
};
use super::crc::crc16;
use crate::error::{CodecError, Result};

/// Framing used when encoding a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// MBAP header with the given transaction identifier
    Tcp { transaction_id: u16 },
    /// Unit + PDU + CRC16
    Rtu,
}

/// Framing expected when decoding a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    Tcp,
    Rtu,
}

impl From<Framing> for FrameMode {
    fn from(framing: Framing) -> Self {
        match framing {
            Framing::Tcp { .. } => FrameMode::Tcp,
            Framing::Rtu => FrameMode::Rtu,
        }
    }
}

/// MODBUS request: unit, function code and data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub unit_id: u8,
    pub function_code: u8,
    pub payload: Vec<u8>,
}

impl ModbusRequest {
    pub fn new(unit_id: u8, function_code: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            unit_id,
            function_code,
            payload: payload.into(),
        }
    }

    /// PDU length (function code + payload)
    pub fn pdu_len(&self) -> usize {
        1 + self.payload.len()
    }
}

/// Decoded, validated MODBUS response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    /// Present for TCP framing
    pub transaction_id: Option<u16>,
    pub unit_id: u8,
    pub function_code: u8,
    pub payload: Vec<u8>,
    /// Present for RTU framing, already verified
    pub crc: Option<u16>,
}

/// Modbus TCP MBAP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier
    pub transaction_id: u16,
    /// Protocol identifier (fixed to 0)
    pub protocol_id: u16,
    /// Length field: unit id + PDU
    pub length: u16,
    /// Unit identifier (slave ID)
    pub unit_id: u8,
}

impl MbapHeader {
    /// Parse the first 7 bytes of a TCP frame
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MBAP_HEADER_LEN {
            return Err(CodecError::FrameTooShort {
                needed: MBAP_HEADER_LEN,
                actual: data.len(),
            });
        }

        let header = Self {
            transaction_id: u16::from_be_bytes([data[0], data[1]]),
            protocol_id: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            unit_id: data[6],
        };

        debug!(
            "MBAP header: trans_id={:04X}, protocol_id={:04X}, length={}, unit_id={}",
            header.transaction_id, header.protocol_id, header.length, header.unit_id
        );

        if header.protocol_id != 0 {
            return Err(CodecError::Protocol(format!(
                "Invalid protocol ID: expected 0, got {}",
                header.protocol_id
            )));
        }
        if header.length < 2 || usize::from(header.length) > 1 + MAX_PDU_SIZE {
            return Err(CodecError::Protocol(format!(
                "Invalid MBAP length field: {}",
                header.length
            )));
        }

        Ok(header)
    }

    /// Bytes that follow the header: the PDU
    pub fn pdu_len(&self) -> usize {
        usize::from(self.length) - 1
    }
}

/// Encode a request ADU
pub fn encode_request(request: &ModbusRequest, framing: Framing) -> Result<Vec<u8>> {
    let pdu_len = request.pdu_len();
    if pdu_len > MAX_PDU_SIZE {
        return Err(CodecError::Protocol(format!(
            "PDU too large: {} bytes (max {})",
            pdu_len, MAX_PDU_SIZE
        )));
    }

    match framing {
        Framing::Tcp { transaction_id } => {
            let length = (pdu_len + 1) as u16; // PDU length + unit_id

            let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + pdu_len);
            frame.extend_from_slice(&transaction_id.to_be_bytes());
            frame.extend_from_slice(&0u16.to_be_bytes()); // protocol_id
            frame.extend_from_slice(&length.to_be_bytes());
            frame.push(request.unit_id);
            frame.push(request.function_code);
            frame.extend_from_slice(&request.payload);

            debug!(
                "Building TCP frame: trans_id={:04X}, unit_id={}, FC={:02X}, PDU_len={}",
                transaction_id, request.unit_id, request.function_code, pdu_len
            );
            Ok(frame)
        },
        Framing::Rtu => {
            let mut frame = Vec::with_capacity(1 + pdu_len + CRC_LEN);
            frame.push(request.unit_id);
            frame.push(request.function_code);
            frame.extend_from_slice(&request.payload);

            let crc = crc16(&frame);
            frame.extend_from_slice(&crc.to_le_bytes());

            debug!(
                "Building RTU frame: unit_id={}, FC={:02X}, PDU_len={}, CRC={:04X}",
                request.unit_id, request.function_code, pdu_len, crc
            );
            Ok(frame)
        },
    }
}

/// Decode a complete response ADU
///
/// Exception responses (function code high bit set) fail with
/// [`CodecError::ModbusException`] after framing and CRC are validated.
pub fn decode_response(data: &[u8], mode: FrameMode) -> Result<ModbusResponse> {
    debug!("Parsing {:?} frame: {} bytes", mode, data.len());

    let response = match mode {
        FrameMode::Tcp => {
            if data.len() < MIN_TCP_FRAME {
                return Err(CodecError::FrameTooShort {
                    needed: MIN_TCP_FRAME,
                    actual: data.len(),
                });
            }
            let header = MbapHeader::parse(data)?;
            let expected_len = MBAP_HEADER_LEN - 1 + usize::from(header.length);
            if data.len() != expected_len {
                return Err(CodecError::Protocol(format!(
                    "Invalid TCP frame length: expected {}, got {}",
                    expected_len,
                    data.len()
                )));
            }

            ModbusResponse {
                transaction_id: Some(header.transaction_id),
                unit_id: header.unit_id,
                function_code: data[MBAP_HEADER_LEN],
                payload: data[MBAP_HEADER_LEN + 1..].to_vec(),
                crc: None,
            }
        },
        FrameMode::Rtu => {
            if data.len() < MIN_RTU_FRAME {
                return Err(CodecError::FrameTooShort {
                    needed: MIN_RTU_FRAME,
                    actual: data.len(),
                });
            }
            let body_len = data.len() - CRC_LEN;
            let received_crc = u16::from_le_bytes([data[body_len], data[body_len + 1]]);
            let calculated_crc = crc16(&data[..body_len]);
            if received_crc != calculated_crc {
                return Err(CodecError::ChecksumMismatch {
                    expected: calculated_crc,
                    actual: received_crc,
                });
            }
            debug!("CRC validation successful");

            ModbusResponse {
                transaction_id: None,
                unit_id: data[0],
                function_code: data[1],
                payload: data[2..body_len].to_vec(),
                crc: Some(received_crc),
            }
        },
    };

    if response.function_code & EXCEPTION_BIT != 0 {
        let code = response
            .payload
            .first()
            .copied()
            .ok_or(CodecError::FrameTooShort {
                needed: data.len() + 1,
                actual: data.len(),
            })?;
        return Err(CodecError::ModbusException {
            function_code: response.function_code & !EXCEPTION_BIT,
            code,
        });
    }

    Ok(response)
}
