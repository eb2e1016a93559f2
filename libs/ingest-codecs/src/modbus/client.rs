//! MODBUS master over one transport handle
//!
//! One request in flight at a time. No retries: failures surface to the
//! caller, who decides whether to reconnect.

use tracing::{debug, warn};

use super::constants::{CRC_LEN, EXCEPTION_BIT, MBAP_HEADER_LEN};
use super::frame::{decode_response, encode_request, FrameMode, Framing, MbapHeader, ModbusRequest, ModbusResponse};
use super::pdu::{self, FunctionCode, RegisterBank};
use crate::error::{CodecError, Result};
use crate::transport::{read_part, Transport};

/// Request/response MODBUS client
#[derive(Debug)]
pub struct ModbusClient<T> {
    transport: T,
    mode: FrameMode,
    unit_id: u8,
    /// Client-local transaction ID counter (TCP mode)
    next_transaction_id: u16,
}

impl<T: Transport> ModbusClient<T> {
    pub fn new(transport: T, mode: FrameMode, unit_id: u8) -> Self {
        Self {
            transport,
            mode,
            unit_id,
            next_transaction_id: 1,
        }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        // Wraps naturally from 0xFFFF to 0x0000
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    /// Send one request and read exactly one response
    pub async fn transact(&mut self, request: &ModbusRequest) -> Result<ModbusResponse> {
        let framing = match self.mode {
            FrameMode::Tcp => Framing::Tcp {
                transaction_id: self.next_transaction_id(),
            },
            FrameMode::Rtu => Framing::Rtu,
        };

        let frame = encode_request(request, framing)?;
        self.transport.write(&frame).await?;

        let raw = match self.mode {
            FrameMode::Tcp => self.read_tcp_frame().await?,
            FrameMode::Rtu => self.read_rtu_frame().await?,
        };

        match framing {
            Framing::Tcp { .. } => {
                self.check_correlation(request, framing, &raw)?;
                decode_response(&raw, self.mode)
            },
            Framing::Rtu => {
                // CRC first: a corrupted unit or function byte is line noise, not a stray reply
                let decoded = decode_response(&raw, self.mode);
                if let Err(CodecError::ChecksumMismatch { expected, actual }) = &decoded {
                    warn!(
                        "RTU CRC mismatch from unit {}: expected {:04X}, got {:04X}",
                        request.unit_id, expected, actual
                    );
                    return decoded;
                }
                self.check_correlation(request, framing, &raw)?;
                decoded
            },
        }
    }

    async fn read_tcp_frame(&mut self) -> Result<Vec<u8>> {
        let header_bytes = read_part(&mut self.transport, MBAP_HEADER_LEN, 0).await?;
        let header = MbapHeader::parse(&header_bytes)?;
        let body = read_part(&mut self.transport, header.pdu_len(), MBAP_HEADER_LEN).await?;

        let mut raw = Vec::with_capacity(MBAP_HEADER_LEN + body.len());
        raw.extend_from_slice(&header_bytes);
        raw.extend_from_slice(&body);
        Ok(raw)
    }

    async fn read_rtu_frame(&mut self) -> Result<Vec<u8>> {
        let head = read_part(&mut self.transport, 2, 0).await?;
        let function_code = head[1];
        let mut raw = head.to_vec();

        if function_code & EXCEPTION_BIT != 0 {
            // exception code + CRC
            let rest = read_part(&mut self.transport, 1 + CRC_LEN, raw.len()).await?;
            raw.extend_from_slice(&rest);
            return Ok(raw);
        }

        match FunctionCode::from_code(function_code) {
            Some(fc) if fc.has_byte_count() => {
                let count = read_part(&mut self.transport, 1, raw.len()).await?;
                raw.extend_from_slice(&count);
                let rest =
                    read_part(&mut self.transport, usize::from(count[0]) + CRC_LEN, raw.len()).await?;
                raw.extend_from_slice(&rest);
            },
            Some(_) => {
                // Write responses echo address + value/quantity
                let rest = read_part(&mut self.transport, 4 + CRC_LEN, raw.len()).await?;
                raw.extend_from_slice(&rest);
            },
            None => {
                return Err(CodecError::Protocol(format!(
                    "Unsupported function code in RTU response: 0x{:02X}",
                    function_code
                )))
            },
        }
        Ok(raw)
    }

    /// Reject responses that belong to a different request
    fn check_correlation(&self, request: &ModbusRequest, framing: Framing, raw: &[u8]) -> Result<()> {
        let (unit_id, function_code) = match framing {
            Framing::Tcp { transaction_id } => {
                let response_tid = u16::from_be_bytes([raw[0], raw[1]]);
                if response_tid != transaction_id {
                    warn!(
                        "Transaction ID mismatch: expected {:04X}, got {:04X}",
                        transaction_id, response_tid
                    );
                    return Err(CodecError::Protocol(format!(
                        "Transaction ID mismatch: expected {:04X}, got {:04X}",
                        transaction_id, response_tid
                    )));
                }
                (raw[MBAP_HEADER_LEN - 1], raw[MBAP_HEADER_LEN])
            },
            Framing::Rtu => (raw[0], raw[1]),
        };

        if unit_id != request.unit_id {
            return Err(CodecError::Protocol(format!(
                "Unexpected response from unit {} (expected {})",
                unit_id, request.unit_id
            )));
        }
        if function_code & !EXCEPTION_BIT != request.function_code {
            return Err(CodecError::Protocol(format!(
                "Function code mismatch: expected {:02X}, got {:02X}",
                request.function_code, function_code
            )));
        }
        Ok(())
    }

    // ========================================================================
    // High-level operations
    // ========================================================================

    /// FC03
    pub async fn read_holding_registers(&mut self, start: u16, quantity: u16) -> Result<RegisterBank> {
        let request = pdu::read_holding_registers(self.unit_id, start, quantity)?;
        self.read_registers(&request, start, quantity).await
    }

    /// FC04
    pub async fn read_input_registers(&mut self, start: u16, quantity: u16) -> Result<RegisterBank> {
        let request = pdu::read_input_registers(self.unit_id, start, quantity)?;
        self.read_registers(&request, start, quantity).await
    }

    async fn read_registers(
        &mut self,
        request: &ModbusRequest,
        start: u16,
        quantity: u16,
    ) -> Result<RegisterBank> {
        let response = self.transact(request).await?;
        let bank = RegisterBank::from_response(start, &response.payload)?;
        if bank.len() != usize::from(quantity) {
            return Err(CodecError::Protocol(format!(
                "Requested {} registers, device returned {}",
                quantity,
                bank.len()
            )));
        }
        debug!("Read {} registers from unit {} at {}", quantity, self.unit_id, start);
        Ok(bank)
    }

    /// FC06; the device echoes the request
    pub async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        let request = pdu::write_single_register(self.unit_id, address, value);
        let response = self.transact(&request).await?;
        if response.payload != request.payload {
            return Err(CodecError::Protocol(
                "Write single register echo mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// FC16; the device echoes start address and quantity
    pub async fn write_multiple_registers(&mut self, start: u16, values: &[u16]) -> Result<()> {
        let request = pdu::write_multiple_registers(self.unit_id, start, values)?;
        let response = self.transact(&request).await?;
        if response.payload.get(..4) != request.payload.get(..4) {
            return Err(CodecError::Protocol(
                "Write multiple registers echo mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::modbus::crc::crc16;
    use crate::transport::IoTransport;
    use tokio_test::io::Builder;

    fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    #[tokio::test]
    async fn test_tcp_read_holding_registers() {
        let mock = Builder::new()
            .write(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x0A, 0x00, 0x02])
            .read(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01])
            .read(&[0x03, 0x04, 0x00, 0x2A, 0x01, 0x02])
            .build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Tcp, 1);

        let bank = client.read_holding_registers(10, 2).await.unwrap();
        assert_eq!(bank.register(10).unwrap(), 42);
        assert_eq!(bank.register(11).unwrap(), 0x0102);
    }

    #[tokio::test]
    async fn test_rtu_read_input_registers() {
        let request = with_crc(vec![0x11, 0x04, 0x00, 0x08, 0x00, 0x01]);
        let response = with_crc(vec![0x11, 0x04, 0x02, 0x00, 0x0A]);
        let mock = Builder::new().write(&request).read(&response).build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Rtu, 0x11);

        let bank = client.read_input_registers(8, 1).await.unwrap();
        assert_eq!(bank.words(), &[0x000A]);
    }

    #[tokio::test]
    async fn test_rtu_exception_response() {
        let request = with_crc(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        let response = with_crc(vec![0x01, 0x83, 0x02]);
        let mock = Builder::new().write(&request).read(&response).build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Rtu, 1);

        let err = client.read_holding_registers(0, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::ModbusException {
                function_code: 0x03,
                code: 0x02
            }
        ));
    }

    #[tokio::test]
    async fn test_rtu_corrupted_unit_byte_is_checksum_mismatch() {
        let request = with_crc(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        let mut response = with_crc(vec![0x01, 0x03, 0x02, 0x00, 0x2A]);
        response[0] ^= 0x02;
        let mock = Builder::new().write(&request).read(&response).build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Rtu, 1);

        let err = client.read_holding_registers(0, 1).await.unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_rtu_reply_from_other_unit_is_protocol_error() {
        let request = with_crc(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        let response = with_crc(vec![0x03, 0x03, 0x02, 0x00, 0x2A]);
        let mock = Builder::new().write(&request).read(&response).build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Rtu, 1);

        let err = client.read_holding_registers(0, 1).await.unwrap_err();
        assert!(err.to_string().contains("Unexpected response from unit 3"));
    }

    #[tokio::test]
    async fn test_rtu_write_single_register_echo() {
        let request = with_crc(vec![0x01, 0x06, 0x00, 0x01, 0x00, 0x03]);
        let mock = Builder::new().write(&request).read(&request).build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Rtu, 1);

        client.write_single_register(1, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_transaction_id_mismatch() {
        let mock = Builder::new()
            .write(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01])
            .read(&[0x00, 0x09, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x01])
            .build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Tcp, 1);

        let err = client.read_holding_registers(0, 1).await.unwrap_err();
        assert!(err.to_string().contains("Transaction ID mismatch"));
    }

    #[tokio::test]
    async fn test_tcp_stream_closed_mid_response() {
        let mock = Builder::new()
            .write(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01])
            .read(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03])
            .build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Tcp, 1);

        let err = client.read_holding_registers(0, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::IncompleteFrame {
                needed: 11,
                received: 8
            }
        ));
    }

    #[tokio::test]
    async fn test_transaction_ids_advance() {
        let mock = Builder::new()
            .write(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x07])
            .read(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x07])
            .write(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x02, 0x00, 0x08])
            .read(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x02, 0x00, 0x08])
            .build();
        let mut client = ModbusClient::new(IoTransport::new(mock), FrameMode::Tcp, 1);

        client.write_single_register(1, 7).await.unwrap();
        client.write_single_register(2, 8).await.unwrap();
    }
}
