//! RS-485 port access through tokio-serial

use std::time::Duration;

use errors::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{error, info};

use crate::transport::IoTransport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial port parameters, 8N1 by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialPortParams {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    /// Per-read timeout; 0 blocks indefinitely
    pub read_timeout_ms: u64,
}

impl Default for SerialPortParams {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            read_timeout_ms: 1000,
        }
    }
}

impl SerialPortParams {
    pub fn validate(&self) -> IngestResult<()> {
        let invalid = |field: &str, reason: &str| IngestError::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.path.is_empty() {
            return Err(invalid("path", "Port path cannot be empty"));
        }
        if self.baud_rate == 0 {
            return Err(invalid("baud_rate", "Baud rate must be greater than zero"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(invalid("data_bits", "Data bits must be between 5 and 8"));
        }
        if self.stop_bits != 1 && self.stop_bits != 2 {
            return Err(invalid("stop_bits", "Stop bits must be 1 or 2"));
        }
        Ok(())
    }

    fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    fn tokio_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    fn tokio_parity(&self) -> tokio_serial::Parity {
        match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }

    fn tokio_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }
}

/// Open a serial port as a transport
pub fn open_serial(params: &SerialPortParams) -> IngestResult<IoTransport<SerialStream>> {
    params.validate()?;

    #[allow(unused_mut)]
    let mut port = tokio_serial::new(&params.path, params.baud_rate)
        .data_bits(params.tokio_data_bits())
        .parity(params.tokio_parity())
        .stop_bits(params.tokio_stop_bits())
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| {
            error!("Failed to open serial port {}: {}", params.path, e);
            IngestError::ConnectionFailed {
                endpoint: params.path.clone(),
                reason: e.to_string(),
            }
        })?;

    #[cfg(unix)]
    port.set_exclusive(false)
        .map_err(|e| IngestError::ConnectionFailed {
            endpoint: params.path.clone(),
            reason: format!("Failed to set exclusive mode: {e}"),
        })?;

    info!("Opened serial port {} at {} baud", params.path, params.baud_rate);
    Ok(IoTransport::new(port).with_read_timeout(params.read_timeout()))
}
