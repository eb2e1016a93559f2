//! Codec error type shared by all ingest codecs

use errors::{ErrorCategory, IngestError, IngestErrorTrait};
use thiserror::Error;

use crate::transport::TransportError;

/// Codec operation result type
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while framing, checksumming or decoding
#[derive(Debug, Error)]
pub enum CodecError {
    // ======================================
    // Framing Errors
    // ======================================
    #[error("Frame too short: need at least {needed} bytes, got {actual}")]
    FrameTooShort { needed: usize, actual: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Modbus exception: function 0x{function_code:02X}, code 0x{code:02X}")]
    ModbusException { function_code: u8, code: u8 },

    #[error("Incomplete frame: stream ended after {received} of {needed} bytes")]
    IncompleteFrame { needed: usize, received: usize },

    #[error("Truncated record {record_number}: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        record_number: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Connection error: {0}")]
    Connection(#[from] TransportError),

    // ======================================
    // MQTT Errors
    // ======================================
    #[error("Malformed remaining length: more than 4 bytes")]
    MalformedVarint,

    #[error("Remaining length {0} exceeds 268435455")]
    RemainingLengthTooLarge(u32),

    #[error("Payload is not valid UTF-8: {0}")]
    PayloadNotUtf8(#[source] std::str::Utf8Error),

    #[error("Payload is not valid JSON: {0}")]
    PayloadNotJson(String),

    // ======================================
    // Record Field Errors
    // ======================================
    #[error("Field {field}: byte 0x{byte:02X} at offset {offset} has no EBCDIC mapping")]
    Encoding {
        field: String,
        offset: usize,
        byte: u8,
    },

    #[error("Field {field}: invalid digit nibble 0x{nibble:X} at offset {offset}")]
    InvalidDigit {
        field: String,
        offset: usize,
        nibble: u8,
    },

    #[error("Field {field}: invalid sign nibble 0x{nibble:X}")]
    InvalidSign { field: String, nibble: u8 },

    // ======================================
    // Layout Errors
    // ======================================
    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Layout mismatch: stored batch was written with {actual}, expected {expected}")]
    LayoutMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Build a protocol error from any displayable message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Build a layout error from any displayable message
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }
}

impl IngestErrorTrait for CodecError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::FrameTooShort { .. } => "FRAME_TOO_SHORT",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            Self::ModbusException { .. } => "MODBUS_EXCEPTION",
            Self::IncompleteFrame { .. } => "INCOMPLETE_FRAME",
            Self::TruncatedRecord { .. } => "TRUNCATED_RECORD",
            Self::Connection(TransportError::Timeout { .. }) => "TIMEOUT",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::MalformedVarint => "MALFORMED_VARINT",
            Self::RemainingLengthTooLarge(_) => "REMAINING_LENGTH_TOO_LARGE",
            Self::PayloadNotUtf8(_) => "PAYLOAD_NOT_UTF8",
            Self::PayloadNotJson(_) => "PAYLOAD_NOT_JSON",
            Self::Encoding { .. } => "ENCODING_ERROR",
            Self::InvalidDigit { .. } => "INVALID_DIGIT",
            Self::InvalidSign { .. } => "INVALID_SIGN",
            Self::Layout(_) => "LAYOUT_ERROR",
            Self::LayoutMismatch { .. } => "LAYOUT_MISMATCH",
            Self::Io(_) => "IO_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::FrameTooShort { .. }
            | Self::Protocol(_)
            | Self::MalformedVarint
            | Self::RemainingLengthTooLarge(_) => ErrorCategory::Protocol,

            Self::ChecksumMismatch { .. } => ErrorCategory::DataCorruption,
            Self::ModbusException { .. } => ErrorCategory::Rejected,

            Self::IncompleteFrame { .. } | Self::TruncatedRecord { .. } => {
                ErrorCategory::InsufficientData
            },

            Self::Connection(TransportError::Timeout { .. }) => ErrorCategory::Timeout,
            Self::Connection(_) => ErrorCategory::Connection,

            Self::Encoding { .. }
            | Self::InvalidDigit { .. }
            | Self::InvalidSign { .. }
            | Self::PayloadNotUtf8(_)
            | Self::PayloadNotJson(_) => ErrorCategory::Encoding,

            Self::Layout(_) | Self::LayoutMismatch { .. } => ErrorCategory::Configuration,

            Self::Io(_) => ErrorCategory::Internal,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            // Acknowledge (0x05) and Server Device Busy (0x06) ask the master to retry later
            Self::ModbusException { code, .. } => matches!(code, 0x05 | 0x06),
            _ => matches!(
                self.category(),
                ErrorCategory::Connection | ErrorCategory::Timeout | ErrorCategory::InsufficientData
            ),
        }
    }
}

impl From<CodecError> for IngestError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Connection(TransportError::Timeout { .. }) => {
                IngestError::Timeout(err.to_string())
            },
            CodecError::Connection(ref inner) => IngestError::ConnectionFailed {
                endpoint: "transport".to_string(),
                reason: inner.to_string(),
            },
            CodecError::Protocol(msg) => IngestError::Protocol {
                protocol: "codec".to_string(),
                message: msg,
            },
            CodecError::Layout(msg) => IngestError::Configuration(msg),
            CodecError::Io(e) => IngestError::Io(e),
            other => IngestError::Decode(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_categories() {
        let crc = CodecError::ChecksumMismatch {
            expected: 0xCDC5,
            actual: 0xCDC4,
        };
        assert_eq!(crc.category(), ErrorCategory::DataCorruption);
        assert!(crc.should_alert());
        assert!(!crc.is_retryable());

        let short = CodecError::IncompleteFrame {
            needed: 6,
            received: 3,
        };
        assert_eq!(short.error_code(), "INCOMPLETE_FRAME");
        assert!(short.is_retryable());
    }

    #[test]
    fn test_modbus_busy_is_retryable() {
        let busy = CodecError::ModbusException {
            function_code: 0x03,
            code: 0x06,
        };
        let illegal = CodecError::ModbusException {
            function_code: 0x03,
            code: 0x02,
        };
        assert!(busy.is_retryable());
        assert!(!illegal.is_retryable());
        assert_eq!(illegal.category(), ErrorCategory::Rejected);
    }

    #[test]
    fn test_timeout_maps_to_ingest_timeout() {
        let err = CodecError::Connection(TransportError::Timeout {
            expected: 7,
            received: 0,
            after: Duration::from_millis(500),
        });
        assert_eq!(err.category(), ErrorCategory::Timeout);
        let platform: IngestError = err.into();
        assert!(matches!(platform, IngestError::Timeout(_)));
    }

    #[test]
    fn test_checksum_message_format() {
        let err = CodecError::ChecksumMismatch {
            expected: 0x0A84,
            actual: 0x0A85,
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: expected 0x0A84, got 0x0A85"
        );
    }
}
