//! Unified error handling for the ingest platform
//!
//! `IngestError` covers platform-level failures (configuration, files,
//! serialization). Codec crates keep their own domain error types and
//! expose a common interface by implementing [`IngestErrorTrait`].

use thiserror::Error;

// ============================================================================
// IngestError - Main error type
// ============================================================================

/// Main error type for ingest tools and shared libraries
#[derive(Debug, Error)]
pub enum IngestError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // Protocol & Communication Errors
    // ======================================
    #[error("Protocol error: {protocol}: {message}")]
    Protocol { protocol: String, message: String },

    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    // ======================================
    // Decode Errors
    // ======================================
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {file}: {error}")]
    ParseError { file: String, error: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ======================================
    // Catch-all for other errors
    // ======================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using IngestError
pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    /// Process exit code for CLI tools
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for IngestError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<std::num::ParseIntError> for IngestError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::Validation(format!("Invalid integer: {}", err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::IngestError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::IngestError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::IngestError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::IngestError::Validation(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! protocol_error {
    ($protocol:expr, $msg:expr) => {
        $crate::IngestError::Protocol {
            protocol: $protocol.to_string(),
            message: $msg.to_string(),
        }
    };
}

// ============================================================================
// IngestError implements IngestErrorTrait
// ============================================================================

impl IngestErrorTrait for IngestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",

            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Timeout(_) => "TIMEOUT",

            Self::Decode(_) => "DECODE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",

            Self::Io(_) => "IO_ERROR",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Deserialization(_) => "DESERIALIZATION_ERROR",

            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },

            Self::Protocol { .. } => ErrorCategory::Protocol,
            Self::ConnectionFailed { .. } => ErrorCategory::Connection,
            Self::Timeout(_) => ErrorCategory::Timeout,

            Self::Decode(_) => ErrorCategory::Encoding,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::FileNotFound(_) => ErrorCategory::NotFound,

            Self::Io(_)
            | Self::ParseError { .. }
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::Internal(_) => ErrorCategory::Internal,

            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// ============================================================================
// Ingest Error Trait - Architectural layer
// ============================================================================

/// Error category enum - used for classification and log routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Connection,
    Timeout,

    // Wire/record layer
    Protocol,
    DataCorruption,
    InsufficientData,
    Encoding,
    /// The remote device understood the request and refused it
    Rejected,

    // Business logic layer
    Validation,
    NotFound,

    // System level
    Internal,
    ResourceBusy,

    // Others
    Unknown,
}

impl ErrorCategory {
    /// Process exit code for CLI tools
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration | Self::Validation => 2,
            Self::Connection | Self::Timeout => 3,
            Self::Protocol | Self::DataCorruption | Self::InsufficientData | Self::Encoding => 4,
            _ => 1,
        }
    }
}

/// Error capability trait shared by all ingest error types
///
/// Each crate keeps its own domain-specific error type (e.g. `CodecError`)
/// and gains a common interface by implementing this trait.
pub trait IngestErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and operator output)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the error is retryable (default implementation is category-based)
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection
                | ErrorCategory::Timeout
                | ErrorCategory::InsufficientData
                | ErrorCategory::ResourceBusy
        )
    }

    /// Recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> u64 {
        match self.category() {
            ErrorCategory::Timeout => 500,
            ErrorCategory::Connection => 1500,
            ErrorCategory::ResourceBusy => 2000,
            ErrorCategory::InsufficientData => 100,
            _ => 0,
        }
    }

    /// Maximum retry attempts
    fn max_retries(&self) -> u32 {
        if self.is_retryable() {
            3
        } else {
            0
        }
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::DataCorruption => Level::ERROR,
            ErrorCategory::Timeout
            | ErrorCategory::Connection
            | ErrorCategory::Protocol
            | ErrorCategory::InsufficientData
            | ErrorCategory::Encoding
            | ErrorCategory::Rejected => Level::WARN,
            ErrorCategory::Validation | ErrorCategory::NotFound => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Whether an alert should be triggered
    fn should_alert(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Internal | ErrorCategory::DataCorruption
        )
    }
}
