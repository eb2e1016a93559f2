//! Ingest platform basic library
//!
//! Provides functions shared by the codec crates and operator tools:
//! - logging bootstrap (tracing)
//! - layered configuration loading (figment)
//! - hex helpers for frame dumps
//! - shutdown signal handling

pub mod config_loader;
pub mod hex;
pub mod logging;
pub mod shutdown;

pub use config_loader::{load_config, load_config_from_file};
pub use logging::{init_logging, LogGuard, LoggingConfig};

// Re-export common dependencies
pub use serde;
pub use serde_json;
pub use tokio;
