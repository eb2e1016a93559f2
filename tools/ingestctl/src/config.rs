//! ingestctl configuration
//!
//! Loaded once at startup, either from `--config <file>` or from the layered
//! `config/` directory plus `INGESTCTL_` environment variables.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use common::{load_config, load_config_from_file, LoggingConfig};
use ingest_codecs::mainframe::CopybookLayout;
use ingest_codecs::modbus::FrameMode;
use ingest_codecs::serial::{FramerConfig, SerialPortParams};
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "ingestctl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusParams {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    /// `tcp` over the network, `rtu` over `serial_port`
    pub mode: FrameMode,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for ModbusParams {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 502,
            unit_id: 1,
            mode: FrameMode::Tcp,
            connect_timeout_ms: 3000,
            read_timeout_ms: 1000,
        }
    }
}

impl ModbusParams {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttParams {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keepalive_secs: u16,
    /// 0 waits forever for the next message
    pub read_timeout_ms: u64,
}

impl Default for MqttParams {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: SERVICE_NAME.to_string(),
            keepalive_secs: 30,
            read_timeout_ms: 0,
        }
    }
}

impl MqttParams {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestctlConfig {
    pub logging: LoggingConfig,
    pub modbus: ModbusParams,
    pub mqtt: MqttParams,
    pub serial: FramerConfig,
    pub serial_port: SerialPortParams,
    pub layouts: Vec<CopybookLayout>,
}

impl IngestctlConfig {
    pub fn load(file: Option<&Path>, config_dir: &Path) -> Result<Self> {
        let config = match file {
            Some(path) => load_config_from_file(path)
                .with_context(|| format!("Loading {}", path.display()))?,
            None => load_config(SERVICE_NAME, config_dir)
                .with_context(|| format!("Loading configuration from {}", config_dir.display()))?,
        };
        Ok(config)
    }

    /// Look a layout up by name, falling back to a layout file path
    pub fn resolve_layout(&self, name_or_path: &str) -> Result<CopybookLayout> {
        if let Some(layout) = self.layouts.iter().find(|l| l.name() == name_or_path) {
            return Ok(layout.clone());
        }

        let path = Path::new(name_or_path);
        if !path.exists() {
            let known: Vec<_> = self.layouts.iter().map(CopybookLayout::name).collect();
            anyhow::bail!(
                "Unknown layout '{}' (configured: {})",
                name_or_path,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            );
        }
        let layout = load_config_from_file(path)?;
        Ok(layout)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
modbus:
  host: 10.0.0.12
  mode: rtu
layouts:
  - name: PAIR
    record_length: 4
    fields:
      - { name: CODE, offset: 0, length: 2, kind: text }
      - { name: QTY, offset: 2, length: 2, kind: comp3 }
"#;

    fn config_file(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_file_keeps_defaults() {
        let file = config_file(CONFIG, ".yaml");
        let config = IngestctlConfig::load(Some(file.path()), Path::new("unused")).unwrap();

        assert_eq!(config.modbus.address(), "10.0.0.12:502");
        assert_eq!(config.modbus.mode, FrameMode::Rtu);
        assert_eq!(config.mqtt, MqttParams::default());
        assert_eq!(config.serial, FramerConfig::default());
        assert_eq!(config.layouts.len(), 1);
    }

    #[test]
    fn test_resolve_layout_by_name_and_path() {
        let file = config_file(CONFIG, ".yaml");
        let config = IngestctlConfig::load(Some(file.path()), Path::new("unused")).unwrap();
        assert_eq!(config.resolve_layout("PAIR").unwrap().record_length(), 4);

        let layout_file = config_file(
            "name: SOLO\nrecord_length: 2\nfields:\n  - { name: A, offset: 0, length: 2, kind: text }\n",
            ".yaml",
        );
        let layout = config
            .resolve_layout(layout_file.path().to_str().unwrap())
            .unwrap();
        assert_eq!(layout.name(), "SOLO");

        let err = config.resolve_layout("MISSING").unwrap_err();
        assert!(err.to_string().contains("PAIR"));
    }

    #[test]
    fn test_bundled_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/ingestctl.yaml");
        let config = IngestctlConfig::load(Some(&path), Path::new("unused")).unwrap();
        let layout = config.resolve_layout("ERPX400").unwrap();
        assert_eq!(layout.record_length(), 40);
        assert_eq!(config.serial.sync_byte, 0xAA);
    }
}
