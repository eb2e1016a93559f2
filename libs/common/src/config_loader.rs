//! Configuration loading helper functions
//!
//! Layered loading through figment: defaults, then service file, then
//! prefixed environment variables.

use std::path::Path;

use errors::{IngestError, IngestResult};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::Deserialize;
use tracing::{debug, info};

/// Load configuration from the standard layers
///
/// Priority (highest to lowest):
/// 1. Environment variables `<SERVICE>_...` (`__` separates nested keys)
/// 2. `<dir>/<service>.{toml,yaml,yml,json}`
/// 3. `<dir>/default.{toml,yaml,yml,json}`
/// 4. `T::default()`
pub fn load_config<T>(service_name: &str, config_dir: impl AsRef<Path>) -> IngestResult<T>
where
    T: for<'de> Deserialize<'de> + serde::Serialize + Default,
{
    let dir = config_dir.as_ref();
    let prefix = format!("{}_", service_name.to_uppercase().replace('-', "_"));

    let figment = Figment::from(figment::providers::Serialized::defaults(T::default()))
        .merge(Toml::file(dir.join("default.toml")))
        .merge(Yaml::file(dir.join("default.yaml")))
        .merge(Yaml::file(dir.join("default.yml")))
        .merge(Json::file(dir.join("default.json")))
        .merge(Toml::file(dir.join(format!("{}.toml", service_name))))
        .merge(Yaml::file(dir.join(format!("{}.yaml", service_name))))
        .merge(Yaml::file(dir.join(format!("{}.yml", service_name))))
        .merge(Json::file(dir.join(format!("{}.json", service_name))))
        .merge(Env::prefixed(&prefix).split("__"));

    debug!("Loading {} config from {} (env prefix {})", service_name, dir.display(), prefix);

    figment
        .extract()
        .map_err(|e| IngestError::Configuration(format!("Failed to load configuration: {}", e)))
}

/// Load configuration from a specific file, format chosen by extension
pub fn load_config_from_file<T, P>(path: P) -> IngestResult<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(IngestError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestError::Configuration("Config file must have an extension".to_string()))?;

    let figment = match extension {
        "toml" => Figment::new().merge(Toml::file(path)),
        "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
        "json" => Figment::new().merge(Json::file(path)),
        _ => {
            return Err(IngestError::Configuration(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };

    let value = figment.extract().map_err(|e| IngestError::ParseError {
        file: path.display().to_string(),
        error: e.to_string(),
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(default)]
    struct TestConfig {
        name: String,
        port: u16,
        nested: NestedConfig,
    }

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(default)]
    struct NestedConfig {
        enabled: bool,
        value: i32,
    }

    #[test]
    fn test_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ingest.yaml");
        std::fs::write(&path, "name: plant-a\nport: 502\nnested:\n  enabled: true\n  value: 7\n")
            .unwrap();

        let loaded: TestConfig = load_config_from_file(&path).unwrap();
        assert_eq!(loaded.name, "plant-a");
        assert_eq!(loaded.port, 502);
        assert!(loaded.nested.enabled);
        assert_eq!(loaded.nested.value, 7);
    }

    #[test]
    fn test_load_unknown_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ingest.ini");
        std::fs::write(&path, "name = x").unwrap();

        let err = load_config_from_file::<TestConfig, _>(&path).unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config_from_file::<TestConfig, _>("/nonexistent/ingest.yaml").unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }

    #[test]
    fn test_layered_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("default.toml", "name = \"base\"\nport = 1")?;
            jail.create_file("ingestctl.yaml", "port: 1502\n")?;
            jail.set_env("INGESTCTL_NESTED__VALUE", "42");

            let loaded: TestConfig = load_config("ingestctl", jail.directory()).unwrap();
            assert_eq!(loaded.name, "base");
            assert_eq!(loaded.port, 1502);
            assert_eq!(loaded.nested.value, 42);
            Ok(())
        });
    }
}
