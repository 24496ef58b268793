//! Loading quantizer configuration from YAML and JSON

use super::schema::QuantizerConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

impl QuantizerConfig {
    /// Parse and validate a YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))?;
        validate_config(&config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Failed to parse JSON config: {e}")))?;
        validate_config(&config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Load a quantizer configuration file
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
///
/// # Example
///
/// ```no_run
/// use cuantizar::config::load_config;
///
/// let config = load_config("quantizer.yaml")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<QuantizerConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => QuantizerConfig::from_json_str(&content)?,
        _ => QuantizerConfig::from_yaml_str(&content)?,
    };

    tracing::debug!(
        path = %path.display(),
        bits = config.bits,
        symmetric = config.symmetric,
        "loaded quantizer config"
    );
    Ok(config)
}
