//! Processor configuration types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use cadence_core::SOURCE_ID;
use cadence_registry::Params;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_parent() -> String {
    SOURCE_ID.to_string()
}

#[allow(clippy::ptr_arg)]
fn is_source(parent: &String) -> bool {
    parent == SOURCE_ID
}

/// Configuration for a single processor in a pipeline.
///
/// # Example
///
/// ```rust
/// use cadence_config::ProcessorConfig;
///
/// let config = ProcessorConfig::new("level")
///     .with_id("fine")
///     .with_param("block_size", "512");
///
/// assert_eq!(config.id(), "fine");
/// assert_eq!(config.parent, "source");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Processor id; defaults to the type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Registered type tag (e.g., "level", "wav").
    #[serde(rename = "type")]
    pub processor_type: String,

    /// Id of the node this processor consumes from.
    #[serde(default = "default_parent", skip_serializing_if = "is_source")]
    pub parent: String,

    /// Parameters as key-value pairs.
    /// Values are strings to support various formats (numbers, durations, etc.)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ProcessorConfig {
    /// Create a processor configuration fed by the source.
    pub fn new(processor_type: impl Into<String>) -> Self {
        Self {
            id: None,
            processor_type: processor_type.into(),
            parent: default_parent(),
            params: BTreeMap::new(),
        }
    }

    /// Set the processor id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the parent node.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    /// Add a parameter to the configuration.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The effective processor id.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.processor_type)
    }

    /// Parameters in the form the registry consumes.
    pub fn registry_params(&self) -> Params {
        Params::from(self.params.clone())
    }

    /// Parse a processor spec of the form `type[@id][:key=value,key=value]`.
    ///
    /// Examples:
    /// - `"level"`
    /// - `"level@fine:block_size=512"`
    /// - `"wav@copy:path=out.wav,bits=24"`
    pub fn parse_spec(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        let (head, params) = match spec.split_once(':') {
            Some((head, params)) => (head, Some(params)),
            None => (spec, None),
        };
        let (processor_type, id) = match head.split_once('@') {
            Some((kind, id)) => (kind.trim(), Some(id.trim())),
            None => (head.trim(), None),
        };
        if processor_type.is_empty() {
            return Err(ConfigError::invalid_spec(spec, "missing processor type"));
        }
        if id.is_some_and(str::is_empty) {
            return Err(ConfigError::invalid_spec(spec, "empty id after '@'"));
        }

        let mut config = Self::new(processor_type);
        config.id = id.map(str::to_string);
        for param in params.unwrap_or_default().split(',') {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let Some((key, value)) = param.split_once('=') else {
                return Err(ConfigError::invalid_spec(
                    spec,
                    format!("invalid parameter format '{param}' (expected key=value)"),
                ));
            };
            config
                .params
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(config)
    }
}

impl FromStr for ProcessorConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_spec(s)
    }
}

impl fmt::Display for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.processor_type)?;
        if let Some(id) = &self.id {
            write!(f, "@{id}")?;
        }
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { ':' } else { ',' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_config_new() {
        let config = ProcessorConfig::new("level");
        assert_eq!(config.processor_type, "level");
        assert_eq!(config.id(), "level");
        assert_eq!(config.parent, SOURCE_ID);
        assert!(config.params.is_empty());
    }

    #[test]
    fn test_parse_spec_full() {
        let config = ProcessorConfig::parse_spec("wav@copy:path=out.wav, bits=24").unwrap();
        assert_eq!(config.processor_type, "wav");
        assert_eq!(config.id(), "copy");
        assert_eq!(config.params.get("path").map(String::as_str), Some("out.wav"));
        assert_eq!(config.params.get("bits").map(String::as_str), Some("24"));
    }

    #[test]
    fn test_parse_spec_bare() {
        let config: ProcessorConfig = "centroid".parse().unwrap();
        assert_eq!(config, ProcessorConfig::new("centroid"));
    }

    #[test]
    fn test_parse_spec_errors() {
        assert!(ProcessorConfig::parse_spec("").is_err());
        assert!(ProcessorConfig::parse_spec("@id").is_err());
        assert!(ProcessorConfig::parse_spec("level@:block_size=1").is_err());
        assert!(matches!(
            ProcessorConfig::parse_spec("level:block_size"),
            Err(ConfigError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_display_round_trips() {
        let config = ProcessorConfig::new("silence")
            .with_id("gaps")
            .with_param("threshold", "-50")
            .with_param("hop", "512");
        let text = config.to_string();
        assert_eq!(text, "silence@gaps:hop=512,threshold=-50");
        assert_eq!(ProcessorConfig::parse_spec(&text).unwrap(), config);
    }

    #[test]
    fn test_parent_not_serialized_when_source() {
        let config = ProcessorConfig::new("level");
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("parent"), "got: {toml}");
        let chained = ProcessorConfig::new("level").with_parent("mix");
        assert!(toml::to_string(&chained).unwrap().contains("parent = \"mix\""));
    }
}
