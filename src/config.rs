//! Service configuration loaded from TOML
//!
//! ```toml
//! [limits]
//! max_depth = 6
//! max_children = 4
//! default_ratio = 0.5
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::layout::LayoutLimits;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the page operations
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub limits: LayoutLimits,
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.limits.check().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServiceConfig::from_toml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_partial_limits() {
        let config = ServiceConfig::from_toml("[limits]\nmax_depth = 4\n").unwrap();
        assert_eq!(config.limits.max_depth, 4);
        assert_eq!(config.limits.max_children, 10);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let err = ServiceConfig::from_toml("[limits]\nmax_children = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = ServiceConfig::from_toml("[colors]\nred = \"#f00\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
