//! Configuration for the extraction engine

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const MB: u64 = 1024 * 1024;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Whether the content/extension cross-check runs on every intake path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Only `extract_with_validation` cross-checks extension and content
    #[default]
    OnRequest,
    /// `extract` also checks sniffed content against the declared type
    Always,
}

/// Extraction engine configuration.
///
/// Built once at process start and shared immutably by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum accepted input size in bytes (default: 100MB)
    pub max_file_size: usize,
    /// Ceiling for the size-scaled extraction deadline in seconds
    pub extraction_timeout_secs: u64,
    /// Maximum number of extractions running at once
    pub max_concurrent: usize,
    /// Maximum process memory growth per extraction in bytes (default: 512MB)
    pub max_memory_per_file: u64,
    /// Maximum characters an extractor may emit
    pub max_output_chars: usize,
    /// Interval between memory samples in milliseconds
    pub memory_sample_interval_ms: u64,
    /// Format validation policy for the unvalidated entry point
    pub validation: ValidationMode,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * MB as usize,
            extraction_timeout_secs: 60,
            max_concurrent: num_cpus::get().clamp(1, 8),
            max_memory_per_file: 512 * MB,
            max_output_chars: 50_000_000,
            memory_sample_interval_ms: 100,
            validation: ValidationMode::OnRequest,
        }
    }
}

impl ExtractionConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject zero limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("max_file_size must be greater than 0".into()));
        }
        if self.extraction_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "extraction_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be greater than 0".into()));
        }
        if self.max_memory_per_file == 0 {
            return Err(ConfigError::Invalid(
                "max_memory_per_file must be greater than 0".into(),
            ));
        }
        if self.max_output_chars == 0 {
            return Err(ConfigError::Invalid("max_output_chars must be greater than 0".into()));
        }
        if self.memory_sample_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "memory_sample_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Deadline ceiling
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExtractionConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_concurrent >= 1 && config.max_concurrent <= 8);
        assert_eq!(config.validation, ValidationMode::OnRequest);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ExtractionConfig::from_toml_str(
            r#"
            max_concurrent = 2
            extraction_timeout_secs = 30
            validation = "always"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.extraction_timeout(), Duration::from_secs(30));
        assert_eq!(config.validation, ValidationMode::Always);
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = ExtractionConfig::from_toml_str("max_concurrent = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.toml");
        std::fs::write(&path, "max_file_size = 1024\n").unwrap();

        let config = ExtractionConfig::from_file(&path).unwrap();
        assert_eq!(config.max_file_size, 1024);
    }
}
