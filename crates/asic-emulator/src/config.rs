//! Emulator runtime configuration.
//!
//! Configuration comes from an optional JSON file with every field
//! defaulted, and CLI flags override whatever the file set.

use std::fs;
use std::path::Path;

use asic_model::ModelConfig;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Endpoint the emulator listens on when none is configured.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5555";

/// Runtime options for the emulator server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    /// Socket address the server binds, `host:port`.
    pub endpoint: String,
    /// Log every stored register byte at debug level.
    pub log_register_writes: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            log_register_writes: false,
        }
    }
}

impl EmulatorConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Options passed through to the register model.
    #[must_use]
    pub const fn model_config(&self) -> ModelConfig {
        ModelConfig {
            log_register_writes: self.log_register_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{EmulatorConfig, DEFAULT_ENDPOINT};
    use crate::ConfigError;

    #[test]
    fn defaults_match_documented_values() {
        let config = EmulatorConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.log_register_writes);
        assert!(!config.model_config().log_register_writes);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "log_register_writes": true }}"#).expect("write config");

        let config = EmulatorConfig::load(file.path()).expect("valid config");

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.log_register_writes);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "endpoint": "0.0.0.0:1", "port": 5 }}"#).expect("write config");

        let err = EmulatorConfig::load(file.path()).expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = EmulatorConfig::load(&dir.path().join("absent.json")).expect_err("no file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
