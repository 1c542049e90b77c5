//! Configuration loading and validation.

mod error;
mod reload;

pub use error::ConfigError;
pub use reload::{DEFAULT_RELOAD_PORT, ReloadConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration (`kindling.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reload: ReloadConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a present file must parse and
    /// validate. Validation failures abort before any socket is opened.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.reload.validate()
    }
}

/// Parse a config snippet for section tests.
#[cfg(test)]
pub(crate) fn test_parse_config(input: &str) -> Config {
    toml::from_str(input).expect("config snippet should parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("kindling.toml")).unwrap();
        assert_eq!(config.reload.port, 35729);
    }

    #[test]
    fn test_load_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kindling.toml");
        std::fs::write(&path, "[reload]\nport = 4000\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.reload.port, 4000);
    }

    #[test]
    fn test_load_rejects_half_tls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kindling.toml");
        std::fs::write(&path, "[reload]\nssl_cert = \"cert.pem\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kindling.toml");
        std::fs::write(&path, "[reload\nport = 4000\n").unwrap();

        assert!(matches!(
            Config::load(&path).unwrap_err(),
            ConfigError::Toml(_)
        ));
    }
}
