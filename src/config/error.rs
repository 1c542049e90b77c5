//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),

    #[error("Invalid ignore pattern `{0}`")]
    Ignore(String, #[source] regex::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("kindling.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("kindling.toml"));

        let validation_err = ConfigError::Validation("ssl_cert missing".to_string());
        let display = format!("{validation_err}");
        assert!(display.contains("ssl_cert missing"));
    }

    #[test]
    fn test_ignore_error_names_pattern() {
        let bad = regex::Regex::new("[").unwrap_err();
        let err = ConfigError::Ignore("[".to_string(), bad);
        assert!(format!("{err}").contains('['));
    }
}
