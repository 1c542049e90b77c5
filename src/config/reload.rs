//! `[reload]` section configuration.
//!
//! Contains reload server settings.
//!
//! # Example
//!
//! ```toml
//! [reload]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 35729                # Port browsers look for by default
//! server_name = "kindling"    # Name announced in the hello message
//! live_css = true             # Swap stylesheets in place instead of reloading
//! ignore = ["\\.map$"]        # Pages that never trigger a reload
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.
//!
//! TLS is enabled by setting both `ssl_cert` and `ssl_key` (PEM paths).
//! Supplying only one of the two is a validation error.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Port the LiveReload browser extension and client script expect.
pub const DEFAULT_RELOAD_PORT: u16 = 35729;

/// Reload server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// Port the reload server listens on.
    pub port: u16,

    /// Server name sent in the hello message after each handshake.
    pub server_name: String,

    /// Ask browsers to apply CSS changes without a full page reload.
    pub live_css: bool,

    /// Regex patterns for pages that never trigger a reload.
    pub ignore: Vec<String>,

    /// TLS certificate path (PEM). Requires `ssl_key`.
    pub ssl_cert: Option<PathBuf>,

    /// TLS private key path (PEM). Requires `ssl_cert`.
    pub ssl_key: Option<PathBuf>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: DEFAULT_RELOAD_PORT,
            server_name: "kindling".to_string(),
            live_css: true,
            ignore: Vec::new(),
            ssl_cert: None,
            ssl_key: None,
        }
    }
}

impl ReloadConfig {
    /// Check invariants that must hold before any socket is opened.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.ssl_cert.is_some() != self.ssl_key.is_some() {
            return Err(ConfigError::Validation(
                "ssl_cert and ssl_key must be supplied together".to_string(),
            ));
        }
        for pattern in &self.ignore {
            Regex::new(pattern).map_err(|e| ConfigError::Ignore(pattern.clone(), e))?;
        }
        Ok(())
    }

    /// Compiled ignore patterns.
    pub fn ignore_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        self.ignore
            .iter()
            .map(|p| Regex::new(p).map_err(|e| ConfigError::Ignore(p.clone(), e)))
            .collect()
    }

    /// TLS certificate/key pair, when both are configured.
    pub fn tls_pair(&self) -> Option<(&Path, &Path)> {
        match (&self.ssl_cert, &self.ssl_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}
