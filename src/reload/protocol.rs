//! LiveReload Wire Protocol
//!
//! Defines the JSON message format exchanged with browser clients over
//! WebSocket. Messages are tagged by a `command` field.
//!
//! # Message Types
//!
//! - `hello`: sent once per connection, immediately after the handshake
//! - `reload`: one per changed page per build cycle
//! - `url`: inbound only, the page a client is currently viewing

use serde::{Deserialize, Serialize};

/// Protocol revision announced in the hello message and echoed as the
/// WebSocket subprotocol.
pub const PROTOCOL_V7: &str = "http://livereload.com/protocols/official-7";

/// A LiveReload message, tagged by its `command` field.
///
/// Inbound payloads with an unrecognized command decode to `Unknown` and
/// cause no action downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum LiveReloadMessage {
    /// Handshake greeting. The server sends one before anything else;
    /// clients send their own back.
    Hello {
        protocols: Vec<String>,
        #[serde(rename = "serverName", default)]
        server_name: String,
    },

    /// Ask clients to reload one page.
    Reload {
        path: String,
        #[serde(rename = "liveCSS", default = "default_live_css")]
        live_css: bool,
    },

    /// Inbound notification of the URL a client is viewing. Logged, nothing
    /// else.
    Url { url: String },

    /// Anything with a command we do not recognize.
    #[serde(other)]
    Unknown,
}

fn default_live_css() -> bool {
    true
}

impl LiveReloadMessage {
    /// Create the hello message announcing `server_name`.
    pub fn hello(server_name: impl Into<String>) -> Self {
        Self::Hello {
            protocols: vec![PROTOCOL_V7.to_string()],
            server_name: server_name.into(),
        }
    }

    /// Create a reload message for one page, with live CSS enabled.
    pub fn reload(path: impl Into<String>) -> Self {
        Self::Reload {
            path: path.into(),
            live_css: true,
        }
    }

    /// Create a reload message with an explicit live CSS flag.
    pub fn reload_with_css(path: impl Into<String>, live_css: bool) -> Self {
        Self::Reload {
            path: path.into(),
            live_css,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"command":"reload","path":"/","liveCSS":true}"#.to_string())
    }

    /// Parse a JSON text frame.
    ///
    /// `None` means the payload was malformed and should be discarded;
    /// a well-formed payload with an unknown command yields `Unknown`.
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
