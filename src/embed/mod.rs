//! Embedded static resources.
//!
//! The browser client is compiled into the binary so the asset endpoint can
//! answer with an exact Content-Length without touching disk.

/// Browser-side LiveReload client served at `/livereload.js`.
pub const LIVERELOAD_JS: &str = include_str!("livereload.js");
