//! Kindling - LiveReload server for static-site build tools.
//!
//! One port, two protocols: browsers fetch `/livereload.js` over plain HTTP
//! and then hold a WebSocket open on the same port. When a build cycle
//! changes pages, every connected tab is told to reload them.
//!
//! # Modules
//!
//! - `reload` - the protocol reactor (wire messages, sniffing, registry, loop)
//! - `build` - hooks that bridge an external build pipeline to the reactor
//! - `watch` - filesystem watcher driving broadcasts in standalone serve mode
//! - `config` - `kindling.toml` loading and validation
//! - `embed` - the browser client script compiled into the binary
//! - `cli` - clap definitions and the serve command

pub mod build;
pub mod cli;
pub mod config;
pub mod embed;
pub mod logger;
pub mod reload;
pub mod watch;
