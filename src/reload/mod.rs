//! Reload Module
//!
//! The LiveReload protocol reactor: one port serving both the client script
//! over HTTP and the reload WebSocket.
//!
//! # Architecture
//!
//! ```text
//! accept -> dispatch (sniff) -> http asset / 400 / websocket
//!                                                  |
//! build hooks --Broadcast--> reactor loop --> registry --> browsers
//! ```
//!
//! # Modules
//!
//! - `protocol` - wire message types (hello, reload, url)
//! - `dispatch` - first-chunk sniffing and the HTTP fallback responses
//! - `registry` - connected client set and broadcast delivery
//! - `reactor` - the loop thread, its lifecycle, and the control handle
//! - `tls` - optional TLS termination on the reload port

pub mod dispatch;
pub mod protocol;
pub mod reactor;
pub mod registry;
pub mod tls;
