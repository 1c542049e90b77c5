//! Client Registry
//!
//! Tracks the browser tabs currently holding a WebSocket open. The registry
//! is owned by the reactor loop and only ever touched from that thread, so
//! it needs no locking: every mutation is sequenced by the loop.

use std::io;
use std::net::SocketAddr;

use tungstenite::protocol::Message;

use crate::reload::dispatch::WsConnection;
use crate::reload::protocol::LiveReloadMessage;
use crate::{debug, log};

/// A registered browser client.
struct Client {
    ws: WsConnection,
    addr: SocketAddr,
}

/// Insertion-ordered set of open WebSocket clients.
pub struct ClientRegistry {
    clients: Vec<Client>,
    server_name: String,
}

impl ClientRegistry {
    pub fn new(server_name: String) -> Self {
        Self {
            clients: Vec::new(),
            server_name,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Register a freshly upgraded connection.
    ///
    /// The hello message goes out before the client becomes visible to
    /// broadcast; a client we cannot greet is dropped on the spot.
    pub fn add(&mut self, mut ws: WsConnection, addr: SocketAddr) {
        let hello = LiveReloadMessage::hello(self.server_name.clone());
        if let Err(e) = ws.send(Message::Text(hello.to_json().into())) {
            debug!("reload"; "client {} dropped during hello: {}", addr, e);
            return;
        }

        if self.clients.is_empty() {
            log!("reload"; "browser connected");
        }
        self.clients.push(Client { ws, addr });
        debug!("reload"; "client connected (total: {})", self.clients.len());
    }

    /// Send one message to every client.
    ///
    /// A failed send drops that client and delivery continues; the broadcast
    /// itself never fails.
    pub fn broadcast(&mut self, msg: &LiveReloadMessage) {
        if self.clients.is_empty() {
            debug!("reload"; "no clients connected");
            return;
        }

        let text = msg.to_json();
        self.clients.retain_mut(|client| {
            match client.ws.send(Message::Text(text.clone().into())) {
                Ok(()) => true,
                Err(e) => {
                    debug!("reload"; "client {} disconnected: {}", client.addr, e);
                    false
                }
            }
        });
    }

    /// Non-blocking read pass over all clients.
    ///
    /// Decodes inbound text frames and drops clients that closed or errored.
    pub fn poll_inbound(&mut self) {
        self.clients.retain_mut(|client| match client.ws.read() {
            Ok(Message::Text(text)) => {
                handle_inbound(client.addr, &text);
                true
            }
            Ok(Message::Close(_)) => {
                debug!("reload"; "client {} closed", client.addr);
                false
            }
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => {
                debug!("reload"; "client {} read failed: {}", client.addr, e);
                false
            }
        });
    }

    /// Close every connection and clear the registry.
    pub fn close_all(&mut self) {
        for mut client in self.clients.drain(..) {
            let _ = client.ws.close(None);
        }
    }
}

/// Act on a decoded inbound message. Only `url` has an effect; a malformed
/// payload is discarded without touching the connection.
fn handle_inbound(addr: SocketAddr, text: &str) {
    match LiveReloadMessage::from_json(text) {
        Some(LiveReloadMessage::Url { url }) => log!("reload"; "browser url: {}", url),
        Some(LiveReloadMessage::Hello { .. }) => {
            debug!("reload"; "client {} completed greeting", addr);
        }
        Some(_) => {}
        None => debug!("reload"; "discarding malformed message from {}", addr),
    }
}
