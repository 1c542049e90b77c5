//! Connection Dispatch
//!
//! The LiveReload protocol requires serving `livereload.js` over plain HTTP
//! on the same port the WebSocket clients connect to. This module sniffs the
//! first bytes of each accepted connection and classifies it once:
//!
//! - non-GET method or an `Upgrade` header: WebSocket handshake
//! - `GET /livereload.js`: serve the embedded client script and close
//! - any other parseable request: fixed 400 response and close
//! - unparseable bytes: WebSocket (sniffing one port for two protocols
//!   cannot be fully decided, so ambiguity falls through to the framing
//!   layer, which rejects garbage on its own)
//!
//! Sniffed bytes are replayed through [`ReplayStream`] so the WebSocket
//! handshake sees an untouched byte stream.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use anyhow::Result;
use rustls::{ServerConnection, StreamOwned};
use tungstenite::WebSocket;
use tungstenite::handshake::server::{Request, Response};
use tungstenite::http::HeaderValue;

use crate::embed::LIVERELOAD_JS;
use crate::reload::protocol::PROTOCOL_V7;

/// Upper bound on the sniffed request head.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Body of the 400 response for requests this port does not serve.
pub const REJECT_BODY: &str = "This port only serves livereload.js over HTTP.\n";

/// What the first data chunk told us about a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Hand the bytes to the WebSocket handshake.
    WebSocket,
    /// Serve the embedded client script and close.
    Asset,
    /// Answer 400 with a fixed explanation and close.
    Reject,
}

// =============================================================================
// Transport
// =============================================================================

/// A live socket, plain or TLS-terminated.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl Transport {
    /// The underlying TCP socket, for timeout and blocking-mode control.
    pub fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => &stream.sock,
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

// =============================================================================
// Replay Stream
// =============================================================================

/// Wraps a stream so the sniffed prefix is read again before live socket
/// data. The WebSocket handshake parses the request itself, so it must see
/// every byte the dispatcher consumed.
pub struct ReplayStream<S> {
    prefix: Vec<u8>,
    pos: usize,
    inner: S,
}

impl<S> ReplayStream<S> {
    pub fn new(prefix: Vec<u8>, inner: S) -> Self {
        Self {
            prefix,
            pos: 0,
            inner,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: Read> Read for ReplayStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.prefix.len() {
            let n = buf.len().min(self.prefix.len() - self.pos);
            buf[..n].copy_from_slice(&self.prefix[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

impl<S: Write> Write for ReplayStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// =============================================================================
// Sniffing
// =============================================================================

/// Read the request head from a fresh connection: up to the blank line that
/// ends the headers, the size cap, EOF, or the socket's read timeout.
pub fn read_request_head(transport: &mut Transport) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(512);
    let mut buf = [0u8; 1024];
    loop {
        match transport.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                head.extend_from_slice(&buf[..n]);
                if head.len() >= MAX_REQUEST_HEAD || contains_header_end(&head) {
                    break;
                }
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(head)
}

fn contains_header_end(head: &[u8]) -> bool {
    head.windows(4).any(|w| w == b"\r\n\r\n")
}

/// Classify a connection from its first data chunk. Evaluated once; the
/// result never changes for the lifetime of the connection.
pub fn classify(head: &[u8]) -> Classification {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut request = httparse::Request::new(&mut headers);
    if request.parse(head).is_err() {
        return Classification::WebSocket;
    }

    let Some(method) = request.method else {
        return Classification::WebSocket;
    };
    let upgrade = request
        .headers
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case("upgrade"));
    if method != "GET" || upgrade {
        return Classification::WebSocket;
    }

    let path = request.path.unwrap_or("");
    if path == "/livereload.js" || path.starts_with("/livereload.js?") {
        Classification::Asset
    } else {
        Classification::Reject
    }
}

// =============================================================================
// HTTP Responses
// =============================================================================

/// Serve the embedded client script: 200, exact Content-Length, then the
/// caller closes the connection by dropping the transport.
pub fn respond_asset(transport: &mut Transport) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/javascript\r\nContent-Length: {}\r\n\r\n",
        LIVERELOAD_JS.len()
    );
    transport.write_all(head.as_bytes())?;
    transport.write_all(LIVERELOAD_JS.as_bytes())?;
    transport.flush()
}

/// Reject a request this port does not serve: 400 with a fixed body.
pub fn respond_reject(transport: &mut Transport) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        REJECT_BODY.len()
    );
    transport.write_all(head.as_bytes())?;
    transport.write_all(REJECT_BODY.as_bytes())?;
    transport.flush()
}

// =============================================================================
// WebSocket Upgrade
// =============================================================================

/// A client connection after the WebSocket handshake.
pub type WsConnection = WebSocket<ReplayStream<Transport>>;

/// Complete the WebSocket handshake, echoing the LiveReload subprotocol when
/// the client offered it.
pub fn upgrade(stream: ReplayStream<Transport>) -> Result<WsConnection> {
    tungstenite::accept_hdr(stream, |request: &Request, mut response: Response| {
        if offers_livereload_protocol(request) {
            response.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_static(PROTOCOL_V7),
            );
        }
        Ok(response)
    })
    .map_err(|e| anyhow::anyhow!("websocket handshake failed: {e}"))
}

fn offers_livereload_protocol(request: &Request) -> bool {
    request
        .headers()
        .get("Sec-WebSocket-Protocol")
        .and_then(|value| value.to_str().ok())
        .map(|offered| offered.split(',').any(|p| p.trim() == PROTOCOL_V7))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_classify_asset_request() {
        let head = b"GET /livereload.js HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(classify(head), Classification::Asset);
    }

    #[test]
    fn test_classify_asset_with_query() {
        let head = b"GET /livereload.js?snipver=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(classify(head), Classification::Asset);
    }

    #[test]
    fn test_classify_other_get_rejected() {
        let head = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(classify(head), Classification::Reject);

        let head = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(classify(head), Classification::Reject);
    }

    #[test]
    fn test_classify_upgrade_is_websocket() {
        let head = b"GET /livereload HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
        assert_eq!(classify(head), Classification::WebSocket);
    }

    #[test]
    fn test_classify_non_get_is_websocket() {
        let head = b"POST /anything HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(classify(head), Classification::WebSocket);
    }

    #[test]
    fn test_classify_garbage_is_websocket() {
        assert_eq!(classify(b"\x88\x00garbage"), Classification::WebSocket);
        assert_eq!(classify(b""), Classification::WebSocket);
    }

    #[test]
    fn test_replay_stream_yields_prefix_then_inner() {
        let inner = Cursor::new(b"world".to_vec());
        let mut stream = ReplayStream::new(b"hello ".to_vec(), inner);

        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_replay_stream_partial_reads() {
        let inner = Cursor::new(b"cd".to_vec());
        let mut stream = ReplayStream::new(b"ab".to_vec(), inner);

        let mut buf = [0u8; 1];
        for expected in [b'a', b'b', b'c', b'd'] {
            assert_eq!(stream.read(&mut buf).unwrap(), 1);
            assert_eq!(buf[0], expected);
        }
    }

    #[test]
    fn test_header_end_detection() {
        assert!(contains_header_end(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(!contains_header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"));
    }
}
