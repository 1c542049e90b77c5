//! Reload Reactor
//!
//! One thread owns the listening socket and every client connection. The
//! loop is cooperative: each tick drains control events, accepts pending
//! connections, and polls clients for inbound frames. Because nothing else
//! touches the sockets or the registry, no locking is needed inside the
//! loop.
//!
//! The owner talks to the loop through a [`ReactorHandle`]: broadcasts and
//! stop requests are messages on a channel, never direct mutation from a
//! foreign thread.
//!
//! ```text
//! build hooks --Broadcast--> reactor loop --reload frames--> browsers
//! owner       --Stop------->
//! ```

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use thiserror::Error;

use crate::build::ChangeSet;
use crate::config::ReloadConfig;
use crate::reload::dispatch::{self, Classification, ReplayStream, Transport};
use crate::reload::protocol::LiveReloadMessage;
use crate::reload::registry::ClientRegistry;
use crate::reload::tls::{TlsAcceptor, TlsError};
use crate::{debug, log};

/// Tick interval of the cooperative loop.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read/write timeout while sniffing and handshaking a new connection.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// Reactor lifecycle errors.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("reload server is already running")]
    AlreadyRunning,

    #[error("failed to bind reload server on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Where the loop is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Lifecycle::Starting,
            2 => Lifecycle::Running,
            3 => Lifecycle::Stopping,
            _ => Lifecycle::Stopped,
        }
    }
}

/// Events the loop consumes from other threads.
#[derive(Debug)]
pub enum ReactorEvent {
    /// Announce one reload per listed page to every client.
    Broadcast(ChangeSet),
    /// Close everything and exit the loop.
    Stop,
}

/// Cross-thread surface of a running reactor.
#[derive(Debug, Clone)]
pub struct ReactorHandle {
    events: Sender<ReactorEvent>,
}

impl ReactorHandle {
    pub(crate) fn new(events: Sender<ReactorEvent>) -> Self {
        Self { events }
    }

    /// Queue a broadcast of one reload message per changed page.
    pub fn broadcast(&self, changes: ChangeSet) {
        if self.events.send(ReactorEvent::Broadcast(changes)).is_err() {
            debug!("reload"; "broadcast requested after reactor stopped");
        }
    }

    /// Ask the loop to shut down without blocking for it.
    ///
    /// [`Reactor::stop`] also joins the thread; use that where you own the
    /// reactor.
    pub fn request_stop(&self) {
        let _ = self.events.send(ReactorEvent::Stop);
    }
}

// =============================================================================
// Reactor
// =============================================================================

/// The reload server: owns lifecycle state and the loop thread.
pub struct Reactor {
    config: ReloadConfig,
    state: Arc<AtomicU8>,
    events: Option<Sender<ReactorEvent>>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Reactor {
    pub fn new(config: ReloadConfig) -> Self {
        Self {
            config,
            state: Arc::new(AtomicU8::new(Lifecycle::Stopped as u8)),
            events: None,
            thread: None,
            local_addr: None,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    /// Address the listener bound to, once started. Useful when the
    /// configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind and spawn the loop thread.
    ///
    /// Only legal from `Stopped`; starting a running reactor is a
    /// programming error and is reported as [`ReactorError::AlreadyRunning`].
    /// TLS material is loaded before the socket is opened so configuration
    /// problems abort startup cleanly.
    pub fn start(&mut self) -> Result<ReactorHandle, ReactorError> {
        if self.lifecycle() != Lifecycle::Stopped {
            return Err(ReactorError::AlreadyRunning);
        }
        self.set_state(Lifecycle::Starting);

        let acceptor = match self.config.tls_pair() {
            Some((cert, key)) => match TlsAcceptor::from_pem_files(cert, key) {
                Ok(acceptor) => Some(acceptor),
                Err(e) => {
                    self.set_state(Lifecycle::Stopped);
                    return Err(e.into());
                }
            },
            None => None,
        };

        let addr = SocketAddr::new(self.config.interface, self.config.port);
        let listener = match bind_listener(addr) {
            Ok(listener) => listener,
            Err(source) => {
                self.set_state(Lifecycle::Stopped);
                return Err(ReactorError::Bind { addr, source });
            }
        };
        self.local_addr = listener.local_addr().ok();

        let (events_tx, events_rx) = channel::unbounded();
        let handle = ReactorHandle::new(events_tx.clone());
        let state = Arc::clone(&self.state);
        let server_name = self.config.server_name.clone();
        let live_css = self.config.live_css;

        self.thread = Some(std::thread::spawn(move || {
            run_loop(listener, acceptor, server_name, live_css, events_rx, state);
        }));
        self.events = Some(events_tx);

        Ok(handle)
    }

    /// Stop the loop, close all sockets, and join the thread.
    ///
    /// Safe to call from any thread that owns the reactor; a no-op when
    /// already stopped.
    pub fn stop(&mut self) {
        if self.lifecycle() == Lifecycle::Stopped && self.thread.is_none() {
            return;
        }
        self.set_state(Lifecycle::Stopping);

        if let Some(events) = self.events.take() {
            let _ = events.send(ReactorEvent::Stop);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        self.local_addr = None;
        self.set_state(Lifecycle::Stopped);
        debug!("reload"; "reactor halted");
    }

    fn set_state(&self, state: Lifecycle) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

// =============================================================================
// Loop
// =============================================================================

fn run_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    server_name: String,
    live_css: bool,
    events: Receiver<ReactorEvent>,
    state: Arc<AtomicU8>,
) {
    state.store(Lifecycle::Running as u8, Ordering::SeqCst);
    let mut registry = ClientRegistry::new(server_name);

    loop {
        match events.try_recv() {
            Ok(ReactorEvent::Stop) => break,
            Ok(ReactorEvent::Broadcast(changes)) => {
                broadcast_changes(&mut registry, &changes, live_css);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        accept_pending(&listener, acceptor.as_ref(), &mut registry);
        registry.poll_inbound();

        std::thread::sleep(POLL_INTERVAL);
    }

    registry.close_all();
}

/// One reload message per changed page, to every client, in set order.
fn broadcast_changes(registry: &mut ClientRegistry, changes: &[String], live_css: bool) {
    for path in changes {
        debug!("reload"; "reloading {}", path);
        registry.broadcast(&LiveReloadMessage::reload_with_css(path.clone(), live_css));
    }
}

/// Drain the accept queue without blocking the tick.
fn accept_pending(
    listener: &TcpListener,
    acceptor: Option<&TlsAcceptor>,
    registry: &mut ClientRegistry,
) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = admit(stream, addr, acceptor, registry) {
                    debug!("reload"; "connection from {} dropped: {:#}", addr, e);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                break;
            }
        }
    }
}

/// Sniff, classify, and finish one accepted connection.
///
/// HTTP branches answer and close by dropping the transport. The WebSocket
/// branch hands the replayed bytes to the handshake, then registers the
/// client for polling.
fn admit(
    stream: TcpStream,
    addr: SocketAddr,
    acceptor: Option<&TlsAcceptor>,
    registry: &mut ClientRegistry,
) -> Result<()> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    stream.set_write_timeout(Some(HANDSHAKE_TIMEOUT))?;

    let mut transport = match acceptor {
        Some(acceptor) => acceptor.accept(stream)?,
        None => Transport::Plain(stream),
    };

    let head = dispatch::read_request_head(&mut transport)?;
    match dispatch::classify(&head) {
        Classification::Asset => {
            debug!("reload"; "serving livereload.js to {}", addr);
            dispatch::respond_asset(&mut transport)?;
        }
        Classification::Reject => {
            debug!("reload"; "rejecting non-reload request from {}", addr);
            dispatch::respond_reject(&mut transport)?;
        }
        Classification::WebSocket => {
            let ws = dispatch::upgrade(ReplayStream::new(head, transport))?;

            // Handshake is done; switch to non-blocking for loop polling
            let tcp = ws.get_ref().get_ref().tcp();
            tcp.set_read_timeout(None)?;
            tcp.set_write_timeout(None)?;
            tcp.set_nonblocking(true)?;

            registry.add(ws, addr);
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
