//! Standalone serve command: reactor plus output watcher.

use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use crossbeam::channel;

use crate::build::BuildHooks;
use crate::config::Config;
use crate::log;
use crate::reload::reactor::Reactor;
use crate::watch::OutputWatcher;

/// Run the reload server over a built site directory until Ctrl+C.
pub fn serve(
    config: &Config,
    site: &Path,
    interface: Option<IpAddr>,
    port: Option<u16>,
) -> Result<()> {
    let mut reload = config.reload.clone();
    if let Some(interface) = interface {
        reload.interface = interface;
    }
    if let Some(port) = port {
        reload.port = port;
    }
    let ignore = reload.ignore_patterns()?;
    let secure = reload.tls_pair().is_some();

    let mut reactor = Reactor::new(reload);
    let handle = reactor.start()?;
    if let Some(addr) = reactor.local_addr() {
        let scheme = if secure { "wss" } else { "ws" };
        log!("reload"; "{}://{}/livereload", scheme, addr);
    }

    let hooks = BuildHooks::new(handle).with_ignore(ignore);
    let watcher = OutputWatcher::spawn(site.to_path_buf(), hooks)
        .with_context(|| format!("failed to watch {}", site.display()))?;
    log!("watch"; "{}", site.display());

    // Park until the process-level shutdown signal, then stop through the
    // reactor's own surface
    let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("failed to set Ctrl+C handler")?;
    let _ = shutdown_rx.recv();

    log!("reload"; "shutting down...");
    watcher.stop();
    reactor.stop();
    Ok(())
}
