//! Build-Cycle Bridge
//!
//! Two hook points wire an external build pipeline to the reactor. The
//! pipeline calls [`BuildHooks::post_render`] after rendering (while its
//! change detector can still tell fresh output from stale) and
//! [`BuildHooks::post_write`] after outputs hit disk. The hooks never touch
//! the client registry: the pending set crosses to the reactor thread as a
//! single broadcast event.

use regex::Regex;

use crate::debug;
use crate::reload::reactor::ReactorHandle;

/// Ordered page paths that changed during one build cycle. Produced once per
/// cycle, consumed once, then discarded.
pub type ChangeSet = Vec<String>;

/// The external change-detection collaborator.
///
/// Answers, per page, whether its content changed since the last build. Only
/// meaningful between the render and write phases of a cycle; after the
/// write phase every page reports fresh.
pub trait ChangeDetector {
    fn changed(&self, page: &str) -> bool;
}

impl<F> ChangeDetector for F
where
    F: Fn(&str) -> bool,
{
    fn changed(&self, page: &str) -> bool {
        self(page)
    }
}

/// Per-build-cycle state between the two hook invocations.
pub struct BuildHooks {
    handle: ReactorHandle,
    ignore: Vec<Regex>,
    pending: Option<ChangeSet>,
}

impl BuildHooks {
    pub fn new(handle: ReactorHandle) -> Self {
        Self {
            handle,
            ignore: Vec::new(),
            pending: None,
        }
    }

    /// Pages matching any of these patterns never trigger a reload.
    pub fn with_ignore(mut self, patterns: Vec<Regex>) -> Self {
        self.ignore = patterns;
        self
    }

    /// Post-render hook: record which of this cycle's pages changed.
    ///
    /// Must run before the write phase; the detector's signal is only
    /// accurate while outputs are still stale on disk.
    pub fn post_render<D: ChangeDetector>(&mut self, pages: &[String], detector: &D) {
        let changed: ChangeSet = pages
            .iter()
            .filter(|page| !self.is_ignored(page))
            .filter(|page| detector.changed(page))
            .cloned()
            .collect();
        debug!("reload"; "{} of {} pages changed this cycle", changed.len(), pages.len());
        self.pending = Some(changed);
    }

    /// Post-write hook: announce the pending set, then clear it so an empty
    /// cycle never leaks into the next one.
    pub fn post_write(&mut self) {
        let Some(changes) = self.pending.take() else {
            return;
        };
        if changes.is_empty() {
            return;
        }
        self.handle.broadcast(changes);
    }

    fn is_ignored(&self, page: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::reactor::ReactorEvent;
    use crossbeam::channel::{self, Receiver};
    use std::time::Duration;

    fn test_hooks() -> (BuildHooks, Receiver<ReactorEvent>) {
        let (tx, rx) = channel::unbounded();
        (BuildHooks::new(ReactorHandle::new(tx)), rx)
    }

    fn pages(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn recv_broadcast(rx: &Receiver<ReactorEvent>) -> ChangeSet {
        match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            ReactorEvent::Broadcast(changes) => changes,
            other => panic!("expected broadcast, got {other:?}"),
        }
    }

    #[test]
    fn test_changed_pages_are_broadcast_in_order() {
        let (mut hooks, rx) = test_hooks();

        hooks.post_render(&pages(&["a.html", "b.html", "c.html"]), &|page: &str| {
            page != "b.html"
        });
        hooks.post_write();

        assert_eq!(recv_broadcast(&rx), pages(&["a.html", "c.html"]));
    }

    #[test]
    fn test_empty_cycle_sends_nothing() {
        let (mut hooks, rx) = test_hooks();

        hooks.post_render(&pages(&["a.html"]), &|_: &str| false);
        hooks.post_write();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_write_without_render_is_a_no_op() {
        let (mut hooks, rx) = test_hooks();

        hooks.post_write();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pending_set_is_consumed_once() {
        let (mut hooks, rx) = test_hooks();

        hooks.post_render(&pages(&["a.html"]), &|_: &str| true);
        hooks.post_write();
        hooks.post_write();

        assert_eq!(recv_broadcast(&rx), pages(&["a.html"]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_set_does_not_leak_into_next_cycle() {
        let (mut hooks, rx) = test_hooks();

        hooks.post_render(&pages(&["a.html"]), &|_: &str| true);
        hooks.post_write();
        let _ = recv_broadcast(&rx);

        // Next cycle changes nothing
        hooks.post_render(&pages(&["a.html"]), &|_: &str| false);
        hooks.post_write();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ignored_pages_are_filtered() {
        let (mut hooks, rx) = test_hooks();
        hooks = hooks.with_ignore(vec![Regex::new(r"\.map$").unwrap()]);

        hooks.post_render(
            &pages(&["site.css.map", "index.html"]),
            &|_: &str| true,
        );
        hooks.post_write();

        assert_eq!(recv_broadcast(&rx), pages(&["index.html"]));
    }
}
