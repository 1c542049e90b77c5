//! Output Watcher
//!
//! Standalone serve mode has no build pipeline to call the hooks, so a
//! filesystem watcher over the built site stands in for it: every debounced
//! batch of file events becomes one build cycle, with the event itself as
//! the change signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::build::{BuildHooks, ChangeDetector};
use crate::log;

/// Quiet period before a batch of events is flushed as one cycle.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// How often the idle loop re-checks the stop flag.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// The filesystem event is its own change signal.
struct FsChanges;

impl ChangeDetector for FsChanges {
    fn changed(&self, _page: &str) -> bool {
        true
    }
}

/// Watches a built site directory and feeds reload cycles to the hooks.
pub struct OutputWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl OutputWatcher {
    /// Start watching `root` recursively on a background thread.
    pub fn spawn(root: PathBuf, mut hooks: BuildHooks) -> notify::Result<Self> {
        let (events_tx, events_rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = events_tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = std::thread::spawn(move || {
            // Watcher must stay alive as long as the loop runs
            let _watcher = watcher;
            watch_loop(&root, &events_rx, &mut hooks, &stop_flag);
        });

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop watching and join the thread.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn watch_loop(
    root: &Path,
    events: &Receiver<notify::Result<notify::Event>>,
    hooks: &mut BuildHooks,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        let first = match events.recv_timeout(IDLE_POLL) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                log!("watch"; "notify error: {}", e);
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Absorb follow-up events until the burst settles
        let mut pages = Vec::new();
        let mut seen = FxHashSet::default();
        collect_pages(root, &first, &mut pages, &mut seen);
        while let Ok(result) = events.recv_timeout(DEBOUNCE) {
            if let Ok(event) = result {
                collect_pages(root, &event, &mut pages, &mut seen);
            }
        }

        if pages.is_empty() {
            continue;
        }
        hooks.post_render(&pages, &FsChanges);
        hooks.post_write();
    }
}

/// Turn one notify event into page paths, preserving first-seen order.
fn collect_pages(
    root: &Path,
    event: &notify::Event,
    pages: &mut Vec<String>,
    seen: &mut FxHashSet<String>,
) {
    if event.kind.is_access() {
        return;
    }
    for path in &event.paths {
        if is_temp_file(path) {
            continue;
        }
        if let Some(page) = page_path(root, path)
            && seen.insert(page.clone())
        {
            pages.push(page);
        }
    }
}

/// Check if path is a temp/backup file (editor artifacts)
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Map an absolute output file to the site-relative page path browsers see.
fn page_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    let mut page = String::from("/");
    page.push_str(&rel.to_string_lossy().replace('\\', "/"));
    Some(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path_is_site_relative() {
        let root = Path::new("/site/public");
        assert_eq!(
            page_path(root, Path::new("/site/public/blog/post.html")),
            Some("/blog/post.html".to_string())
        );
        assert_eq!(page_path(root, Path::new("/site/public")), None);
        assert_eq!(page_path(root, Path::new("/elsewhere/post.html")), None);
    }

    #[test]
    fn test_temp_files_are_skipped() {
        assert!(is_temp_file(Path::new("/out/index.html.swp")));
        assert!(is_temp_file(Path::new("/out/index.html~")));
        assert!(is_temp_file(Path::new("/out/.index.html.kate-swp")));
        assert!(!is_temp_file(Path::new("/out/index.html")));
    }

    #[test]
    fn test_collect_pages_dedups_preserving_order() {
        let root = Path::new("/out");
        let mut pages = Vec::new();
        let mut seen = FxHashSet::default();

        let mut event = notify::Event::new(notify::EventKind::Modify(
            notify::event::ModifyKind::Any,
        ));
        event.paths = vec![
            PathBuf::from("/out/a.html"),
            PathBuf::from("/out/b.html"),
            PathBuf::from("/out/a.html"),
        ];
        collect_pages(root, &event, &mut pages, &mut seen);

        assert_eq!(pages, vec!["/a.html".to_string(), "/b.html".to_string()]);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let root = Path::new("/out");
        let mut pages = Vec::new();
        let mut seen = FxHashSet::default();

        let mut event = notify::Event::new(notify::EventKind::Access(
            notify::event::AccessKind::Read,
        ));
        event.paths = vec![PathBuf::from("/out/a.html")];
        collect_pages(root, &event, &mut pages, &mut seen);

        assert!(pages.is_empty());
    }
}
