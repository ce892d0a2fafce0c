use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pagewatch_dom::Document;

use crate::handle::WatchHandle;
use crate::metrics;
use crate::observer::guarded;

pub type NavigationCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

struct Listener {
    shutdown: CancellationToken,
    callback: NavigationCallback,
}

/// Detects location changes by comparing the document location against the
/// last value seen, once per mutation batch.
///
/// One watcher per document; consumers share it and register listeners.
pub struct NavigationWatcher {
    document: Document,
    current_url: RwLock<String>,
    listeners: RwLock<Vec<Listener>>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for NavigationWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationWatcher")
            .field("current_url", &*self.current_url.read())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl NavigationWatcher {
    /// A watcher with no background task; drive it with [`Self::check`].
    pub fn new(document: Document, shutdown: CancellationToken) -> Self {
        Self {
            document,
            current_url: RwLock::new(String::new()),
            listeners: RwLock::new(Vec::new()),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Create a watcher that checks the location after every mutation batch.
    pub fn spawn(document: Document, shutdown: CancellationToken) -> Arc<Self> {
        let watcher = Arc::new(Self::new(document, shutdown.clone()));
        let weak: Weak<Self> = Arc::downgrade(&watcher);
        let mut rx = watcher.document.subscribe();

        let task = tokio::spawn(async move {
            debug!(target: "pagewatch.observer", "navigation watcher started");
            loop {
                select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    batch = rx.recv() => {
                        match batch {
                            Ok(_) => {}
                            Err(RecvError::Lagged(skipped)) => {
                                // The location is re-read anyway; nothing is lost.
                                metrics::record_lagged(skipped);
                                warn!(target: "pagewatch.observer", skipped, "navigation watcher lagged");
                            }
                            Err(RecvError::Closed) => break,
                        }
                        let Some(watcher) = weak.upgrade() else {
                            break;
                        };
                        watcher.check();
                    }
                }
            }
            debug!(target: "pagewatch.observer", "navigation watcher exited");
        });
        *watcher.task.lock() = Some(task);
        watcher
    }

    pub fn current_url(&self) -> String {
        self.current_url.read().clone()
    }

    /// Compare the live location with the stored one. On change the stored
    /// value is replaced before listeners run, and `(new, previous)` is
    /// returned.
    pub fn check(&self) -> Option<(String, String)> {
        let location = self.document.location();
        let previous = {
            let mut current = self.current_url.write();
            if *current == location {
                return None;
            }
            std::mem::replace(&mut *current, location.clone())
        };
        metrics::record_navigation();
        debug!(target: "pagewatch.observer", from = %previous, to = %location, "navigation detected");

        let callbacks: Vec<NavigationCallback> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|listener| !listener.shutdown.is_cancelled());
            listeners
                .iter()
                .map(|listener| Arc::clone(&listener.callback))
                .collect()
        };
        for callback in callbacks {
            guarded("navigation", || callback(&location, &previous));
        }
        Some((location, previous))
    }

    /// Register a listener for `(new, previous)` location pairs.
    pub fn subscribe<F>(&self, callback: F) -> WatchHandle
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let shutdown = self.shutdown.child_token();
        self.listeners.write().push(Listener {
            shutdown: shutdown.clone(),
            callback: Arc::new(callback),
        });
        WatchHandle::new("navigation", shutdown, None)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|listener| !listener.shutdown.is_cancelled())
            .count()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}
