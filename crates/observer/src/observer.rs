use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use pagewatch_core_types::{EventKind, EventSet, NodeId};
use pagewatch_dom::Document;

use crate::element::{ElementCallback, ElementWatcher, WatchSpec};
use crate::errors::ObserverError;
use crate::handle::WatchHandle;
use crate::metrics;
use crate::navigation::NavigationWatcher;

/// Run a consumer callback, containing any panic to the callback itself.
pub(crate) fn guarded(label: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        metrics::record_callback_panic();
        error!(target: "pagewatch.observer", watch = label, "watch callback panicked");
    }
}

fn dispatch(callback: &ElementCallback, label: &str, events: Vec<(NodeId, EventKind)>) {
    for (node, kind) in events {
        metrics::record_event(kind);
        guarded(label, || callback(node, kind));
    }
}

/// Entry point for watching one document.
///
/// Element watches run as independent tasks over the document's mutation bus,
/// each handling one batch at a time. All of them hang off a single
/// cancellation root so [`ChangeObserver::shutdown`] tears everything down.
pub struct ChangeObserver {
    document: Document,
    shutdown: CancellationToken,
    navigation: OnceCell<Arc<NavigationWatcher>>,
}

impl std::fmt::Debug for ChangeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeObserver")
            .field("document", &self.document)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl ChangeObserver {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            shutdown: CancellationToken::new(),
            navigation: OnceCell::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Start watching `spec.selector`.
    ///
    /// `init` callbacks run on the calling thread before this returns. Any
    /// other event kind needs a tokio runtime to drive the watch task.
    pub fn watch(&self, spec: WatchSpec) -> Result<WatchHandle, ObserverError> {
        let label = spec.selector.source().to_string();
        if spec.events.is_empty() {
            return Err(ObserverError::NoEvents(label));
        }
        let mut watcher = ElementWatcher::new(spec.selector, spec.events);
        // Subscribe under the read lock so no batch falls between the
        // snapshot and the first received batch.
        let (mut rx, initial) = self.document.read(|tree| {
            let rx = self.document.subscribe();
            (rx, watcher.attach(tree))
        });
        let callback = spec.callback;
        dispatch(&callback, &label, initial);

        let shutdown = self.shutdown.child_token();
        if !watcher.needs_batches() {
            return Ok(WatchHandle::new(label, shutdown, None));
        }

        let document = self.document.clone();
        let task_shutdown = shutdown.clone();
        let task_label = label.clone();
        let task = tokio::spawn(async move {
            debug!(target: "pagewatch.observer", selector = %task_label, "element watcher started");
            loop {
                select! {
                    biased;
                    _ = task_shutdown.cancelled() => break,
                    batch = rx.recv() => match batch {
                        Ok(batch) => {
                            let started = Instant::now();
                            let events = document.read(|tree| watcher.classify(tree, &batch));
                            if task_shutdown.is_cancelled() {
                                break;
                            }
                            dispatch(&callback, &task_label, events);
                            metrics::record_batch(started.elapsed());
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            metrics::record_lagged(skipped);
                            warn!(
                                target: "pagewatch.observer",
                                selector = %task_label,
                                skipped,
                                "element watcher lagged; mutation batches dropped"
                            );
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!(target: "pagewatch.observer", selector = %task_label, "element watcher exited");
        });
        Ok(WatchHandle::new(label, shutdown, Some(task)))
    }

    /// Convenience over [`ChangeObserver::watch`] taking a selector string.
    pub fn watch_selector<F>(
        &self,
        selector: &str,
        events: EventSet,
        callback: F,
    ) -> Result<WatchHandle, ObserverError>
    where
        F: Fn(NodeId, EventKind) + Send + Sync + 'static,
    {
        self.watch(WatchSpec::new(selector, events, callback)?)
    }

    /// The document's navigation watcher, started on first use.
    pub fn navigation(&self) -> Arc<NavigationWatcher> {
        let watcher = self.navigation.get_or_init(|| {
            NavigationWatcher::spawn(self.document.clone(), self.shutdown.child_token())
        });
        Arc::clone(watcher)
    }

    /// Call `callback(new, previous)` whenever the location changes between
    /// mutation batches.
    pub fn watch_navigation<F>(&self, callback: F) -> WatchHandle
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.navigation().subscribe(callback)
    }

    /// Cancel every watch created through this observer.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!(target: "pagewatch.observer", "change observer shutting down");
        }
        self.shutdown.cancel();
        if let Some(navigation) = self.navigation.get() {
            navigation.stop();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(NodeId, EventKind)>>>;

    fn recorder() -> (Seen, impl Fn(NodeId, EventKind) + Send + Sync + 'static) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |node, kind| sink.lock().push((node, kind)))
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn item(doc: &Document, parent: NodeId) -> NodeId {
        let node = doc.create_element("li");
        doc.set_attribute(node, "class", "item").unwrap();
        doc.append_child(parent, node).unwrap();
        node
    }

    #[tokio::test]
    async fn init_runs_before_watch_returns() {
        let doc = Document::new("https://shop.test/", 8);
        let a = item(&doc, doc.root());
        let observer = ChangeObserver::new(doc.clone());
        let (seen, sink) = recorder();
        let _handle = observer
            .watch_selector(".item", EventSet::of(&[EventKind::Init]), sink)
            .unwrap();
        assert_eq!(*seen.lock(), vec![(a, EventKind::Init)]);
    }

    #[tokio::test]
    async fn lifecycle_events_follow_mutations() {
        let doc = Document::new("https://shop.test/", 8);
        let observer = ChangeObserver::new(doc.clone());
        let (seen, sink) = recorder();
        let _handle = observer
            .watch_selector(".item", EventSet::all(), sink)
            .unwrap();

        let node = item(&doc, doc.root());
        doc.flush();
        settle().await;
        doc.set_attribute(node, "data-price", "4").unwrap();
        doc.flush();
        settle().await;
        doc.remove(node).unwrap();
        doc.flush();
        settle().await;

        assert_eq!(
            *seen.lock(),
            vec![
                (node, EventKind::Added),
                (node, EventKind::Modified),
                (node, EventKind::Removed),
            ]
        );
    }

    #[tokio::test]
    async fn absent_kinds_never_fire() {
        let doc = Document::new("https://shop.test/", 8);
        item(&doc, doc.root());
        let observer = ChangeObserver::new(doc.clone());
        let (seen, sink) = recorder();
        let _handle = observer
            .watch_selector(".item", EventSet::of(&[EventKind::Removed]), sink)
            .unwrap();

        let node = item(&doc, doc.root());
        doc.flush();
        settle().await;
        doc.set_attribute(node, "data-price", "1").unwrap();
        doc.flush();
        settle().await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn cancel_stops_delivery_but_drop_does_not() {
        let doc = Document::new("https://shop.test/", 8);
        let observer = ChangeObserver::new(doc.clone());
        let (kept_seen, kept) = recorder();
        let (cancelled_seen, cancelled) = recorder();
        drop(
            observer
                .watch_selector(".item", EventSet::of(&[EventKind::Added]), kept)
                .unwrap(),
        );
        let handle = observer
            .watch_selector(".item", EventSet::of(&[EventKind::Added]), cancelled)
            .unwrap();
        handle.stop().await;
        assert!(handle.is_cancelled());

        item(&doc, doc.root());
        doc.flush();
        settle().await;
        assert_eq!(kept_seen.lock().len(), 1);
        assert!(cancelled_seen.lock().is_empty());
    }

    #[tokio::test]
    async fn panicking_callback_does_not_kill_the_watch() {
        let doc = Document::new("https://shop.test/", 8);
        let observer = ChangeObserver::new(doc.clone());
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        let _handle = observer
            .watch_selector(".item", EventSet::of(&[EventKind::Added]), move |_, _| {
                *counter.lock() += 1;
                panic!("consumer bug");
            })
            .unwrap();

        for _ in 0..2 {
            item(&doc, doc.root());
            doc.flush();
            settle().await;
        }
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn navigation_fires_only_on_location_change() {
        let doc = Document::new("https://shop.test/menu?date=2024-03-05", 8);
        let observer = ChangeObserver::new(doc.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = observer.watch_navigation(move |new, prev| {
            sink.lock().push((new.to_string(), prev.to_string()));
        });

        item(&doc, doc.root());
        doc.flush();
        settle().await;
        item(&doc, doc.root());
        doc.flush();
        settle().await;
        doc.navigate("https://shop.test/menu?date=2024-03-06");
        item(&doc, doc.root());
        doc.flush();
        settle().await;

        assert_eq!(
            *seen.lock(),
            vec![
                (
                    "https://shop.test/menu?date=2024-03-05".to_string(),
                    String::new()
                ),
                (
                    "https://shop.test/menu?date=2024-03-06".to_string(),
                    "https://shop.test/menu?date=2024-03-05".to_string()
                ),
            ]
        );
        assert_eq!(
            observer.navigation().current_url(),
            "https://shop.test/menu?date=2024-03-06"
        );
    }

    #[tokio::test]
    async fn empty_event_set_is_rejected() {
        let observer = ChangeObserver::new(Document::new("about:blank", 8));
        let err = observer
            .watch_selector(".item", EventSet::empty(), |_, _| {})
            .unwrap_err();
        assert!(matches!(err, ObserverError::NoEvents(_)));
    }

    #[tokio::test]
    async fn shutdown_cancels_every_watch() {
        let doc = Document::new("https://shop.test/", 8);
        let observer = ChangeObserver::new(doc.clone());
        let handle = observer
            .watch_selector(".item", EventSet::all(), |_, _| {})
            .unwrap();
        let nav = observer.watch_navigation(|_, _| {});
        observer.shutdown();
        assert!(handle.is_cancelled());
        assert!(nav.is_cancelled());
        assert!(observer.is_shut_down());
    }
}
