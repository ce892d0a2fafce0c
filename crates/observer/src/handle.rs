use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pagewatch_core_types::SubscriptionId;

/// Explicit teardown for one watch.
///
/// Dropping the handle leaves the watch running; only [`WatchHandle::cancel`]
/// (or cancelling the owning observer) stops it.
#[derive(Debug)]
pub struct WatchHandle {
    id: SubscriptionId,
    label: String,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WatchHandle {
    pub(crate) fn new(
        label: impl Into<String>,
        shutdown: CancellationToken,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            label: label.into(),
            shutdown,
            task: Mutex::new(task),
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Selector or watcher name this handle was created for.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel(&self) {
        if !self.shutdown.is_cancelled() {
            debug!(target: "pagewatch.observer", id = %self.id, label = %self.label, "watch cancelled");
        }
        self.shutdown.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancel and wait until the watch task has exited.
    pub async fn stop(&self) {
        self.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
