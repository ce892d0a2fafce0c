use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use pagewatch_core_types::{EventKind, EventSet, NodeId};
use pagewatch_dom::{DomTree, MutationBatch, MutationRecord, Selector};

use crate::errors::ObserverError;
use crate::registry::NodeRegistry;

pub type ElementCallback = Arc<dyn Fn(NodeId, EventKind) + Send + Sync>;

/// What to watch and whom to tell.
#[derive(Clone)]
pub struct WatchSpec {
    pub selector: Selector,
    pub events: EventSet,
    pub callback: ElementCallback,
}

impl WatchSpec {
    pub fn new<F>(selector: &str, events: EventSet, callback: F) -> Result<Self, ObserverError>
    where
        F: Fn(NodeId, EventKind) + Send + Sync + 'static,
    {
        Ok(Self {
            selector: Selector::parse(selector)?,
            events,
            callback: Arc::new(callback),
        })
    }
}

impl fmt::Debug for WatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSpec")
            .field("selector", &self.selector.source())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Turns mutation batches into lifecycle events for one selector.
///
/// The watcher itself never calls back; it only classifies, so the caller can
/// drop the document lock before dispatching.
#[derive(Debug)]
pub struct ElementWatcher {
    selector: Selector,
    events: EventSet,
    registry: Arc<NodeRegistry>,
    // First batch this watcher may see, and how many of its leading records
    // were queued before the subscription existed.
    start_seq: u64,
    skip_records: usize,
}

impl ElementWatcher {
    pub fn new(selector: Selector, events: EventSet) -> Self {
        Self {
            selector,
            events,
            registry: Arc::new(NodeRegistry::new()),
            start_seq: 0,
            skip_records: 0,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn events(&self) -> EventSet {
        self.events
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Whether later batches can produce anything for this watcher.
    pub fn needs_batches(&self) -> bool {
        [EventKind::Added, EventKind::Removed, EventKind::Modified]
            .into_iter()
            .any(|kind| self.events.contains(kind))
    }

    /// Bind the watcher to the current tree state. Returns the `init` events
    /// and starts per-node tracking for every node already present.
    pub fn attach(&mut self, tree: &DomTree) -> Vec<(NodeId, EventKind)> {
        self.start_seq = tree.next_batch_seq();
        self.skip_records = tree.pending_len();

        let present = tree.query_all(&self.selector);
        if self.events.contains(EventKind::Modified) {
            for node in &present {
                self.registry.attach(*node, self.start_seq);
            }
        }
        if !self.events.contains(EventKind::Init) {
            return Vec::new();
        }
        present
            .into_iter()
            .map(|node| (node, EventKind::Init))
            .collect()
    }

    /// Events for one batch, in dispatch order: added and removed per record,
    /// then one `modified` per tracked node the batch touched.
    pub fn classify(&self, tree: &DomTree, batch: &MutationBatch) -> Vec<(NodeId, EventKind)> {
        if batch.seq < self.start_seq {
            return Vec::new();
        }
        let skip = if batch.seq == self.start_seq {
            self.skip_records
        } else {
            0
        };
        let entries: Vec<(&MutationRecord, bool)> = batch.entries().skip(skip).collect();

        // Nodes picked up by this batch are tracked from the next one on.
        let modified = if self.events.contains(EventKind::Modified) {
            self.touched_nodes(tree, entries.iter().map(|(record, _)| *record), batch.seq)
        } else {
            Vec::new()
        };

        let mut out = Vec::new();
        // Structural changes inside detached subtrees are invisible to a
        // document-wide observer.
        for (record, _) in entries.iter().filter(|(_, connected)| *connected) {
            for root in record.added_nodes() {
                let matches = tree
                    .subtree(*root)
                    .into_iter()
                    .filter(|node| self.selector.matches(tree, *node))
                    .count();
                if matches == 0 {
                    continue;
                }
                if self.events.contains(EventKind::Added) {
                    out.extend(std::iter::repeat((*root, EventKind::Added)).take(matches));
                }
                if self.events.contains(EventKind::Modified) {
                    self.registry.attach(*root, batch.seq + 1);
                }
            }
            if self.events.contains(EventKind::Removed) {
                out.extend(
                    record
                        .removed_nodes()
                        .iter()
                        .filter(|node| self.selector.matches(tree, **node))
                        .map(|node| (*node, EventKind::Removed)),
                );
            }
        }
        out.extend(modified.into_iter().map(|node| (node, EventKind::Modified)));
        out
    }

    fn touched_nodes<'a>(
        &self,
        tree: &DomTree,
        records: impl Iterator<Item = &'a MutationRecord>,
        seq: u64,
    ) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut touched = Vec::new();
        for record in records {
            let mut cursor = Some(record.target());
            while let Some(node) = cursor {
                if self.registry.observes(node, seq) && seen.insert(node) {
                    touched.push(node);
                }
                cursor = tree.parent(node);
            }
        }
        touched
    }
}
