use dashmap::DashMap;

use pagewatch_core_types::NodeId;

/// Per-node "modified" subscriptions of one element watch.
///
/// A node id is registered at most once for the life of the document, so a
/// node that leaves and re-enters the tree keeps its single subscription.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    // Value: sequence number of the first batch the node observes.
    nodes: DashMap<NodeId, u64>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscription for `node`, effective from batch `from_seq`.
    /// Returns false when the node was already subscribed.
    pub fn attach(&self, node: NodeId, from_seq: u64) -> bool {
        let mut attached = false;
        self.nodes.entry(node).or_insert_with(|| {
            attached = true;
            from_seq
        });
        attached
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Whether `node` was subscribed before batch `seq` was produced.
    pub fn observes(&self, node: NodeId, seq: u64) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|from_seq| *from_seq <= seq)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
