use std::sync::Arc;

use pagewatch_core_types::NodeId;

/// One change applied to the document since the previous flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
    CharacterData {
        target: NodeId,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. }
            | MutationRecord::CharacterData { target } => *target,
        }
    }

    pub fn added_nodes(&self) -> &[NodeId] {
        match self {
            MutationRecord::ChildList { added, .. } => added,
            _ => &[],
        }
    }

    pub fn removed_nodes(&self) -> &[NodeId] {
        match self {
            MutationRecord::ChildList { removed, .. } => removed,
            _ => &[],
        }
    }
}

/// Records delivered together by a single flush.
#[derive(Clone, Debug)]
pub struct MutationBatch {
    pub seq: u64,
    pub records: Arc<Vec<MutationRecord>>,
    /// Parallel to `records`: whether the target was attached to the
    /// document when the record was queued.
    pub connected: Arc<Vec<bool>>,
}

impl MutationBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MutationRecord> {
        self.records.iter()
    }

    /// Records paired with their document-attachment flag.
    pub fn entries(&self) -> impl Iterator<Item = (&MutationRecord, bool)> {
        self.records
            .iter()
            .zip(self.connected.iter().copied().chain(std::iter::repeat(false)))
    }
}
