use std::collections::HashMap;

use serde::Serialize;

use pagewatch_core_types::{NodeId, Visibility};

/// An item whose price was read successfully during the current pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceItem {
    pub element: NodeId,
    pub price: f64,
}

impl PriceItem {
    pub fn new(element: NodeId, price: f64) -> Self {
        Self { element, price }
    }
}

/// A container and the priced items inside it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainerGroup {
    pub element: NodeId,
    pub members: Vec<PriceItem>,
}

/// Visibility decisions in the order they were computed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VisibilityMap {
    entries: Vec<(NodeId, Visibility)>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

impl VisibilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision. A later decision for the same node replaces the
    /// earlier one in place.
    pub fn insert(&mut self, node: NodeId, visibility: Visibility) {
        match self.index.get(&node) {
            Some(slot) => self.entries[*slot].1 = visibility,
            None => {
                self.index.insert(node, self.entries.len());
                self.entries.push((node, visibility));
            }
        }
    }

    pub fn get(&self, node: NodeId) -> Option<Visibility> {
        self.index.get(&node).map(|slot| self.entries[*slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Visibility)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, visibility)| visibility.is_visible())
            .count()
    }
}

impl FromIterator<(NodeId, Visibility)> for VisibilityMap {
    fn from_iter<I: IntoIterator<Item = (NodeId, Visibility)>>(iter: I) -> Self {
        let mut map = VisibilityMap::new();
        for (node, visibility) in iter {
            map.insert(node, visibility);
        }
        map
    }
}
