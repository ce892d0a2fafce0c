use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use pagewatch_core_types::{NodeId, Visibility};
use pagewatch_event_bus::{EventBus, InMemoryBus};

use crate::errors::DomError;
use crate::mutation::{MutationBatch, MutationRecord};
use crate::node::{Element, Node, NodeKind};
use crate::selector::Selector;

/// Attribute carrying the display state written by the filter.
pub const HIDDEN_ATTR: &str = "hidden";
pub const CHECKED_ATTR: &str = "checked";

/// Arena backing a [`Document`]. Read access is handed out through
/// [`Document::read`] so several queries can share one lock.
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
    root: NodeId,
    location: String,
    pending: Vec<MutationRecord>,
    // Whether each pending record's target was in the document when queued.
    pending_connected: Vec<bool>,
    next_seq: u64,
}

impl DomTree {
    fn new(location: String) -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Document)],
            root: NodeId(0),
            location,
            pending: Vec::new(),
            pending_connected: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).and_then(Node::element)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag_name.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    /// True when `ancestor` is `node` itself or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        selector.matches(self, id)
    }

    /// Depth-first pre-order walk over `root` and its descendants.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if self.node(current).is_none() {
                continue;
            }
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Elements in `root`'s subtree (root included) matching `selector`, in
    /// document order.
    pub fn query_within(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.subtree(root)
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.query_within(self.root, selector)
    }

    pub fn query_first(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.subtree(root)
            .into_iter()
            .find(|id| selector.matches(self, *id))
    }

    pub fn visibility(&self, id: NodeId) -> Visibility {
        Visibility::from_visible(self.attribute(id, HIDDEN_ATTR).is_none())
    }

    pub fn is_checked(&self, id: NodeId) -> bool {
        self.attribute(id, CHECKED_ATTR).is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Sequence number the next flushed batch will carry.
    pub fn next_batch_seq(&self) -> u64 {
        self.next_seq
    }

    fn ensure(&self, id: NodeId) -> Result<(), DomError> {
        if self.node(id).is_some() {
            Ok(())
        } else {
            Err(DomError::UnknownNode(id))
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != child);
        self.nodes[child.0].parent = None;
        self.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
        });
    }

    fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.ensure(parent)?;
        self.ensure(child)?;
        if child == self.root {
            return Err(DomError::RootImmutable);
        }
        if !self.nodes[parent.0].can_have_children() {
            return Err(DomError::NotAContainer(parent));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) || reference == child {
                return Err(DomError::NotAChild { parent, reference });
            }
        }

        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|reference| siblings.iter().position(|c| *c == reference))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    fn write_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<bool, DomError> {
        let element = self
            .nodes
            .get_mut(id.0)
            .ok_or(DomError::UnknownNode(id))?
            .element_mut()
            .ok_or(DomError::NotAContainer(id))?;
        let name = name.to_ascii_lowercase();
        let changed = match value {
            Some(value) => {
                let previous = element.attrs.insert(name.clone(), value.to_string());
                previous.as_deref() != Some(value)
            }
            None => element.attrs.remove(&name).is_some(),
        };
        if changed {
            self.record(MutationRecord::Attributes { target: id, name });
        }
        Ok(changed)
    }

    fn record(&mut self, record: MutationRecord) {
        let connected = self.is_connected(record.target());
        self.pending.push(record);
        self.pending_connected.push(connected);
    }

    fn take_batch(&mut self) -> Option<MutationBatch> {
        if self.pending.is_empty() {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Some(MutationBatch {
            seq,
            records: Arc::new(std::mem::take(&mut self.pending)),
            connected: Arc::new(std::mem::take(&mut self.pending_connected)),
        })
    }
}

/// Shared handle to a live document.
///
/// Cloning is cheap; all clones observe and mutate the same tree. Writes are
/// visible to subsequent reads immediately, while subscribers learn about
/// them only when someone calls [`Document::flush`].
#[derive(Clone)]
pub struct Document {
    tree: Arc<RwLock<DomTree>>,
    bus: Arc<InMemoryBus<MutationBatch>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tree = self.tree.read();
        f.debug_struct("Document")
            .field("location", &tree.location)
            .field("nodes", &tree.nodes.len())
            .field("pending", &tree.pending.len())
            .finish()
    }
}

impl Document {
    pub fn new(location: impl Into<String>, bus_capacity: usize) -> Self {
        Self {
            tree: Arc::new(RwLock::new(DomTree::new(location.into()))),
            bus: InMemoryBus::new(bus_capacity),
        }
    }

    /// Run several reads against one consistent view of the tree.
    ///
    /// The closure must not call back into mutating `Document` methods.
    pub fn read<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        f(&self.tree.read())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationBatch> {
        self.bus.subscribe()
    }

    /// Deliver every queued record to subscribers as one batch. Returns the
    /// batch sequence number when anything was pending.
    pub fn flush(&self) -> Option<u64> {
        let batch = self.tree.write().take_batch()?;
        let seq = batch.seq;
        let records = batch.len();
        match self.bus.publish(batch) {
            Ok(receivers) => {
                trace!(target: "pagewatch.dom", seq, records, receivers, "mutation batch delivered");
            }
            Err(err) => {
                debug!(target: "pagewatch.dom", seq, %err, "mutation batch dropped");
            }
        }
        Some(seq)
    }

    pub fn root(&self) -> NodeId {
        self.tree.read().root
    }

    pub fn location(&self) -> String {
        self.tree.read().location.clone()
    }

    /// Change the navigation location. Like a history push, this produces no
    /// mutation record on its own.
    pub fn navigate(&self, url: impl Into<String>) {
        let url = url.into();
        debug!(target: "pagewatch.dom", %url, "location changed");
        self.tree.write().location = url;
    }

    pub fn create_element(&self, tag_name: &str) -> NodeId {
        self.tree
            .write()
            .push_node(NodeKind::Element(Element::new(tag_name)))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.tree.write().push_node(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.tree.write().insert(parent, child, None)
    }

    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.tree.write().insert(parent, child, reference)
    }

    /// Detach `node` from its parent. Removing a detached node is a no-op.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.ensure(node)?;
        if node == tree.root {
            return Err(DomError::RootImmutable);
        }
        tree.detach(node);
        Ok(())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<bool, DomError> {
        self.tree.write().write_attribute(node, name, Some(value))
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<bool, DomError> {
        self.tree.write().write_attribute(node, name, None)
    }

    /// Replace the text of a text node, or the children of an element with a
    /// single text node.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut guard = self.tree.write();
        let tree = &mut *guard;
        tree.ensure(node)?;
        if let NodeKind::Text(current) = &mut tree.nodes[node.0].kind {
            if current != text {
                *current = text.to_string();
                tree.record(MutationRecord::CharacterData { target: node });
            }
            return Ok(());
        }
        if !tree.nodes[node.0].can_have_children() {
            return Err(DomError::NotAContainer(node));
        }
        if tree.text_content(node) == text && tree.children(node).len() == 1 {
            return Ok(());
        }
        let removed = std::mem::take(&mut tree.nodes[node.0].children);
        for child in &removed {
            tree.nodes[child.0].parent = None;
        }
        let text_node = tree.push_node(NodeKind::Text(text.to_string()));
        tree.nodes[node.0].children.push(text_node);
        tree.nodes[text_node.0].parent = Some(node);
        tree.record(MutationRecord::ChildList {
            target: node,
            added: vec![text_node],
            removed,
        });
        Ok(())
    }

    pub fn set_checked(&self, node: NodeId, checked: bool) -> Result<bool, DomError> {
        if checked {
            self.set_attribute(node, CHECKED_ATTR, "")
        } else {
            self.remove_attribute(node, CHECKED_ATTR)
        }
    }

    /// Write a display decision. Only an actual change is recorded.
    pub fn set_visibility(&self, node: NodeId, visibility: Visibility) -> Result<bool, DomError> {
        match visibility {
            Visibility::Visible => self.remove_attribute(node, HIDDEN_ATTR),
            Visibility::Hidden => self.set_attribute(node, HIDDEN_ATTR, ""),
        }
    }

    pub fn visibility(&self, node: NodeId) -> Visibility {
        self.tree.read().visibility(node)
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.tree.read().is_checked(node)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree.read().attribute(node, name).map(str::to_string)
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.tree.read().text_content(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().parent(node)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.tree.read().is_connected(node)
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.tree.read().matches(node, selector)
    }

    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.tree.read().query_all(selector)
    }

    pub fn query_within(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.tree.read().query_within(root, selector)
    }

    pub fn query_first(&self, selector: &Selector) -> Option<NodeId> {
        let tree = self.tree.read();
        tree.query_first(tree.root, selector)
    }
}
