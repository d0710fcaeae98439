//! A small arena-based document model.
//!
//! This stands in for the host's real document tree. Nodes are looked up by
//! id, children are ordered, and subtrees can be cloned or detached without
//! touching the rest of the tree, which is what the snapshot layer needs for
//! frozen snapshots and transitional swaps.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// A document tree shared between the session, the live snapshot, and any
/// deferred transition completions.
pub type SharedDocument = Arc<Mutex<Document>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> NodeId {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> NodeId {
        NodeId::new()
    }
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }
}

/// Describes a subtree to be inserted into a `Document`. Ids are assigned at
/// insertion time.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    data: NodeData,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    pub fn element(tag: &str) -> NodeBuilder {
        NodeBuilder {
            data: NodeData::Element(ElementData {
                tag: tag.to_owned(),
                attributes: BTreeMap::new(),
            }),
            children: Vec::new(),
        }
    }

    pub fn text(text: &str) -> NodeBuilder {
        NodeBuilder {
            data: NodeData::Text(text.to_owned()),
            children: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: &str, value: &str) -> NodeBuilder {
        if let NodeData::Element(element) = &mut self.data {
            element.attributes.insert(name.to_owned(), value.to_owned());
        }
        self
    }

    pub fn child(mut self, child: NodeBuilder) -> NodeBuilder {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    root_id: NodeId,
}

impl Document {
    pub fn new(root: NodeBuilder) -> Document {
        let mut document = Document {
            nodes: HashMap::new(),
            root_id: NodeId::new(),
        };

        document.root_id = document.insert_detached(root);
        document
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Inserts a built subtree as the last child of `parent_id` and returns
    /// the id of its root.
    pub fn insert(&mut self, parent_id: NodeId, builder: NodeBuilder) -> NodeId {
        let id = self.insert_detached(builder);
        self.attach_child(parent_id, id);
        id
    }

    /// Inserts a built subtree with no parent. Used for simulated nodes that
    /// are never part of the visible tree until something attaches them.
    pub fn insert_detached(&mut self, builder: NodeBuilder) -> NodeId {
        let NodeBuilder { data, children } = builder;

        let id = NodeId::new();
        self.nodes.insert(
            id,
            Node {
                id,
                parent: None,
                children: Vec::new(),
                data,
            },
        );

        for child in children {
            let child_id = self.insert_detached(child);
            self.attach_child(id, child_id);
        }

        id
    }

    /// Attaches a detached node as the last child of `parent_id`.
    pub fn attach_child(&mut self, parent_id: NodeId, id: NodeId) {
        {
            let parent = self
                .nodes
                .get_mut(&parent_id)
                .expect("parent node does not exist in document");
            parent.children.push(id);
        }

        let node = self
            .nodes
            .get_mut(&id)
            .expect("node does not exist in document");
        node.parent = Some(parent_id);
    }

    /// Attaches a detached node immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, id: NodeId) {
        let parent_id = self
            .get(sibling)
            .and_then(Node::parent)
            .expect("sibling node has no parent");

        {
            let parent = self
                .nodes
                .get_mut(&parent_id)
                .expect("parent node does not exist in document");
            let index = parent
                .children
                .iter()
                .position(|&child| child == sibling)
                .expect("sibling is not a child of its own parent");
            parent.children.insert(index, id);
        }

        let node = self
            .nodes
            .get_mut(&id)
            .expect("node does not exist in document");
        node.parent = Some(parent_id);
    }

    /// Unlinks a node from its parent, keeping it and its subtree in the
    /// arena. A node with no parent is left as-is.
    pub fn detach(&mut self, id: NodeId) {
        let parent_id = match self.get(id).and_then(Node::parent) {
            Some(parent_id) => parent_id,
            None => return,
        };

        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.retain(|&child| child != id);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    /// Detaches a node and drops its entire subtree from the arena.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);

        for descendant in self.descendants(id) {
            self.nodes.remove(&descendant);
        }
        self.nodes.remove(&id);
    }

    /// Deep-copies a subtree, assigning fresh ids. The copy starts detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let (data, children) = {
            let node = self
                .nodes
                .get(&id)
                .expect("node does not exist in document");
            (node.data.clone(), node.children.clone())
        };

        let new_id = NodeId::new();
        self.nodes.insert(
            new_id,
            Node {
                id: new_id,
                parent: None,
                children: Vec::new(),
                data,
            },
        );

        for child in children {
            let new_child = self.clone_subtree(child);
            self.attach_child(new_id, new_child);
        }

        new_id
    }

    /// All descendants of a node in document order (pre-order), excluding the
    /// node itself. An id that isn't in the document yields nothing.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut output = Vec::new();

        let mut stack: Vec<NodeId> = match self.get(id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => Vec::new(),
        };

        while let Some(next) = stack.pop() {
            output.push(next);

            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        output
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.get(id).map(Node::data) {
            Some(NodeData::Element(element)) => {
                element.attributes.get(name).map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let NodeData::Element(element) = &mut node.data {
                element.attributes.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let NodeData::Element(element) = &mut node.data {
                element.attributes.remove(name);
            }
        }
    }

    /// Reads a node's content: the `value` attribute when one is present,
    /// otherwise the concatenated text of its descendants.
    pub fn content(&self, id: NodeId) -> String {
        match self.get(id).map(Node::data) {
            Some(NodeData::Text(text)) => text.clone(),
            Some(NodeData::Element(_)) => match self.attribute(id, "value") {
                Some(value) => value.to_owned(),
                None => self.inner_text(id),
            },
            None => String::new(),
        }
    }

    /// Writes a node's content through the same value-slot rule as `content`:
    /// the `value` attribute when present, otherwise the children are replaced
    /// with a single text node.
    pub fn set_content(&mut self, id: NodeId, value: &str) {
        if !self.contains(id) {
            return;
        }

        if let Some(NodeData::Text(text)) = self.nodes.get_mut(&id).map(|node| &mut node.data) {
            *text = value.to_owned();
            return;
        }

        if self.attribute(id, "value").is_some() {
            self.set_attribute(id, "value", value);
            return;
        }

        let children = match self.get(id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.remove(child);
        }

        self.insert(id, NodeBuilder::text(value));
    }

    fn inner_text(&self, id: NodeId) -> String {
        let mut output = String::new();

        for descendant in self.descendants(id) {
            if let Some(NodeData::Text(text)) = self.get(descendant).map(Node::data) {
                output.push_str(text);
            }
        }

        output
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> (Document, NodeId) {
        let mut document = Document::new(NodeBuilder::element("body"));
        let root_id = document.root_id();

        let title = document.insert(
            root_id,
            NodeBuilder::element("h1").child(NodeBuilder::text("Hello")),
        );

        (document, title)
    }

    #[test]
    fn content_reads_inner_text() {
        let (document, title) = sample();

        assert_eq!(document.content(title), "Hello");
    }

    #[test]
    fn content_prefers_value_attribute() {
        let (mut document, title) = sample();

        document.set_attribute(title, "value", "typed");
        assert_eq!(document.content(title), "typed");

        document.set_content(title, "retyped");
        assert_eq!(document.attribute(title, "value"), Some("retyped"));

        // The old children are untouched when the value slot is used.
        assert_eq!(document.inner_text(title), "Hello");
    }

    #[test]
    fn set_content_replaces_children() {
        let (mut document, title) = sample();

        document.set_content(title, "Goodbye");

        assert_eq!(document.content(title), "Goodbye");
        assert_eq!(document.get(title).unwrap().children().len(), 1);
    }

    #[test]
    fn clone_subtree_is_detached_and_fresh() {
        let (mut document, title) = sample();

        let copy = document.clone_subtree(title);

        assert_ne!(copy, title);
        assert_eq!(document.get(copy).unwrap().parent(), None);
        assert_eq!(document.content(copy), "Hello");

        // Mutating the copy leaves the original alone.
        document.set_content(copy, "changed");
        assert_eq!(document.content(title), "Hello");
    }

    #[test]
    fn detach_and_remove() {
        let (mut document, title) = sample();
        let root_id = document.root_id();

        document.detach(title);
        assert!(document.contains(title));
        assert!(document.get(root_id).unwrap().children().is_empty());

        document.remove(title);
        assert!(!document.contains(title));
    }

    #[test]
    fn descendants_are_in_document_order() {
        let mut document = Document::new(NodeBuilder::element("body"));
        let root_id = document.root_id();

        let first = document.insert(
            root_id,
            NodeBuilder::element("div").child(NodeBuilder::element("span")),
        );
        let second = document.insert(root_id, NodeBuilder::element("p"));

        let descendants = document.descendants(root_id);
        let nested = document.get(first).unwrap().children()[0];

        assert_eq!(descendants, vec![first, nested, second]);
    }

    #[test]
    fn insert_before_places_the_node_ahead_of_its_sibling() {
        let mut document = Document::new(NodeBuilder::element("body"));
        let root_id = document.root_id();

        let second = document.insert(root_id, NodeBuilder::element("p"));
        let first = document.insert_detached(NodeBuilder::element("div"));
        document.insert_before(second, first);

        assert_eq!(document.get(root_id).unwrap().children(), &[first, second]);
        assert_eq!(document.get(first).unwrap().parent(), Some(root_id));
    }

    #[test]
    fn missing_nodes_read_as_empty() {
        let (document, _) = sample();

        let stray = NodeId::new();
        assert_eq!(document.content(stray), "");
        assert!(document.descendants(stray).is_empty());
    }
}
