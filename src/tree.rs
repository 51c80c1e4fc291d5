//! Configuration Tree
//!
//! Arena-backed, read-only element tree. Nodes live in a single `Vec` in
//! document pre-order; children and parent links are `NodeId` indices into
//! that arena, so the parent back-reference is a lookup and never an
//! ownership edge.

use std::collections::BTreeMap;
use std::fmt;

/// Compact node identifier (index into the arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of a configuration tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub(crate) tag: String,
    pub(crate) name: Option<String>,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) text: Option<String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

impl Element {
    pub(crate) fn new(tag: String, parent: Option<NodeId>) -> Self {
        Self {
            tag,
            name: None,
            attributes: BTreeMap::new(),
            text: None,
            children: Vec::new(),
            parent,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Identity name taken from the identity-marker child, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Direct character data, trimmed; `None` for purely structural nodes
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Value used when comparing this node against its counterpart in
    /// another tree: the text if present, else the attributes as sorted
    /// `name="value"` pairs, else nothing.
    pub fn comparison_value(&self) -> Option<String> {
        if let Some(text) = &self.text {
            return Some(text.clone());
        }
        if self.attributes.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .attributes
            .iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, value))
            .collect();
        Some(pairs.join(" "))
    }
}

/// A parsed document: exactly one root, nodes stored in pre-order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTree {
    nodes: Vec<Element>,
}

impl ConfigTree {
    /// Assemble a tree from a pre-order arena. Only the builder does this.
    pub(crate) fn from_nodes(nodes: Vec<Element>) -> Self {
        debug_assert!(!nodes.is_empty());
        debug_assert!(nodes[0].parent.is_none());
        Self { nodes }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn root(&self) -> &Element {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.index())
    }

    /// Element by id. Ids only come from this tree, so lookup cannot miss.
    pub fn element(&self, id: NodeId) -> &Element {
        &self.nodes[id.index()]
    }

    pub fn parent(&self, id: NodeId) -> Option<&Element> {
        self.element(id).parent.map(|p| self.element(p))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// "Structurally empty": the root has neither children nor a name
    pub fn is_structurally_empty(&self) -> bool {
        let root = self.root();
        root.children.is_empty() && root.name.is_none()
    }

    /// All nodes in document pre-order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, element)| (NodeId(i as u32), element))
    }

    /// Children of `id` with their ids, in document order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.element(id)
            .children
            .iter()
            .map(|&child| (child, self.element(child)))
    }

    /// Ancestors of `id`, nearest first, root last
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.element(id).parent, |&p| self.element(p).parent)
    }
}

/// Pre-order arena under construction. Children are pushed as they are
/// opened, which keeps the arena in document pre-order.
#[derive(Debug, Default)]
pub(crate) struct TreeArena {
    nodes: Vec<Element>,
}

impl TreeArena {
    pub(crate) fn push(&mut self, tag: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Element::new(tag, parent));
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn get(&self, id: NodeId) -> &Element {
        &self.nodes[id.index()]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn finish(self) -> ConfigTree {
        ConfigTree::from_nodes(self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ConfigTree {
        let mut arena = TreeArena::default();
        let root = arena.push("AUTOSAR".to_string(), None);
        let pkg = arena.push("AR-PACKAGE".to_string(), Some(root));
        let ecu = arena.push("ECU".to_string(), Some(pkg));
        arena.get_mut(ecu).name = Some("E1".to_string());
        arena
            .get_mut(ecu)
            .attributes
            .insert("UUID".to_string(), "42".to_string());
        arena.push("ADMIN-DATA".to_string(), Some(root));
        arena.finish()
    }

    #[test]
    fn test_structure() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root().tag(), "AUTOSAR");
        assert!(tree.root().parent().is_none());

        for (id, element) in tree.iter() {
            for &child in element.children() {
                assert_eq!(tree.element(child).parent(), Some(id));
            }
        }

        let tags: Vec<&str> = tree.children(tree.root_id()).map(|(_, e)| e.tag()).collect();
        assert_eq!(tags, vec!["AR-PACKAGE", "ADMIN-DATA"]);
    }

    #[test]
    fn test_ancestors() {
        let tree = sample_tree();
        let ecu = tree.iter().find(|(_, e)| e.tag() == "ECU").unwrap().0;
        let chain: Vec<&str> = tree.ancestors(ecu).map(|id| tree.element(id).tag()).collect();
        assert_eq!(chain, vec!["AR-PACKAGE", "AUTOSAR"]);
        assert_eq!(tree.parent(ecu).unwrap().tag(), "AR-PACKAGE");
    }

    #[test]
    fn test_comparison_value() {
        let mut element = Element::new("PORT".to_string(), None);
        assert_eq!(element.comparison_value(), None);

        element.attributes.insert("z".to_string(), "1".to_string());
        element.attributes.insert("a".to_string(), "2".to_string());
        assert_eq!(element.comparison_value().as_deref(), Some("a=\"2\" z=\"1\""));

        element.text = Some("value".to_string());
        assert_eq!(element.comparison_value().as_deref(), Some("value"));
    }

    #[test]
    fn test_structurally_empty() {
        let mut arena = TreeArena::default();
        arena.push("ROOT".to_string(), None);
        assert!(arena.finish().is_structurally_empty());
        assert!(!sample_tree().is_structurally_empty());
    }
}
