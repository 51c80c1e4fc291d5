//! Path Indexer
//!
//! Assigns every node of a [`ConfigTree`] a stable, human-readable
//! [`PathKey`] and keeps a key → node map for O(1) lookup. Path keys are
//! what correlates nodes across two independently built trees.
//!
//! # Tie-break policy
//!
//! A segment's disambiguator is the node's `name` when that name is
//! non-empty and not already taken by an earlier same-tag sibling.
//! Otherwise it is the node's 0-based position among its same-tag
//! siblings. Two same-tag siblings sharing a name therefore get
//! `TAG[name]` and `TAG[#i]`; keys never collide.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::tree::{ConfigTree, Element, NodeId};

/// How a segment tells same-tag siblings apart
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Disambiguator {
    /// 0-based occurrence among same-tag siblings
    Index(usize),
    /// Identity name taken from the identity-marker child
    Name(String),
}

/// One step of a path: a tag plus its disambiguator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    pub tag: String,
    pub disambiguator: Disambiguator,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.disambiguator {
            Disambiguator::Name(name) => write!(f, "{}[{}]", self.tag, name),
            Disambiguator::Index(i) => write!(f, "{}[#{}]", self.tag, i),
        }
    }
}

/// Structural address of a node: one segment per level below the root.
///
/// The root's key is empty. Keys order segment-wise, so a parent sorts
/// before everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey(Vec<Segment>);

impl PathKey {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(segment);
        Self(segments)
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A configuration tree plus its path-key index
#[derive(Debug, Clone)]
pub struct IndexedTree {
    tree: ConfigTree,
    /// Path key of each node, indexed by `NodeId`
    keys: Vec<PathKey>,
    by_path: HashMap<PathKey, NodeId>,
    by_tag: HashMap<String, Vec<NodeId>>,
    /// Node ids sorted by path key
    ordered: Vec<NodeId>,
}

impl IndexedTree {
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn root(&self) -> &Element {
        self.tree.root()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn key(&self, id: NodeId) -> &PathKey {
        &self.keys[id.index()]
    }

    pub fn lookup(&self, key: &PathKey) -> Option<&Element> {
        self.by_path.get(key).map(|&id| self.tree.element(id))
    }

    pub fn node_id(&self, key: &PathKey) -> Option<NodeId> {
        self.by_path.get(key).copied()
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.by_path.contains_key(key)
    }

    /// Nodes carrying exactly `tag`, in document order
    pub fn nodes_with_tag(&self, tag: &str) -> &[NodeId] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// All nodes with their keys, in document pre-order
    pub fn iter(&self) -> impl Iterator<Item = (&PathKey, &Element)> + '_ {
        self.tree
            .iter()
            .map(move |(id, element)| (self.key(id), element))
    }

    /// All nodes with their keys, in path-key order
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&PathKey, &Element)> + '_ {
        self.ordered
            .iter()
            .map(move |&id| (self.key(id), self.tree.element(id)))
    }

    /// Give the tree back, dropping the index
    pub fn into_tree(self) -> ConfigTree {
        self.tree
    }
}

/// Index a built tree. Total: every node gets exactly one key.
pub fn index(tree: ConfigTree) -> IndexedTree {
    let mut keys: Vec<PathKey> = vec![PathKey::root(); tree.len()];

    // Arena order is pre-order, so a parent's key is always ready
    // before its children are visited.
    for (id, _) in tree.iter() {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut names_taken: HashSet<(&str, &str)> = HashSet::new();
        let parent_key = keys[id.index()].clone();

        for (child_id, child) in tree.children(id) {
            let occurrence = occurrences.entry(child.tag()).or_insert(0);
            let position = *occurrence;
            *occurrence += 1;

            let disambiguator = match child.name().filter(|n| !n.is_empty()) {
                Some(name) if names_taken.insert((child.tag(), name)) => {
                    Disambiguator::Name(name.to_string())
                }
                _ => Disambiguator::Index(position),
            };

            keys[child_id.index()] = parent_key.child(Segment {
                tag: child.tag().to_string(),
                disambiguator,
            });
        }
    }

    let mut by_path = HashMap::with_capacity(keys.len());
    let mut by_tag: HashMap<String, Vec<NodeId>> = HashMap::new();
    for (id, element) in tree.iter() {
        let previous = by_path.insert(keys[id.index()].clone(), id);
        debug_assert!(previous.is_none(), "path key collision");
        by_tag.entry(element.tag().to_string()).or_default().push(id);
    }

    let mut ordered: Vec<NodeId> = tree.iter().map(|(id, _)| id).collect();
    ordered.sort_by(|a, b| keys[a.index()].cmp(&keys[b.index()]));

    tracing::debug!(nodes = keys.len(), tags = by_tag.len(), "indexed configuration tree");

    IndexedTree {
        tree,
        keys,
        by_path,
        by_tag,
        ordered,
    }
}
