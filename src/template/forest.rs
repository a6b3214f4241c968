//! Multi-root datasource of funding line trees
//!
//! Cloning a `Forest` is O(1); two forests are reference-identical when
//! they share the same root list.

use std::ops::ControlFlow;
use std::sync::Arc;

use super::node::{Node, NodeId};
use crate::tree::visit;

/// One keyed root of the datasource
#[derive(Debug, Clone, PartialEq)]
pub struct RootEntry {
    pub key: Arc<str>,
    pub node: Arc<Node>,
}

impl RootEntry {
    pub fn new(key: impl Into<Arc<str>>, node: Arc<Node>) -> Self {
        Self {
            key: key.into(),
            node,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    roots: Arc<Vec<RootEntry>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from root nodes, keyed by node id and flagged as roots
    pub fn from_roots(nodes: impl IntoIterator<Item = Node>) -> Self {
        let entries = nodes
            .into_iter()
            .map(|node| {
                let node = node.with_root_flag(true);
                RootEntry::new(Arc::clone(node.id()), Arc::new(node))
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<RootEntry>) -> Self {
        Self {
            roots: Arc::new(entries),
        }
    }

    pub fn roots(&self) -> &[RootEntry] {
        &self.roots
    }

    pub fn root(&self, key: &str) -> Option<&RootEntry> {
        self.roots.iter().find(|entry| entry.key.as_ref() == key)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// True when both forests share the same root list
    pub fn ptr_eq(&self, other: &Forest) -> bool {
        Arc::ptr_eq(&self.roots, &other.roots)
    }

    /// First node with this id, pre-order across roots
    pub fn find(&self, id: &str) -> Option<&Arc<Node>> {
        match visit::walk(self, |visit| {
            if visit.node.id().as_ref() == id {
                ControlFlow::Break(visit.node)
            } else {
                ControlFlow::Continue(())
            }
        }) {
            ControlFlow::Break(node) => Some(node),
            ControlFlow::Continue(()) => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// All nodes, flattened in pre-order
    pub fn nodes(&self) -> Vec<&Arc<Node>> {
        let mut nodes = Vec::new();
        let _ = visit::walk(self, |visit| {
            nodes.push(visit.node);
            ControlFlow::<()>::Continue(())
        });
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes()
            .into_iter()
            .map(|node| Arc::clone(node.id()))
            .collect()
    }

    pub(crate) fn with_root_replaced(&self, index: usize, node: Arc<Node>) -> Forest {
        let mut entries = self.roots.as_ref().clone();
        if let Some(entry) = entries.get_mut(index) {
            entry.node = node;
        }
        Self::from_entries(entries)
    }

    pub(crate) fn with_root_removed(&self, index: usize) -> Forest {
        let mut entries = self.roots.as_ref().clone();
        if index < entries.len() {
            entries.remove(index);
        }
        Self::from_entries(entries)
    }

    pub(crate) fn with_root_appended(&self, entry: RootEntry) -> Forest {
        let mut entries = self.roots.as_ref().clone();
        entries.push(entry);
        Self::from_entries(entries)
    }
}
