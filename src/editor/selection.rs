//! Node selection and sidebar dispatch

use std::sync::Arc;

use crate::template::{Calculation, Forest, FundingLine, Node, NodeId};
use crate::tree::visit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Single,
    Multi,
}

/// A selected node, addressed by its root and id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedNode {
    pub root_key: Arc<str>,
    pub node_id: NodeId,
}

impl SelectedNode {
    pub fn new(root_key: impl Into<Arc<str>>, node_id: impl Into<NodeId>) -> Self {
        Self {
            root_key: root_key.into(),
            node_id: node_id.into(),
        }
    }
}

/// Selected nodes in click order; at most one in single mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    mode: SelectionMode,
    entries: Vec<SelectedNode>,
}

impl Selection {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn entries(&self) -> &[SelectedNode] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.entries.iter().any(|e| e.node_id.as_ref() == node_id)
    }

    /// Replace the selection in single mode, toggle membership in multi mode
    pub fn on_click_node(&mut self, node: SelectedNode) {
        match self.mode {
            SelectionMode::Single => {
                self.entries.clear();
                self.entries.push(node);
            }
            SelectionMode::Multi => {
                if let Some(index) = self.entries.iter().position(|e| e.node_id == node.node_id) {
                    self.entries.remove(index);
                } else {
                    self.entries.push(node);
                }
            }
        }
    }

    /// Click outside any node
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries whose node is gone and re-key entries whose node moved root
    pub fn reconcile(&mut self, forest: &Forest) {
        self.entries.retain_mut(|entry| match visit::locate(forest, &entry.node_id) {
            Some(location) => {
                entry.root_key = location.root_key;
                true
            }
            None => false,
        });
    }
}

/// The edit form shown for a node, chosen by its kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SidebarForm<'a> {
    FundingLine {
        root_key: &'a str,
        line: &'a FundingLine,
    },
    Calculation {
        root_key: &'a str,
        calculation: &'a Calculation,
    },
}

impl SidebarForm<'_> {
    pub fn node_id(&self) -> &str {
        match self {
            SidebarForm::FundingLine { line, .. } => &line.id,
            SidebarForm::Calculation { calculation, .. } => &calculation.id,
        }
    }
}

pub fn sidebar_form<'a>(root_key: &'a str, node: &'a Node) -> SidebarForm<'a> {
    match node {
        Node::FundingLine(line) => SidebarForm::FundingLine { root_key, line },
        Node::Calculation(calculation) => SidebarForm::Calculation {
            root_key,
            calculation,
        },
    }
}

/// Sidebar visibility; closing keeps the selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sidebar {
    open: bool,
}

impl Sidebar {
    pub fn open_side_bar(&mut self, open: bool) {
        self.open = open;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}
