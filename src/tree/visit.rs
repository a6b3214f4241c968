//! Pre-order tree visitor with early exit
//!
//! Locate, id scans, clone and delete all walk the forest through here.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::template::{Forest, Node, NodeId};

/// One visited node with its position in the forest
#[derive(Debug)]
pub struct Visit<'a, 'p> {
    pub root_index: usize,
    pub root_key: &'a str,
    pub node: &'a Arc<Node>,
    pub parent: Option<&'a Arc<Node>>,
    /// Child indices from the root down to this node (empty for a root)
    pub path: &'p [usize],
}

impl Visit<'_, '_> {
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Position of a located node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocation {
    pub root_index: usize,
    pub root_key: Arc<str>,
    pub path: Vec<usize>,
}

impl NodeLocation {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Location of the parent, `None` for a root
    pub fn parent(&self) -> Option<NodeLocation> {
        let (_, parent_path) = self.path.split_last()?;
        Some(NodeLocation {
            root_index: self.root_index,
            root_key: Arc::clone(&self.root_key),
            path: parent_path.to_vec(),
        })
    }
}

/// Walk every root in order, pre-order within each root
pub fn walk<'a, B, F>(forest: &'a Forest, mut f: F) -> ControlFlow<B>
where
    F: FnMut(&Visit<'a, '_>) -> ControlFlow<B>,
{
    let mut path = Vec::new();
    for (root_index, entry) in forest.roots().iter().enumerate() {
        walk_from(&entry.node, None, root_index, &entry.key, &mut path, &mut f)?;
    }
    ControlFlow::Continue(())
}

/// Walk one subtree; paths are relative to `node`
pub fn walk_subtree<'a, B, F>(node: &'a Arc<Node>, mut f: F) -> ControlFlow<B>
where
    F: FnMut(&Visit<'a, '_>) -> ControlFlow<B>,
{
    let mut path = Vec::new();
    walk_from(node, None, 0, "", &mut path, &mut f)
}

fn walk_from<'a, B, F>(
    node: &'a Arc<Node>,
    parent: Option<&'a Arc<Node>>,
    root_index: usize,
    root_key: &'a str,
    path: &mut Vec<usize>,
    f: &mut F,
) -> ControlFlow<B>
where
    F: FnMut(&Visit<'a, '_>) -> ControlFlow<B>,
{
    f(&Visit {
        root_index,
        root_key,
        node,
        parent,
        path: path.as_slice(),
    })?;

    for (index, child) in node.children().iter().enumerate() {
        path.push(index);
        let flow = walk_from(child, Some(node), root_index, root_key, path, f);
        path.pop();
        flow?;
    }

    ControlFlow::Continue(())
}

/// First match in pre-order across all roots
pub fn locate(forest: &Forest, id: &str) -> Option<NodeLocation> {
    locate_where(forest, id, |_| true)
}

/// First match in pre-order within the root keyed `root_key`
pub fn locate_in_root(forest: &Forest, root_key: &str, id: &str) -> Option<NodeLocation> {
    locate_where(forest, id, |key| key == root_key)
}

fn locate_where(forest: &Forest, id: &str, root_filter: impl Fn(&str) -> bool) -> Option<NodeLocation> {
    let flow = walk(forest, |visit| {
        if root_filter(visit.root_key) && visit.node.id().as_ref() == id {
            ControlFlow::Break(NodeLocation {
                root_index: visit.root_index,
                root_key: Arc::from(visit.root_key),
                path: visit.path.to_vec(),
            })
        } else {
            ControlFlow::Continue(())
        }
    });
    match flow {
        ControlFlow::Break(location) => Some(location),
        ControlFlow::Continue(()) => None,
    }
}

/// Resolve a location back to its node
pub fn node_at<'a>(forest: &'a Forest, location: &NodeLocation) -> Option<&'a Arc<Node>> {
    let mut node = &forest.roots().get(location.root_index)?.node;
    for &index in &location.path {
        node = node.children().get(index)?;
    }
    Some(node)
}

/// True when `id` is `node` itself or one of its descendants
pub fn subtree_contains(node: &Arc<Node>, id: &str) -> bool {
    walk_subtree(node, |visit| {
        if visit.node.id().as_ref() == id {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .is_break()
}

/// Ids of `node` and every descendant, pre-order
pub fn subtree_ids(node: &Arc<Node>) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let _ = walk_subtree(node, |visit| {
        ids.push(Arc::clone(visit.node.id()));
        ControlFlow::<()>::Continue(())
    });
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Calculation, CalculationType, FundingLine, FundingLineType};

    fn forest() -> Forest {
        Forest::from_roots(vec![
            FundingLine::new("n1", "Total", 1, FundingLineType::Payment)
                .with_children(vec![
                    FundingLine::new("n3", "Sub", 3, FundingLineType::Information)
                        .with_children(vec![
                            Calculation::new("c1", "A", 1, CalculationType::Cash).into(),
                        ])
                        .into(),
                    Calculation::new("c2", "B", 2, CalculationType::Cash).into(),
                ])
                .into(),
            FundingLine::new("n2", "Second", 2, FundingLineType::Information)
                .with_children(vec![Calculation::new("c3", "C", 3, CalculationType::Cash).into()])
                .into(),
        ])
    }

    #[test]
    fn walk_visits_in_pre_order_with_paths() {
        let forest = forest();
        let mut seen = Vec::new();
        let _ = walk(&forest, |visit| {
            seen.push((visit.node.id().to_string(), visit.path.to_vec(), visit.root_key.to_string()));
            ControlFlow::<()>::Continue(())
        });

        assert_eq!(
            seen,
            vec![
                ("n1".to_string(), vec![], "n1".to_string()),
                ("n3".to_string(), vec![0], "n1".to_string()),
                ("c1".to_string(), vec![0, 0], "n1".to_string()),
                ("c2".to_string(), vec![1], "n1".to_string()),
                ("n2".to_string(), vec![], "n2".to_string()),
                ("c3".to_string(), vec![0], "n2".to_string()),
            ]
        );
    }

    #[test]
    fn walk_stops_early_on_break() {
        let forest = forest();
        let mut visited = 0;
        let flow = walk(&forest, |visit| {
            visited += 1;
            if visit.node.id().as_ref() == "c1" {
                ControlFlow::Break(visit.depth())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(2));
        assert_eq!(visited, 3);
    }

    #[test]
    fn locate_and_resolve() {
        let forest = forest();
        let location = locate(&forest, "c1").unwrap();
        assert_eq!(location.root_index, 0);
        assert_eq!(location.path, vec![0, 0]);
        assert_eq!(node_at(&forest, &location).unwrap().name(), "A");

        let parent = location.parent().unwrap();
        assert_eq!(node_at(&forest, &parent).unwrap().id().as_ref(), "n3");
        assert!(locate(&forest, "n1").unwrap().parent().is_none());
    }

    #[test]
    fn locate_in_root_respects_root_key() {
        let forest = forest();
        assert!(locate_in_root(&forest, "n2", "c3").is_some());
        assert!(locate_in_root(&forest, "n1", "c3").is_none());
    }

    #[test]
    fn subtree_helpers() {
        let forest = forest();
        let n3 = forest.find("n3").unwrap();
        assert!(subtree_contains(n3, "n3"));
        assert!(subtree_contains(n3, "c1"));
        assert!(!subtree_contains(n3, "c2"));

        let ids: Vec<_> = subtree_ids(forest.find("n1").unwrap())
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["n1", "n3", "c1", "c2"]);
    }

    #[test]
    fn duplicate_ids_resolve_to_first_in_pre_order() {
        let forest = Forest::from_roots(vec![
            FundingLine::new("n1", "First", 1, FundingLineType::Information)
                .with_children(vec![Calculation::new("dup", "Early", 1, CalculationType::Cash).into()])
                .into(),
            FundingLine::new("n2", "Second", 2, FundingLineType::Information)
                .with_children(vec![Calculation::new("dup", "Late", 2, CalculationType::Cash).into()])
                .into(),
        ]);
        assert_eq!(forest.find("dup").unwrap().name(), "Early");
    }
}
