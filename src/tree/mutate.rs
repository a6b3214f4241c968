//! Copy-on-write mutations over a [`Forest`]
//!
//! Every operation either returns a [`Mutation`] (a new forest plus the ids
//! that changed) or `None`, in which case the caller keeps the input forest.
//! Only the ancestors of the edited node are copied; every other subtree is
//! shared with the input by pointer.
//!
//! Structural refusals (unknown parent, drop onto own descendant, funding
//! line under a calculation, id collision) are silent: the UI is expected to
//! prevent them, so they are logged at debug level and not reported.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::visit::{self, NodeLocation};
use crate::template::{Forest, Node, NodeId, NodeUpdate, RootEntry};

/// Result of a successful mutation
#[derive(Debug, Clone)]
pub struct Mutation {
    pub forest: Forest,
    /// Nodes added, removed, moved or whose fields or child list changed
    pub dirty: BTreeSet<NodeId>,
}

impl Mutation {
    fn new(forest: Forest) -> Self {
        Self {
            forest,
            dirty: BTreeSet::new(),
        }
    }

    fn mark(mut self, ids: impl IntoIterator<Item = NodeId>) -> Self {
        self.dirty.extend(ids);
        self
    }
}

/// Rebuild `node` with `edit` applied at `path`, copying ancestors only
fn rewrite<F>(node: &Arc<Node>, path: &[usize], edit: F) -> Option<Arc<Node>>
where
    F: FnOnce(&Node) -> Option<Node>,
{
    match path.split_first() {
        None => edit(node).map(Arc::new),
        Some((&index, rest)) => {
            let mut children = node.children().to_vec();
            let child = children.get(index)?;
            let replaced = rewrite(child, rest, edit)?;
            children[index] = replaced;
            Some(Arc::new(node.with_children(children)))
        }
    }
}

fn rewrite_forest<F>(forest: &Forest, location: &NodeLocation, edit: F) -> Option<Forest>
where
    F: FnOnce(&Node) -> Option<Node>,
{
    let root = &forest.roots().get(location.root_index)?.node;
    let root = rewrite(root, &location.path, edit)?;
    Some(forest.with_root_replaced(location.root_index, root))
}

fn ids_collide(forest: &Forest, node: &Arc<Node>) -> bool {
    visit::subtree_ids(node)
        .iter()
        .any(|id| forest.contains(id))
}

fn append_at(forest: &Forest, parent: &NodeLocation, child: Arc<Node>) -> Option<Forest> {
    rewrite_forest(forest, parent, |parent| {
        let mut children = parent.children().to_vec();
        children.push(child);
        Some(parent.with_children(children))
    })
}

/// Remove the node at `location` with its subtree
fn remove_at(forest: &Forest, location: &NodeLocation) -> Option<Forest> {
    match location.parent() {
        None => Some(forest.with_root_removed(location.root_index)),
        Some(parent) => {
            let index = *location.path.last()?;
            rewrite_forest(forest, &parent, |parent| {
                let mut children = parent.children().to_vec();
                if index >= children.len() {
                    return None;
                }
                children.remove(index);
                Some(parent.with_children(children))
            })
        }
    }
}

fn parent_id(forest: &Forest, location: &NodeLocation) -> Option<NodeId> {
    let parent = location.parent()?;
    visit::node_at(forest, &parent).map(|node| Arc::clone(node.id()))
}

/// Append a new root funding line
pub fn add_root(forest: &Forest, node: Node) -> Option<Mutation> {
    let Node::FundingLine(_) = node else {
        debug!(node_id = %node.id(), "refused: roots must be funding lines");
        return None;
    };
    let node = Arc::new(node.with_root_flag(true));
    if ids_collide(forest, &node) {
        debug!(node_id = %node.id(), "refused: node id already in forest");
        return None;
    }

    let ids = visit::subtree_ids(&node);
    let entry = RootEntry::new(Arc::clone(node.id()), node);
    Some(Mutation::new(forest.with_root_appended(entry)).mark(ids))
}

/// Append `child` under the first node with id `parent_id`
pub fn add_node(forest: &Forest, parent_id: &str, child: Node) -> Option<Mutation> {
    let Some(location) = visit::locate(forest, parent_id) else {
        debug!(parent_id, "refused: parent not found");
        return None;
    };
    let parent = visit::node_at(forest, &location)?;
    if !parent.can_contain(child.kind()) {
        debug!(parent_id, child_kind = %child.kind(), "refused: parent cannot hold this kind");
        return None;
    }

    let child = Arc::new(child.with_root_flag(false));
    if ids_collide(forest, &child) {
        debug!(node_id = %child.id(), "refused: node id already in forest");
        return None;
    }

    let ids = visit::subtree_ids(&child);
    let forest = append_at(forest, &location, child)?;
    Some(
        Mutation::new(forest)
            .mark([Arc::from(parent_id)])
            .mark(ids),
    )
}

/// Remove a node and every descendant
pub fn delete_node(forest: &Forest, node_id: &str) -> Option<Mutation> {
    let Some(location) = visit::locate(forest, node_id) else {
        debug!(node_id, "refused: node not found");
        return None;
    };
    let node = visit::node_at(forest, &location)?;
    let ids = visit::subtree_ids(node);
    let parent = parent_id(forest, &location);

    let forest = remove_at(forest, &location)?;
    Some(Mutation::new(forest).mark(parent).mark(ids))
}

/// Apply a field-level update; the caller validates beforehand
pub fn update_node(forest: &Forest, update: &NodeUpdate) -> Option<Mutation> {
    let Some(location) = visit::locate(forest, update.id()) else {
        debug!(node_id = %update.id(), "refused: node not found");
        return None;
    };
    let forest = rewrite_forest(forest, &location, |node| {
        let updated = update.apply(node);
        if updated.is_none() {
            debug!(node_id = %update.id(), "refused: update kind does not match node");
        }
        updated
    })?;
    Some(Mutation::new(forest).mark([Arc::clone(update.id())]))
}

/// Move a node (with its subtree) under a new parent, possibly in another root
pub fn change_hierarchy(
    forest: &Forest,
    dragged_id: &str,
    dragged_root_key: &str,
    target_parent_id: &str,
    target_root_key: &str,
) -> Option<Mutation> {
    let Some(source) = visit::locate_in_root(forest, dragged_root_key, dragged_id) else {
        debug!(dragged_id, dragged_root_key, "refused: dragged node not found");
        return None;
    };
    let dragged = Arc::clone(visit::node_at(forest, &source)?);

    if visit::subtree_contains(&dragged, target_parent_id) {
        debug!(dragged_id, target_parent_id, "refused: target is inside the dragged subtree");
        return None;
    }

    let Some(target) = visit::locate_in_root(forest, target_root_key, target_parent_id) else {
        debug!(target_parent_id, target_root_key, "refused: target parent not found");
        return None;
    };
    if !visit::node_at(forest, &target)?.can_contain(dragged.kind()) {
        debug!(dragged_id, target_parent_id, "refused: target cannot hold this kind");
        return None;
    }

    let old_parent = parent_id(forest, &source);
    let ids = visit::subtree_ids(&dragged);

    // Removing the source can shift the target's path, so re-locate it.
    let detached = remove_at(forest, &source)?;
    let target = visit::locate_in_root(&detached, target_root_key, target_parent_id)?;
    let moved = Arc::new(dragged.with_root_flag(false));
    let forest = append_at(&detached, &target, moved)?;

    Some(
        Mutation::new(forest)
            .mark(old_parent)
            .mark([Arc::from(target_parent_id)])
            .mark(ids),
    )
}

/// Composite id given to a cloned node
pub fn clone_id(original: &str, target_parent_id: &str) -> NodeId {
    Arc::from(format!("{}:{}", original, target_parent_id))
}

fn deep_clone(node: &Node, target_parent_id: &str) -> Node {
    let children = node
        .children()
        .iter()
        .map(|child| Arc::new(deep_clone(child, target_parent_id)))
        .collect();
    node.with_children(children)
        .with_id(clone_id(node.id(), target_parent_id))
        .with_root_flag(false)
}

/// Deep-copy a subtree under `target_parent_id`
///
/// Copies keep their numeric template ids; the caller renumbers them.
pub fn clone_node(forest: &Forest, source_id: &str, target_parent_id: &str) -> Option<Mutation> {
    let Some(source) = forest.find(source_id) else {
        debug!(source_id, "refused: clone source not found");
        return None;
    };
    let Some(target) = visit::locate(forest, target_parent_id) else {
        debug!(target_parent_id, "refused: clone target not found");
        return None;
    };
    if !visit::node_at(forest, &target)?.can_contain(source.kind()) {
        debug!(source_id, target_parent_id, "refused: target cannot hold this kind");
        return None;
    }

    let copy = Arc::new(deep_clone(source, target_parent_id));
    if ids_collide(forest, &copy) {
        debug!(source_id, target_parent_id, "refused: clone id already in forest");
        return None;
    }

    let ids = visit::subtree_ids(&copy);
    let forest = append_at(forest, &target, copy)?;
    Some(
        Mutation::new(forest)
            .mark([Arc::from(target_parent_id)])
            .mark(ids),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{
        Calculation, CalculationType, CalculationUpdate, FundingLine, FundingLineType,
        FundingLineUpdate,
    };

    fn forest() -> Forest {
        Forest::from_roots(vec![
            FundingLine::new("n1", "Total", 1, FundingLineType::Payment)
                .with_code("TOT")
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

    fn dirty(mutation: &Mutation) -> Vec<String> {
        mutation.dirty.iter().map(|id| id.to_string()).collect()
    }

    fn child_ids(forest: &Forest, id: &str) -> Vec<String> {
        forest
            .find(id)
            .unwrap()
            .children()
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    #[test]
    fn add_root_to_empty_forest() {
        let line = FundingLine::new("n1", "Total", 1, FundingLineType::Information);
        let mutation = add_root(&Forest::new(), line.into()).unwrap();

        assert_eq!(mutation.forest.len(), 1);
        let root = &mutation.forest.roots()[0].node;
        assert!(root.is_root_node());
        assert_eq!(root.name(), "Total");
        assert!(root.children().is_empty());
    }

    #[test]
    fn add_root_refuses_calculations() {
        let calc = Calculation::new("c9", "X", 9, CalculationType::Cash);
        assert!(add_root(&forest(), calc.into()).is_none());
    }

    #[test]
    fn add_node_copies_only_ancestors() {
        let before = forest();
        let calc = Calculation::new("c9", "New", 9, CalculationType::Cash);
        let mutation = add_node(&before, "n3", calc.into()).unwrap();
        let after = &mutation.forest;

        assert_eq!(child_ids(after, "n3"), vec!["c1", "c9"]);
        assert_eq!(dirty(&mutation), vec!["c9", "n3"]);

        // untouched root and sibling subtree are shared
        assert!(Arc::ptr_eq(&before.roots()[1].node, &after.roots()[1].node));
        assert!(Arc::ptr_eq(before.find("c2").unwrap(), after.find("c2").unwrap()));
        assert!(Arc::ptr_eq(before.find("c1").unwrap(), after.find("c1").unwrap()));
        // ancestors are new
        assert!(!Arc::ptr_eq(before.find("n1").unwrap(), after.find("n1").unwrap()));
    }

    #[test]
    fn add_node_unknown_parent_is_noop() {
        let calc = Calculation::new("c9", "New", 9, CalculationType::Cash);
        assert!(add_node(&forest(), "missing", calc.into()).is_none());
    }

    #[test]
    fn add_funding_line_under_calculation_refused() {
        let line = FundingLine::new("n9", "Nested", 9, FundingLineType::Information);
        assert!(add_node(&forest(), "c1", line.into()).is_none());
    }

    #[test]
    fn add_node_with_existing_id_refused() {
        let calc = Calculation::new("c2", "Dup", 9, CalculationType::Cash);
        assert!(add_node(&forest(), "n3", calc.into()).is_none());
    }

    #[test]
    fn delete_removes_subtree() {
        let before = forest();
        let mutation = delete_node(&before, "n3").unwrap();

        assert!(!mutation.forest.contains("n3"));
        assert!(!mutation.forest.contains("c1"));
        assert_eq!(child_ids(&mutation.forest, "n1"), vec!["c2"]);
        assert_eq!(dirty(&mutation), vec!["c1", "n1", "n3"]);
        assert!(Arc::ptr_eq(&before.roots()[1].node, &mutation.forest.roots()[1].node));
    }

    #[test]
    fn delete_root_removes_entry() {
        let mutation = delete_node(&forest(), "n1").unwrap();
        assert_eq!(mutation.forest.len(), 1);
        assert_eq!(mutation.forest.roots()[0].key.as_ref(), "n2");
    }

    #[test]
    fn update_changes_fields_only() {
        let before = forest();
        let update = FundingLineUpdate {
            name: Some("Renamed".into()),
            ..FundingLineUpdate::new("n3")
        };
        let mutation = update_node(&before, &update.into()).unwrap();
        let updated = mutation.forest.find("n3").unwrap();

        assert_eq!(updated.name(), "Renamed");
        assert!(Arc::ptr_eq(&updated.children()[0], before.find("c1").unwrap()));
        assert_eq!(dirty(&mutation), vec!["n3"]);
    }

    #[test]
    fn update_with_wrong_kind_refused() {
        let update = CalculationUpdate::new("n3");
        assert!(update_node(&forest(), &update.into()).is_none());
    }

    #[test]
    fn move_within_root() {
        let mutation = change_hierarchy(&forest(), "c2", "n1", "n3", "n1").unwrap();
        assert_eq!(child_ids(&mutation.forest, "n1"), vec!["n3"]);
        assert_eq!(child_ids(&mutation.forest, "n3"), vec!["c1", "c2"]);
    }

    #[test]
    fn move_across_roots() {
        let mutation = change_hierarchy(&forest(), "n3", "n1", "n2", "n2").unwrap();
        assert_eq!(child_ids(&mutation.forest, "n1"), vec!["c2"]);
        assert_eq!(child_ids(&mutation.forest, "n2"), vec!["c3", "n3"]);
        assert_eq!(dirty(&mutation), vec!["c1", "n1", "n2", "n3"]);
    }

    #[test]
    fn move_root_under_other_root() {
        let mutation = change_hierarchy(&forest(), "n2", "n2", "n3", "n1").unwrap();
        assert_eq!(mutation.forest.len(), 1);
        let moved = mutation.forest.find("n2").unwrap();
        assert!(!moved.is_root_node());
        assert_eq!(child_ids(&mutation.forest, "n3"), vec!["c1", "n2"]);
    }

    #[test]
    fn move_onto_own_descendant_refused() {
        assert!(change_hierarchy(&forest(), "n1", "n1", "c1", "n1").is_none());
        assert!(change_hierarchy(&forest(), "n3", "n1", "n3", "n1").is_none());
    }

    #[test]
    fn move_with_wrong_root_key_refused() {
        assert!(change_hierarchy(&forest(), "c2", "n2", "n3", "n1").is_none());
    }

    #[test]
    fn move_funding_line_under_calculation_refused() {
        assert!(change_hierarchy(&forest(), "n3", "n1", "c3", "n2").is_none());
    }

    #[test]
    fn clone_uses_composite_ids() {
        let mutation = clone_node(&forest(), "n3", "n2").unwrap();
        let copy = mutation.forest.find("n3:n2").unwrap();

        assert_eq!(copy.template_id(), 3);
        assert_eq!(copy.children()[0].id().as_ref(), "c1:n2");
        assert_eq!(copy.children()[0].template_id(), 1);
        assert!(mutation.forest.contains("n3"));
        assert_eq!(dirty(&mutation), vec!["c1:n2", "n2", "n3:n2"]);
    }

    #[test]
    fn clone_twice_under_same_parent_refused() {
        let first = clone_node(&forest(), "c1", "n2").unwrap();
        assert!(clone_node(&first.forest, "c1", "n2").is_none());
    }

    #[test]
    fn clone_root_becomes_child() {
        let mutation = clone_node(&forest(), "n2", "n3").unwrap();
        let copy = mutation.forest.find("n2:n3").unwrap();
        assert!(!copy.is_root_node());
        assert_eq!(mutation.forest.len(), 2);
    }
}
