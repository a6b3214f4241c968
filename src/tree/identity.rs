//! Node identity: structural ids and the two numeric id namespaces
//!
//! `templateLineId` and `templateCalculationId` must be unique across the
//! whole forest. The candidate counters here may go stale; every write path
//! re-checks with [`is_id_in_use`] before committing.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use uuid::Uuid;

use super::visit;
use crate::template::{Forest, NodeId, NodeKind};

/// True if any node other than `exclude` already uses `candidate`
/// in the `namespace` id space
pub fn is_id_in_use(
    forest: &Forest,
    namespace: NodeKind,
    candidate: u32,
    exclude: Option<&str>,
) -> bool {
    visit::walk(forest, |visit| {
        let node = visit.node;
        let excluded = exclude.is_some_and(|id| node.id().as_ref() == id);
        if !excluded && node.kind() == namespace && node.template_id() == candidate {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .is_break()
}

/// Every numeric id in use within a namespace
pub fn ids_in_use(forest: &Forest, namespace: NodeKind) -> HashSet<u32> {
    forest
        .nodes()
        .into_iter()
        .filter(|node| node.kind() == namespace)
        .map(|node| node.template_id())
        .collect()
}

/// Fresh structural id for a new node
pub fn new_node_id() -> NodeId {
    Arc::from(format!("n{}", Uuid::new_v4().simple()))
}

/// Candidate numeric ids for new funding lines and calculations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityService {
    next_line_id: u32,
    next_calculation_id: u32,
}

impl Default for IdentityService {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdentityService {
    pub fn starting_at(first: u32) -> Self {
        let first = first.max(1);
        Self {
            next_line_id: first,
            next_calculation_id: first,
        }
    }

    /// Counters positioned past the ids already in `forest`
    pub fn from_forest(forest: &Forest, first: u32) -> Self {
        let mut service = Self::starting_at(first);
        service.refresh_next_id(forest, NodeKind::FundingLine);
        service.refresh_next_id(forest, NodeKind::Calculation);
        service
    }

    /// Current candidate; not guaranteed free until refreshed
    pub fn next_available_id(&self, namespace: NodeKind) -> u32 {
        match namespace {
            NodeKind::FundingLine => self.next_line_id,
            NodeKind::Calculation => self.next_calculation_id,
        }
    }

    /// Advance the candidate to the first id not in use, returning it;
    /// `None` once every id up to `u32::MAX` is taken
    pub fn refresh_next_id(&mut self, forest: &Forest, namespace: NodeKind) -> Option<u32> {
        let used = ids_in_use(forest, namespace);
        let counter = match namespace {
            NodeKind::FundingLine => &mut self.next_line_id,
            NodeKind::Calculation => &mut self.next_calculation_id,
        };
        while used.contains(&*counter) {
            *counter = counter.checked_add(1)?;
        }
        Some(*counter)
    }
}
