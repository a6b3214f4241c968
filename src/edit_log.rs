//! Append-only log of template edits
//!
//! - EditEvent: envelope with id + timestamp + kind
//! - EditEventKind: tree mutations and save lifecycle
//! - EditLog: thread-safe, append-only log shared by clones

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::template::NodeId;

/// Single entry in the edit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEvent {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the editor opened (ms)
    pub timestamp_ms: u64,
    pub kind: EditEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditEventKind {
    // ═══════════════════════════════════════════
    // TREE MUTATIONS
    // ═══════════════════════════════════════════
    NodeAdded {
        node_id: NodeId,
        parent_id: Option<NodeId>,
    },
    NodeUpdated {
        node_id: NodeId,
    },
    NodeDeleted {
        node_id: NodeId,
        removed: usize,
    },
    HierarchyChanged {
        node_id: NodeId,
        target_parent_id: NodeId,
    },
    NodeCloned {
        source_id: NodeId,
        clone_id: NodeId,
    },

    // ═══════════════════════════════════════════
    // SAVE LIFECYCLE
    // ═══════════════════════════════════════════
    TemplateSaved {
        version: u32,
        dirty: usize,
    },
    SaveFailed {
        operation: String,
        error: String,
    },
    RolledBack {
        version: u32,
    },
}

impl EditEventKind {
    /// Node the event is about, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeAdded { node_id, .. }
            | Self::NodeUpdated { node_id }
            | Self::NodeDeleted { node_id, .. }
            | Self::HierarchyChanged { node_id, .. } => Some(node_id),
            Self::NodeCloned { clone_id, .. } => Some(clone_id),
            Self::TemplateSaved { .. } | Self::SaveFailed { .. } | Self::RolledBack { .. } => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.node_id().is_some()
    }
}

/// Thread-safe, append-only edit log
#[derive(Clone)]
pub struct EditLog {
    events: Arc<RwLock<Vec<EditEvent>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EditLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an event, returning its ID
    pub fn emit(&self, kind: EditEventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = EditEvent {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    pub fn events(&self) -> Vec<EditEvent> {
        self.events.read().clone()
    }

    pub fn filter_node(&self, node_id: &str) -> Vec<EditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.node_id() == Some(node_id))
            .collect()
    }

    pub fn mutations(&self) -> Vec<EditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_mutation())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditLog").field("len", &self.len()).finish()
    }
}
