//! The template editor: single owner of the forest being edited
//!
//! Every edit goes through [`TemplateEditor`]. It validates against the
//! identity rules, runs the mutation engine, accumulates dirty ids, keeps
//! the selection in step with the tree and records what happened in the
//! edit log. Remote calls go through a [`TemplateStore`].

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::export::{self, ExportFormat, Rasterizer};
use super::selection::{sidebar_form, SelectedNode, Selection, SelectionMode, Sidebar, SidebarForm};
use super::summary::ErrorSummary;
use crate::config::EditorConfig;
use crate::edit_log::{EditEventKind, EditLog};
use crate::error::{FundError, Result};
use crate::store::TemplateStore;
use crate::template::{
    AggregationType, Calculation, CalculationType, Forest, FundingLine, FundingLineType, Node,
    NodeId, NodeKind, NodeUpdate, TemplateDocument,
};
use crate::tree::{self, is_id_in_use, new_node_id, visit, IdentityService, Mutation};

/// A new funding line as entered in the add form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub line_type: FundingLineType,
    #[serde(default)]
    pub funding_line_code: Option<String>,
    /// Explicit numeric id; the next free one otherwise
    #[serde(default)]
    pub template_line_id: Option<u32>,
}

impl LineDraft {
    pub fn new(name: impl Into<String>, line_type: FundingLineType) -> Self {
        Self {
            name: name.into(),
            line_type,
            funding_line_code: None,
            template_line_id: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.funding_line_code = Some(code.into());
        self
    }

    pub fn with_id(mut self, template_line_id: u32) -> Self {
        self.template_line_id = Some(template_line_id);
        self
    }
}

/// A new calculation as entered in the add form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub calculation_type: CalculationType,
    #[serde(default)]
    pub template_calculation_id: Option<u32>,
    #[serde(default)]
    pub aggregation_type: AggregationType,
    #[serde(default)]
    pub allowed_enum_type_values: Vec<String>,
    #[serde(default)]
    pub formula_text: Option<String>,
}

impl CalculationDraft {
    pub fn new(name: impl Into<String>, calculation_type: CalculationType) -> Self {
        Self {
            name: name.into(),
            calculation_type,
            template_calculation_id: None,
            aggregation_type: AggregationType::None,
            allowed_enum_type_values: Vec::new(),
            formula_text: None,
        }
    }

    pub fn with_id(mut self, template_calculation_id: u32) -> Self {
        self.template_calculation_id = Some(template_calculation_id);
        self
    }
}

/// Result of a local clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    pub clone_id: NodeId,
    /// Copied nodes whose numeric id is already taken; each needs a new one
    pub needs_renumber: Vec<NodeId>,
}

#[derive(Debug)]
pub struct TemplateEditor {
    template_id: String,
    name: String,
    version: u32,
    forest: Forest,
    committed: Forest,
    identity: IdentityService,
    selection: Selection,
    sidebar: Sidebar,
    pending_delete: Option<NodeId>,
    dirty: BTreeSet<NodeId>,
    errors: ErrorSummary,
    log: EditLog,
    rollback_on_remote_failure: bool,
}

impl TemplateEditor {
    pub fn new(template_id: impl Into<String>, config: &EditorConfig) -> Self {
        let template_id = template_id.into();
        Self::from_document(TemplateDocument::new(template_id.clone(), template_id), config)
    }

    pub fn from_document(doc: TemplateDocument, config: &EditorConfig) -> Self {
        let forest = doc.to_forest();
        let mode = if config.multi_select {
            SelectionMode::Multi
        } else {
            SelectionMode::Single
        };
        Self {
            identity: IdentityService::from_forest(&forest, config.first_template_id),
            committed: forest.clone(),
            forest,
            template_id: doc.template_id,
            name: doc.name,
            version: doc.version,
            selection: Selection::new(mode),
            sidebar: Sidebar::default(),
            pending_delete: None,
            dirty: BTreeSet::new(),
            errors: ErrorSummary::default(),
            log: EditLog::new(),
            rollback_on_remote_failure: config.rollback_on_remote_failure,
        }
    }

    /// Current tree as a document carrying the last saved version
    pub fn to_document(&self) -> TemplateDocument {
        let mut doc =
            TemplateDocument::new(self.template_id.clone(), self.name.clone()).with_forest(&self.forest);
        doc.version = self.version;
        doc
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Tree as of the last successful save
    pub fn committed(&self) -> &Forest {
        &self.committed
    }

    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn sidebar(&self) -> &Sidebar {
        &self.sidebar
    }

    pub fn errors(&self) -> &ErrorSummary {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn log(&self) -> &EditLog {
        &self.log
    }

    pub fn dirty(&self) -> &BTreeSet<NodeId> {
        &self.dirty
    }

    /// Hand the accumulated dirty ids to the caller and reset
    pub fn take_dirty(&mut self) -> BTreeSet<NodeId> {
        std::mem::take(&mut self.dirty)
    }

    pub fn pending_delete(&self) -> Option<&NodeId> {
        self.pending_delete.as_ref()
    }

    fn commit(&mut self, mutation: Mutation) {
        self.forest = mutation.forest;
        self.dirty.extend(mutation.dirty);
        self.selection.reconcile(&self.forest);
    }

    fn refresh_ids(&mut self) {
        self.identity.refresh_next_id(&self.forest, NodeKind::FundingLine);
        self.identity.refresh_next_id(&self.forest, NodeKind::Calculation);
    }

    fn next_id(&mut self, namespace: NodeKind) -> Result<u32> {
        self.identity
            .refresh_next_id(&self.forest, namespace)
            .ok_or_else(|| FundError::IdsExhausted {
                namespace: namespace.to_string(),
            })
    }

    // ═══════════════════════════════════════════
    // ADD
    // ═══════════════════════════════════════════

    fn line_from(&mut self, draft: LineDraft) -> Result<FundingLine> {
        let template_line_id = match draft.template_line_id {
            Some(id) => id,
            None => self.next_id(NodeKind::FundingLine)?,
        };
        let mut line = FundingLine::new(new_node_id(), draft.name, template_line_id, draft.line_type);
        line.funding_line_code = draft.funding_line_code;
        Ok(line)
    }

    fn calculation_from(&mut self, draft: CalculationDraft) -> Result<Calculation> {
        let template_calculation_id = match draft.template_calculation_id {
            Some(id) => id,
            None => self.next_id(NodeKind::Calculation)?,
        };
        let mut calc = Calculation::new(
            new_node_id(),
            draft.name,
            template_calculation_id,
            draft.calculation_type,
        );
        calc.aggregation_type = draft.aggregation_type;
        calc.allowed_enum_type_values = draft.allowed_enum_type_values;
        calc.formula_text = draft.formula_text;
        Ok(calc)
    }

    /// Validate and insert; `Ok(None)` when the engine refuses the placement
    fn insert(&mut self, parent_id: Option<&str>, node: Node) -> Result<Option<NodeId>> {
        let report = tree::validate_node(&self.forest, &node);
        if !report.is_valid() {
            return Err(FundError::Validation {
                node_id: node.id().to_string(),
                report,
            });
        }

        let node_id = Arc::clone(node.id());
        let kind = node.kind();
        let mutation = match parent_id {
            None => tree::add_root(&self.forest, node),
            Some(parent_id) => tree::add_node(&self.forest, parent_id, node),
        };
        let Some(mutation) = mutation else {
            return Ok(None);
        };

        self.commit(mutation);
        self.identity.refresh_next_id(&self.forest, kind);
        self.log.emit(EditEventKind::NodeAdded {
            node_id: Arc::clone(&node_id),
            parent_id: parent_id.map(Arc::from),
        });
        info!(node_id = %node_id, parent_id, "added {}", kind);
        Ok(Some(node_id))
    }

    pub fn add_root_line(&mut self, draft: LineDraft) -> Result<Option<NodeId>> {
        let line = self.line_from(draft)?;
        self.insert(None, line.into())
    }

    pub fn add_line(&mut self, parent_id: &str, draft: LineDraft) -> Result<Option<NodeId>> {
        let line = self.line_from(draft)?;
        self.insert(Some(parent_id), line.into())
    }

    pub fn add_calculation(
        &mut self,
        parent_id: &str,
        draft: CalculationDraft,
    ) -> Result<Option<NodeId>> {
        let calc = self.calculation_from(draft)?;
        self.insert(Some(parent_id), calc.into())
    }

    // ═══════════════════════════════════════════
    // UPDATE
    // ═══════════════════════════════════════════

    /// Merge the update into the node, validate, then commit
    pub fn save_node(&mut self, update: &NodeUpdate) -> Result<()> {
        let node = self
            .forest
            .find(update.id())
            .ok_or_else(|| FundError::NodeNotFound {
                node_id: update.id().to_string(),
            })?;
        let merged = update.apply(node).ok_or_else(|| FundError::KindMismatch {
            node_id: update.id().to_string(),
            expected: update.kind().to_string(),
            actual: node.kind().to_string(),
        })?;

        let report = tree::validate_node(&self.forest, &merged);
        if !report.is_valid() {
            return Err(FundError::Validation {
                node_id: update.id().to_string(),
                report,
            });
        }

        if let Some(mutation) = tree::update_node(&self.forest, update) {
            self.commit(mutation);
            self.refresh_ids();
            self.log.emit(EditEventKind::NodeUpdated {
                node_id: Arc::clone(update.id()),
            });
            info!(node_id = %update.id(), "saved node");
        }
        Ok(())
    }

    // ═══════════════════════════════════════════
    // DELETE (two-phase)
    // ═══════════════════════════════════════════

    pub fn request_delete(&mut self, node_id: &str) -> Result<()> {
        if !self.forest.contains(node_id) {
            return Err(FundError::NodeNotFound {
                node_id: node_id.to_string(),
            });
        }
        self.pending_delete = Some(Arc::from(node_id));
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Delete the pending node, returning how many nodes were removed
    pub fn confirm_delete(&mut self) -> Result<usize> {
        let node_id = self
            .pending_delete
            .take()
            .ok_or(FundError::DeleteNotRequested)?;
        let Some(mutation) = tree::delete_node(&self.forest, &node_id) else {
            return Ok(0);
        };

        let removed = self.forest.node_count() - mutation.forest.node_count();
        self.commit(mutation);
        self.log.emit(EditEventKind::NodeDeleted {
            node_id: Arc::clone(&node_id),
            removed,
        });
        info!(node_id = %node_id, removed, "deleted node");
        Ok(removed)
    }

    // ═══════════════════════════════════════════
    // MOVE / CLONE
    // ═══════════════════════════════════════════

    /// Drag-and-drop re-parent; `false` when the drop is refused
    pub fn move_node(
        &mut self,
        dragged_id: &str,
        dragged_root_key: &str,
        target_parent_id: &str,
        target_root_key: &str,
    ) -> bool {
        let Some(mutation) = tree::change_hierarchy(
            &self.forest,
            dragged_id,
            dragged_root_key,
            target_parent_id,
            target_root_key,
        ) else {
            return false;
        };

        self.commit(mutation);
        self.log.emit(EditEventKind::HierarchyChanged {
            node_id: Arc::from(dragged_id),
            target_parent_id: Arc::from(target_parent_id),
        });
        info!(dragged_id, target_parent_id, "moved node");
        true
    }

    pub fn clone_node(&mut self, source_id: &str, target_parent_id: &str) -> Option<CloneOutcome> {
        let mutation = tree::clone_node(&self.forest, source_id, target_parent_id)?;
        self.commit(mutation);

        let clone_id = tree::clone_id(source_id, target_parent_id);
        let mut needs_renumber = Vec::new();
        if let Some(copy) = self.forest.find(&clone_id) {
            let _ = visit::walk_subtree(copy, |visit| {
                let node = visit.node;
                let exclude = Some(node.id().as_ref());
                if is_id_in_use(&self.forest, node.kind(), node.template_id(), exclude) {
                    needs_renumber.push(Arc::clone(node.id()));
                }
                ControlFlow::<()>::Continue(())
            });
        }

        self.log.emit(EditEventKind::NodeCloned {
            source_id: Arc::from(source_id),
            clone_id: Arc::clone(&clone_id),
        });
        info!(source_id, clone_id = %clone_id, renumber = needs_renumber.len(), "cloned node");
        Some(CloneOutcome {
            clone_id,
            needs_renumber,
        })
    }

    // ═══════════════════════════════════════════
    // SELECTION / SIDEBAR / EXPORT
    // ═══════════════════════════════════════════

    /// Click on a node; ignored when the node is not in that root
    pub fn select(&mut self, root_key: &str, node_id: &str) -> bool {
        if visit::locate_in_root(&self.forest, root_key, node_id).is_none() {
            return false;
        }
        self.selection
            .on_click_node(SelectedNode::new(root_key, node_id));
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn open_side_bar(&mut self, open: bool) {
        self.sidebar.open_side_bar(open);
    }

    /// One edit form per selected node, in selection order
    pub fn sidebar_forms(&self) -> Vec<SidebarForm<'_>> {
        self.selection
            .entries()
            .iter()
            .filter_map(|entry| {
                let location =
                    visit::locate_in_root(&self.forest, &entry.root_key, &entry.node_id)?;
                let root = self.forest.roots().get(location.root_index)?;
                let node = visit::node_at(&self.forest, &location)?;
                Some(sidebar_form(&root.key, node))
            })
            .collect()
    }

    pub fn export_to(
        &self,
        filename: &Path,
        format: ExportFormat,
        rasterizer: &dyn Rasterizer,
    ) -> Result<PathBuf> {
        export::export_to(&self.forest, filename, format, rasterizer)
    }

    // ═══════════════════════════════════════════
    // REMOTE
    // ═══════════════════════════════════════════

    /// Validate every node, then persist the whole tree
    #[instrument(skip(self, store), fields(template_id = %self.template_id))]
    pub async fn save(&mut self, store: &dyn TemplateStore) -> Result<u32> {
        if let Some((node_id, report)) = tree::validate_forest(&self.forest).into_iter().next() {
            return Err(FundError::Validation {
                node_id: node_id.to_string(),
                report,
            });
        }

        match store
            .save_template(&self.template_id, &self.name, &self.forest)
            .await
        {
            Ok(version) => {
                let dirty = self.dirty.len();
                self.version = version;
                self.committed = self.forest.clone();
                self.dirty.clear();
                self.log.emit(EditEventKind::TemplateSaved { version, dirty });
                info!(version, dirty, "template saved");
                Ok(version)
            }
            Err(err) => Err(self.remote_failure("save", err)),
        }
    }

    /// Confirm the pending delete locally, then on the server
    pub async fn confirm_delete_with(&mut self, store: &dyn TemplateStore) -> Result<usize> {
        let node_id = self
            .pending_delete
            .clone()
            .ok_or(FundError::DeleteNotRequested)?;
        let removed = self.confirm_delete()?;
        if removed == 0 {
            return Ok(0);
        }

        match store.delete_node(&self.template_id, &node_id).await {
            Ok(version) => {
                let applied = tree::delete_node(&self.committed, &node_id);
                self.server_applied("delete", version, applied);
                Ok(removed)
            }
            Err(err) => Err(self.remote_failure("delete", err)),
        }
    }

    /// Clone locally, then ask the server to do the same
    pub async fn clone_calculation_with(
        &mut self,
        store: &dyn TemplateStore,
        source_id: &str,
        target_parent_id: &str,
    ) -> Result<Option<CloneOutcome>> {
        let Some(outcome) = self.clone_node(source_id, target_parent_id) else {
            return Ok(None);
        };

        match store
            .clone_calculation(&self.template_id, target_parent_id, source_id)
            .await
        {
            Ok(version) => {
                let applied = tree::clone_node(&self.committed, source_id, target_parent_id);
                self.server_applied("clone", version, applied);
                Ok(Some(outcome))
            }
            Err(err) => Err(self.remote_failure("clone", err)),
        }
    }

    /// The server wrote a new version; replay the same edit on the saved snapshot
    fn server_applied(&mut self, operation: &str, version: u32, applied: Option<Mutation>) {
        self.version = version;
        if let Some(mutation) = applied {
            self.committed = mutation.forest;
        }
        info!(operation, version, "server applied edit");
    }

    /// Record a remote failure; the optimistic tree stays unless rollback is on
    fn remote_failure(&mut self, operation: &str, err: FundError) -> FundError {
        let message = match err {
            FundError::Remote { message, .. } => message,
            other => other.to_string(),
        };
        warn!(operation, error = %message, "remote call failed");
        self.errors.push(operation, message.clone());
        self.log.emit(EditEventKind::SaveFailed {
            operation: operation.to_string(),
            error: message.clone(),
        });
        if self.rollback_on_remote_failure {
            self.rollback();
        }
        FundError::Remote {
            operation: operation.to_string(),
            message,
        }
    }

    /// Discard unsaved edits and return to the last saved tree
    pub fn rollback(&mut self) {
        self.forest = self.committed.clone();
        self.dirty.clear();
        self.pending_delete = None;
        self.selection.reconcile(&self.forest);
        self.refresh_ids();
        self.log.emit(EditEventKind::RolledBack {
            version: self.version,
        });
        info!(version = self.version, "rolled back to last saved tree");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTemplateStore;
    use crate::template::{CalculationUpdate, FundingLineUpdate};
    use crate::tree::Field;

    fn editor() -> TemplateEditor {
        TemplateEditor::new("dsg", &EditorConfig::default())
    }

    fn editor_with_tree() -> (TemplateEditor, NodeId, NodeId) {
        let mut editor = editor();
        let root = editor
            .add_root_line(LineDraft::new("Total", FundingLineType::Information))
            .unwrap()
            .unwrap();
        let calc = editor
            .add_calculation(&root, CalculationDraft::new("Pupils", CalculationType::PupilNumber))
            .unwrap()
            .unwrap();
        (editor, root, calc)
    }

    #[test]
    fn add_assigns_next_free_ids() {
        let (mut editor, root, calc) = editor_with_tree();
        assert_eq!(editor.forest().find(&root).unwrap().template_id(), 1);
        assert_eq!(editor.forest().find(&calc).unwrap().template_id(), 1);

        let second = editor
            .add_calculation(&root, CalculationDraft::new("Rate", CalculationType::Rate))
            .unwrap()
            .unwrap();
        assert_eq!(editor.forest().find(&second).unwrap().template_id(), 2);
        assert_eq!(editor.identity().next_available_id(NodeKind::Calculation), 3);
    }

    #[test]
    fn add_with_taken_id_is_rejected() {
        let (mut editor, root, _) = editor_with_tree();
        let before = editor.forest().clone();

        let err = editor
            .add_calculation(
                &root,
                CalculationDraft::new("Dup", CalculationType::Cash).with_id(1),
            )
            .unwrap_err();
        match err {
            FundError::Validation { report, .. } => {
                assert_eq!(
                    report.messages_for(Field::TemplateCalculationId),
                    vec!["id 1 is in use"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(editor.forest().ptr_eq(&before));
    }

    #[test]
    fn line_under_calculation_is_silently_refused() {
        let (mut editor, _, calc) = editor_with_tree();
        let added = editor
            .add_line(&calc, LineDraft::new("Nested", FundingLineType::Information))
            .unwrap();
        assert!(added.is_none());
    }

    #[test]
    fn dirty_ids_accumulate_until_taken() {
        let (mut editor, root, calc) = editor_with_tree();
        let dirty = editor.take_dirty();
        assert!(dirty.contains(&root));
        assert!(dirty.contains(&calc));
        assert!(editor.dirty().is_empty());
    }

    #[test]
    fn save_node_validates_before_commit() {
        let (mut editor, _, calc) = editor_with_tree();
        let update = CalculationUpdate {
            name: Some("  ".into()),
            ..CalculationUpdate::new(Arc::clone(&calc))
        };
        assert!(matches!(
            editor.save_node(&update.into()),
            Err(FundError::Validation { .. })
        ));

        let update = CalculationUpdate {
            name: Some("Pupil count".into()),
            ..CalculationUpdate::new(Arc::clone(&calc))
        };
        editor.save_node(&update.into()).unwrap();
        assert_eq!(editor.forest().find(&calc).unwrap().name(), "Pupil count");
    }

    #[test]
    fn save_node_kind_mismatch() {
        let (mut editor, _, calc) = editor_with_tree();
        let err = editor
            .save_node(&FundingLineUpdate::new(Arc::clone(&calc)).into())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("[FT-023] Node '{}' is a calculation, not a funding line", calc)
        );
    }

    #[test]
    fn delete_is_two_phase() {
        let (mut editor, root, calc) = editor_with_tree();
        assert!(matches!(
            editor.confirm_delete(),
            Err(FundError::DeleteNotRequested)
        ));

        editor.request_delete(&calc).unwrap();
        editor.cancel_delete();
        assert!(editor.pending_delete().is_none());
        assert!(editor.forest().contains(&calc));

        editor.select(&root, &calc);
        editor.request_delete(&root).unwrap();
        assert_eq!(editor.confirm_delete().unwrap(), 2);
        assert!(editor.forest().is_empty());
        assert!(editor.selection().is_empty());
    }

    #[test]
    fn clone_reports_ids_to_renumber() {
        let (mut editor, root, calc) = editor_with_tree();
        let target = editor
            .add_line(&root, LineDraft::new("Sub", FundingLineType::Information))
            .unwrap()
            .unwrap();

        let outcome = editor.clone_node(&calc, &target).unwrap();
        assert_eq!(outcome.clone_id.as_ref(), format!("{}:{}", calc, target));
        assert_eq!(outcome.needs_renumber, vec![outcome.clone_id.clone()]);
        assert!(editor.log().filter_node(&outcome.clone_id).len() == 1);
    }

    #[test]
    fn sidebar_forms_follow_selection() {
        let (mut editor, root, calc) = editor_with_tree();
        assert!(!editor.select("other-root", &calc));

        editor.select(&root, &calc);
        editor.open_side_bar(true);
        let forms = editor.sidebar_forms();
        assert_eq!(forms.len(), 1);
        assert!(matches!(forms[0], SidebarForm::Calculation { .. }));

        editor.open_side_bar(false);
        assert_eq!(editor.selection().len(), 1);
    }

    #[tokio::test]
    async fn save_commits_and_clears_dirty() {
        let (mut editor, _, _) = editor_with_tree();
        let store = MemoryTemplateStore::new();

        assert_eq!(editor.save(&store).await.unwrap(), 1);
        assert!(editor.dirty().is_empty());
        assert!(editor.committed().ptr_eq(editor.forest()));
        assert_eq!(store.version_count("dsg"), 1);
    }

    #[tokio::test]
    async fn remote_failure_keeps_optimistic_tree_by_default() {
        let (mut editor, root, _) = editor_with_tree();
        let store = MemoryTemplateStore::new();
        editor.save(&store).await.unwrap();

        editor.request_delete(&root).unwrap();
        store.fail_with("backend unavailable");
        let err = editor.confirm_delete_with(&store).await.unwrap_err();

        assert!(matches!(err, FundError::Remote { .. }));
        assert!(editor.forest().is_empty());
        assert_eq!(editor.errors().len(), 1);
    }

    #[tokio::test]
    async fn remote_failure_rolls_back_when_configured() {
        let config = EditorConfig {
            rollback_on_remote_failure: true,
            ..EditorConfig::default()
        };
        let mut editor = TemplateEditor::new("dsg", &config);
        let root = editor
            .add_root_line(LineDraft::new("Total", FundingLineType::Information))
            .unwrap()
            .unwrap();
        let store = MemoryTemplateStore::new();
        editor.save(&store).await.unwrap();

        editor
            .add_calculation(&root, CalculationDraft::new("Pupils", CalculationType::PupilNumber))
            .unwrap();
        store.fail_with("conflict");
        assert!(editor.save(&store).await.is_err());

        assert_eq!(editor.forest().node_count(), 1);
        assert!(editor.dirty().is_empty());
        assert_eq!(editor.version(), 1);
    }

    #[test]
    fn exhausted_id_namespace_is_an_error() {
        let config = EditorConfig {
            first_template_id: u32::MAX,
            ..EditorConfig::default()
        };
        let mut editor = TemplateEditor::new("dsg", &config);
        let root = editor
            .add_root_line(LineDraft::new("Last", FundingLineType::Information))
            .unwrap()
            .unwrap();
        assert_eq!(editor.forest().find(&root).unwrap().template_id(), u32::MAX);

        let err = editor
            .add_root_line(LineDraft::new("One more", FundingLineType::Information))
            .unwrap_err();
        assert!(matches!(err, FundError::IdsExhausted { .. }));
        assert_eq!(editor.forest().len(), 1);
    }

    #[test]
    fn type_change_keeps_stale_aggregation() {
        let (mut editor, root, _) = editor_with_tree();
        let mut draft = CalculationDraft::new("Amount", CalculationType::Cash);
        draft.aggregation_type = AggregationType::Sum;
        let calc = editor.add_calculation(&root, draft).unwrap().unwrap();

        let update = CalculationUpdate {
            calculation_type: Some(CalculationType::Boolean),
            ..CalculationUpdate::new(Arc::clone(&calc))
        };
        editor.save_node(&update.into()).unwrap();

        let Node::Calculation(saved) = editor.forest().find(&calc).unwrap().as_ref() else {
            panic!("expected a calculation");
        };
        assert_eq!(saved.calculation_type, CalculationType::Boolean);
        assert_eq!(saved.aggregation_type, AggregationType::Sum);
        assert_eq!(saved.effective_aggregation(), AggregationType::None);
    }

    #[tokio::test]
    async fn remote_delete_advances_saved_snapshot() {
        let config = EditorConfig {
            rollback_on_remote_failure: true,
            ..EditorConfig::default()
        };
        let mut editor = TemplateEditor::new("dsg", &config);
        let root = editor
            .add_root_line(LineDraft::new("Total", FundingLineType::Information))
            .unwrap()
            .unwrap();
        let calc = editor
            .add_calculation(&root, CalculationDraft::new("Pupils", CalculationType::PupilNumber))
            .unwrap()
            .unwrap();
        let store = MemoryTemplateStore::new();
        editor.save(&store).await.unwrap();

        editor.request_delete(&calc).unwrap();
        assert_eq!(editor.confirm_delete_with(&store).await.unwrap(), 1);
        assert_eq!(editor.version(), 2);
        assert!(!editor.committed().contains(&calc));

        editor
            .add_calculation(&root, CalculationDraft::new("Rate", CalculationType::Rate))
            .unwrap();
        store.fail_with("conflict");
        assert!(editor.save(&store).await.is_err());

        assert!(!editor.forest().contains(&calc));
        assert_eq!(editor.forest().node_count(), 1);
        assert_eq!(editor.version(), 2);
    }

    #[tokio::test]
    async fn remote_clone_advances_saved_snapshot() {
        let (mut editor, root, calc) = editor_with_tree();
        let store = MemoryTemplateStore::new();
        editor.save(&store).await.unwrap();

        let outcome = editor
            .clone_calculation_with(&store, &calc, &root)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(editor.version(), 2);
        assert!(editor.committed().contains(&outcome.clone_id));
        assert!(store.latest("dsg").unwrap().contains(&outcome.clone_id));
    }
}
