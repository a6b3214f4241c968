//! Edit scripts: a list of editor operations replayed in order
//!
//! ```yaml
//! - op: add_root_line
//!   label: total
//!   line: { name: Total, type: Information }
//! - op: add_calculation
//!   parent: total
//!   calculation: { name: Pupils, type: PupilNumber }
//! ```
//!
//! Nodes created by the script get generated ids, so later operations refer
//! to them by `label`. A label shadows a node id with the same text.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state::{CalculationDraft, LineDraft, TemplateEditor};
use crate::error::{FundError, Result};
use crate::template::{DocumentFormat, NodeId, NodeUpdate};
use crate::tree::visit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    AddRootLine {
        #[serde(default)]
        label: Option<String>,
        line: LineDraft,
    },
    AddLine {
        parent: String,
        #[serde(default)]
        label: Option<String>,
        line: LineDraft,
    },
    AddCalculation {
        parent: String,
        #[serde(default)]
        label: Option<String>,
        calculation: CalculationDraft,
    },
    Update {
        update: NodeUpdate,
    },
    Delete {
        node: String,
    },
    Move {
        node: String,
        target: String,
    },
    Clone {
        source: String,
        target: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl EditOp {
    pub fn name(&self) -> &'static str {
        match self {
            EditOp::AddRootLine { .. } => "add_root_line",
            EditOp::AddLine { .. } => "add_line",
            EditOp::AddCalculation { .. } => "add_calculation",
            EditOp::Update { .. } => "update",
            EditOp::Delete { .. } => "delete",
            EditOp::Move { .. } => "move",
            EditOp::Clone { .. } => "clone",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditScript {
    pub ops: Vec<EditOp>,
}

/// What a replay did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub applied: usize,
    /// Indexes of operations the mutation engine refused
    pub refused: Vec<usize>,
    /// Cloned nodes still carrying a taken numeric id
    pub needs_renumber: Vec<NodeId>,
}

fn with_id(mut update: NodeUpdate, id: NodeId) -> NodeUpdate {
    match &mut update {
        NodeUpdate::FundingLine(line) => line.id = id,
        NodeUpdate::Calculation(calc) => calc.id = id,
    }
    update
}

impl EditScript {
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let parsed: std::result::Result<Self, String> = match format {
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|details| FundError::ParseError {
            details: format!("edit script: {}", details),
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let format = DocumentFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content, format)
    }

    /// Replay every operation; stops at the first validation or lookup error
    pub fn apply(&self, editor: &mut TemplateEditor) -> Result<ScriptReport> {
        let mut labels: HashMap<String, NodeId> = HashMap::new();
        let mut report = ScriptReport::default();

        for (index, op) in self.ops.iter().enumerate() {
            debug!(index, op = op.name(), "applying edit");
            let applied = match op {
                EditOp::AddRootLine { label, line } => {
                    let added = editor.add_root_line(line.clone())?;
                    remember(&mut labels, label, added)
                }
                EditOp::AddLine {
                    parent,
                    label,
                    line,
                } => {
                    let parent = resolve(&labels, parent);
                    let added = editor.add_line(&parent, line.clone())?;
                    remember(&mut labels, label, added)
                }
                EditOp::AddCalculation {
                    parent,
                    label,
                    calculation,
                } => {
                    let parent = resolve(&labels, parent);
                    let added = editor.add_calculation(&parent, calculation.clone())?;
                    remember(&mut labels, label, added)
                }
                EditOp::Update { update } => {
                    let id = resolve(&labels, update.id());
                    editor.save_node(&with_id(update.clone(), id))?;
                    true
                }
                EditOp::Delete { node } => {
                    let node = resolve(&labels, node);
                    editor.request_delete(&node)?;
                    editor.confirm_delete()? > 0
                }
                EditOp::Move { node, target } => {
                    let node = resolve(&labels, node);
                    let target = resolve(&labels, target);
                    let forest = editor.forest();
                    match (visit::locate(forest, &node), visit::locate(forest, &target)) {
                        (Some(from), Some(to)) => {
                            editor.move_node(&node, &from.root_key, &target, &to.root_key)
                        }
                        _ => false,
                    }
                }
                EditOp::Clone {
                    source,
                    target,
                    label,
                } => {
                    let source = resolve(&labels, source);
                    let target = resolve(&labels, target);
                    match editor.clone_node(&source, &target) {
                        Some(outcome) => {
                            report.needs_renumber.extend(outcome.needs_renumber);
                            remember(&mut labels, label, Some(outcome.clone_id))
                        }
                        None => false,
                    }
                }
            };

            if applied {
                report.applied += 1;
            } else {
                report.refused.push(index);
            }
        }

        Ok(report)
    }
}

fn resolve(labels: &HashMap<String, NodeId>, reference: &str) -> NodeId {
    labels
        .get(reference)
        .cloned()
        .unwrap_or_else(|| Arc::from(reference))
}

fn remember(
    labels: &mut HashMap<String, NodeId>,
    label: &Option<String>,
    added: Option<NodeId>,
) -> bool {
    match (label, added) {
        (Some(label), Some(id)) => {
            labels.insert(label.clone(), id);
            true
        }
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::template::NodeKind;

    const SCRIPT: &str = r#"
- op: add_root_line
  label: total
  line: { name: Total, type: Payment, fundingLineCode: TOT }
- op: add_line
  parent: total
  label: sub
  line: { name: Sub, type: Information }
- op: add_calculation
  parent: total
  label: pupils
  calculation: { name: Pupils, type: PupilNumber }
- op: update
  update: { kind: Calculation, id: pupils, name: Pupil count }
- op: move
  node: pupils
  target: sub
- op: clone
  source: pupils
  target: total
- op: add_line
  parent: pupils
  line: { name: Refused, type: Information }
"#;

    #[test]
    fn replays_operations_with_labels() {
        let script = EditScript::parse(SCRIPT, DocumentFormat::Yaml).unwrap();
        assert_eq!(script.ops.len(), 7);
        assert_eq!(script.ops[3].name(), "update");

        let mut editor = TemplateEditor::new("dsg", &EditorConfig::default());
        let report = script.apply(&mut editor).unwrap();

        assert_eq!(report.applied, 6);
        assert_eq!(report.refused, vec![6]);
        assert_eq!(report.needs_renumber.len(), 1);

        let forest = editor.forest();
        assert_eq!(forest.len(), 1);
        let root = &forest.roots()[0].node;
        assert_eq!(root.children().len(), 2);
        let sub = &root.children()[0];
        assert_eq!(sub.children()[0].name(), "Pupil count");
        assert_eq!(sub.children()[0].kind(), NodeKind::Calculation);
    }

    #[test]
    fn validation_error_stops_replay() {
        let script = EditScript::parse(
            r#"[{"op": "add_root_line", "line": {"name": "", "type": "Information"}}]"#,
            DocumentFormat::Json,
        )
        .unwrap();
        let mut editor = TemplateEditor::new("dsg", &EditorConfig::default());
        assert!(matches!(
            script.apply(&mut editor),
            Err(FundError::Validation { .. })
        ));
        assert!(editor.forest().is_empty());
    }

    #[test]
    fn unknown_op_is_parse_error() {
        let err = EditScript::parse("- op: explode\n", DocumentFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("edit script"));
    }
}
