//! Tree export: raster formats through a collaborator, plus a text outline

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FundError, Result};
use crate::template::{Forest, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// Renders the current tree into an image or document
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, forest: &Forest, format: ExportFormat) -> Result<Vec<u8>>;
}

/// Rasterize and write `<filename>.<ext>`, returning the written path
pub fn export_to(
    forest: &Forest,
    filename: &Path,
    format: ExportFormat,
    rasterizer: &dyn Rasterizer,
) -> Result<PathBuf> {
    let bytes = rasterizer.rasterize(forest, format)?;
    let path = filename.with_extension(format.extension());
    std::fs::write(&path, bytes).map_err(|e| FundError::Export {
        reason: format!("{}: {}", path.display(), e),
    })?;
    Ok(path)
}

/// Indented text outline of the forest
pub fn render_outline(forest: &Forest) -> String {
    let mut out = String::new();
    for entry in forest.roots() {
        render_node(&entry.node, 0, &mut out);
    }
    out
}

fn render_node(node: &Node, depth: usize, out: &mut String) {
    let label = match node {
        Node::FundingLine(line) => match line.effective_funding_line_code() {
            Some(code) => format!(
                "[line {}] {} ({:?}, {})",
                line.template_line_id, line.name, line.line_type, code
            ),
            None => format!(
                "[line {}] {} ({:?})",
                line.template_line_id, line.name, line.line_type
            ),
        },
        Node::Calculation(calc) => format!(
            "[calc {}] {} ({:?})",
            calc.template_calculation_id, calc.name, calc.calculation_type
        ),
    };
    let _ = writeln!(out, "{}{}", "  ".repeat(depth), label);
    for child in node.children() {
        render_node(child, depth + 1, out);
    }
}
