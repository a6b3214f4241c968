//! Template documents on disk (JSON or YAML)

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::forest::Forest;
use super::node::Node;
use crate::error::{FundError, Result};

/// Serialized form of a template: metadata plus the root funding lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub template_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub funding_lines: Vec<Arc<Node>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(FundError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

impl TemplateDocument {
    pub fn new(template_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            name: name.into(),
            version: 0,
            funding_lines: Vec::new(),
        }
    }

    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let doc = match format {
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| FundError::ParseError {
                details: e.to_string(),
            })?,
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| FundError::ParseError {
                details: e.to_string(),
            })?,
        };
        Ok(doc)
    }

    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        Ok(match format {
            DocumentFormat::Json => serde_json::to_string_pretty(self)?,
            DocumentFormat::Yaml => serde_yaml::to_string(self)?,
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let format = DocumentFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content, format)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let format = DocumentFormat::from_path(path)?;
        tokio::fs::write(path, self.render(format)?).await?;
        Ok(())
    }

    pub fn to_forest(&self) -> Forest {
        Forest::from_roots(self.funding_lines.iter().map(|node| node.as_ref().clone()))
    }

    /// Replace the funding lines with the forest's roots
    pub fn with_forest(mut self, forest: &Forest) -> Self {
        self.funding_lines = forest
            .roots()
            .iter()
            .map(|entry| Arc::clone(&entry.node))
            .collect();
        self
    }
}
