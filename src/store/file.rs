//! Directory-backed template store: `<template_id>.v<version>.json`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::TemplateStore;
use crate::error::{FundError, Result};
use crate::template::{Forest, TemplateDocument};
use crate::tree;

#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    root: PathBuf,
}

impl FileTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File of one version; the id must stay a plain file name inside the store
    pub fn version_path(&self, template_id: &str, version: u32) -> Result<PathBuf> {
        check_template_id(template_id)?;
        Ok(self.root.join(format!("{}.v{}.json", template_id, version)))
    }

    /// Highest saved version, 0 when none
    pub async fn latest_version(&self, template_id: &str) -> Result<u32> {
        check_template_id(template_id)?;
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(0);
        }
        let prefix = format!("{}.v", template_id);
        let mut latest = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let version = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|v| v.parse::<u32>().ok());
            if let Some(version) = version {
                latest = latest.max(version);
            }
        }
        Ok(latest)
    }

    async fn write_version(&self, template_id: &str, name: &str, forest: &Forest) -> Result<u32> {
        let version = self.latest_version(template_id).await? + 1;
        let path = self.version_path(template_id, version)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let mut doc = TemplateDocument::new(template_id, name).with_forest(forest);
        doc.version = version;
        doc.save(&path).await?;
        debug!(template_id, version, "wrote template version");
        Ok(version)
    }

    async fn load_latest(&self, template_id: &str, operation: &str) -> Result<TemplateDocument> {
        let version = self.latest_version(template_id).await?;
        if version == 0 {
            return Err(FundError::Remote {
                operation: operation.to_string(),
                message: format!("template '{}' has not been saved", template_id),
            });
        }
        TemplateDocument::load(&self.version_path(template_id, version)?).await
    }
}

fn check_template_id(template_id: &str) -> Result<()> {
    let usable = !template_id.is_empty()
        && !template_id.starts_with('.')
        && !template_id.contains(['/', '\\']);
    if usable {
        Ok(())
    } else {
        Err(FundError::InvalidTemplateId {
            template_id: template_id.to_string(),
        })
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    #[instrument(skip(self, forest), fields(nodes = forest.node_count()))]
    async fn save_template(&self, template_id: &str, name: &str, forest: &Forest) -> Result<u32> {
        self.write_version(template_id, name, forest).await
    }

    #[instrument(skip(self))]
    async fn delete_node(&self, template_id: &str, node_id: &str) -> Result<u32> {
        let doc = self.load_latest(template_id, "delete").await?;
        let mutation = tree::delete_node(&doc.to_forest(), node_id).ok_or_else(|| FundError::Remote {
            operation: "delete".into(),
            message: format!("node '{}' not found", node_id),
        })?;
        self.write_version(template_id, &doc.name, &mutation.forest).await
    }

    #[instrument(skip(self))]
    async fn clone_calculation(
        &self,
        template_id: &str,
        target_id: &str,
        source_id: &str,
    ) -> Result<u32> {
        let doc = self.load_latest(template_id, "clone").await?;
        let mutation =
            tree::clone_node(&doc.to_forest(), source_id, target_id).ok_or_else(|| FundError::Remote {
                operation: "clone".into(),
                message: format!("cannot clone '{}' under '{}'", source_id, target_id),
            })?;
        self.write_version(template_id, &doc.name, &mutation.forest).await
    }

    async fn export_template(&self, template_id: &str, version: u32) -> Result<Vec<u8>> {
        let path = self.version_path(template_id, version)?;
        tokio::fs::read(&path).await.map_err(|e| FundError::Remote {
            operation: "export".into(),
            message: format!("{}: {}", path.display(), e),
        })
    }
}
