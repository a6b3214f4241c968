//! In-memory template store with lock-free concurrent access

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::TemplateStore;
use crate::error::{FundError, Result};
use crate::template::{Forest, TemplateDocument};
use crate::tree;

/// Versions per template id; version N is at index N - 1
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    versions: DashMap<String, Vec<Forest>>,
    names: DashMap<String, String>,
    failure: Mutex<Option<String>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following call with `message` until cleared
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    pub fn latest(&self, template_id: &str) -> Option<Forest> {
        self.versions
            .get(template_id)
            .and_then(|versions| versions.last().cloned())
    }

    pub fn version_count(&self, template_id: &str) -> usize {
        self.versions
            .get(template_id)
            .map(|versions| versions.len())
            .unwrap_or(0)
    }

    fn check(&self, operation: &str) -> Result<()> {
        match self.failure.lock().as_ref() {
            Some(message) => Err(FundError::Remote {
                operation: operation.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn push(&self, template_id: &str, forest: Forest) -> u32 {
        let mut versions = self.versions.entry(template_id.to_string()).or_default();
        versions.push(forest);
        versions.len() as u32
    }

    fn latest_or_missing(&self, template_id: &str, operation: &str) -> Result<Forest> {
        self.latest(template_id).ok_or_else(|| FundError::Remote {
            operation: operation.to_string(),
            message: format!("template '{}' has not been saved", template_id),
        })
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn save_template(&self, template_id: &str, name: &str, forest: &Forest) -> Result<u32> {
        self.check("save")?;
        self.names.insert(template_id.to_string(), name.to_string());
        Ok(self.push(template_id, forest.clone()))
    }

    async fn delete_node(&self, template_id: &str, node_id: &str) -> Result<u32> {
        self.check("delete")?;
        let forest = self.latest_or_missing(template_id, "delete")?;
        let mutation = tree::delete_node(&forest, node_id).ok_or_else(|| FundError::Remote {
            operation: "delete".into(),
            message: format!("node '{}' not found", node_id),
        })?;
        Ok(self.push(template_id, mutation.forest))
    }

    async fn clone_calculation(
        &self,
        template_id: &str,
        target_id: &str,
        source_id: &str,
    ) -> Result<u32> {
        self.check("clone")?;
        let forest = self.latest_or_missing(template_id, "clone")?;
        let mutation =
            tree::clone_node(&forest, source_id, target_id).ok_or_else(|| FundError::Remote {
                operation: "clone".into(),
                message: format!("cannot clone '{}' under '{}'", source_id, target_id),
            })?;
        Ok(self.push(template_id, mutation.forest))
    }

    async fn export_template(&self, template_id: &str, version: u32) -> Result<Vec<u8>> {
        self.check("export")?;
        let forest = self
            .versions
            .get(template_id)
            .and_then(|versions| {
                let index = (version as usize).checked_sub(1)?;
                versions.get(index).cloned()
            })
            .ok_or_else(|| FundError::Remote {
                operation: "export".into(),
                message: format!("version {} of '{}' not found", version, template_id),
            })?;

        let name = self
            .names
            .get(template_id)
            .map(|name| name.clone())
            .unwrap_or_else(|| template_id.to_string());
        let mut doc = TemplateDocument::new(template_id, name).with_forest(&forest);
        doc.version = version;
        Ok(serde_json::to_vec_pretty(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Calculation, CalculationType, FundingLine, FundingLineType};

    fn forest() -> Forest {
        Forest::from_roots(vec![FundingLine::new("n1", "Total", 1, FundingLineType::Information)
            .with_children(vec![
                Calculation::new("c1", "Pupils", 5, CalculationType::PupilNumber).into(),
            ])
            .into()])
    }

    #[tokio::test]
    async fn save_increments_versions() {
        let store = MemoryTemplateStore::new();
        assert_eq!(store.save_template("t1", "Grant", &forest()).await.unwrap(), 1);
        assert_eq!(store.save_template("t1", "Grant", &forest()).await.unwrap(), 2);
        assert_eq!(store.save_template("t2", "Grant", &forest()).await.unwrap(), 1);
        assert_eq!(store.version_count("t1"), 2);
    }

    #[tokio::test]
    async fn injected_failure_rejects_calls() {
        let store = MemoryTemplateStore::new();
        store.fail_with("503 unavailable");
        let err = store.save_template("t1", "Grant", &forest()).await.unwrap_err();
        assert!(err.to_string().contains("503 unavailable"));

        store.clear_failure();
        assert!(store.save_template("t1", "Grant", &forest()).await.is_ok());
    }

    #[tokio::test]
    async fn delete_and_clone_create_versions() {
        let store = MemoryTemplateStore::new();
        store.save_template("t1", "Grant", &forest()).await.unwrap();

        assert_eq!(store.clone_calculation("t1", "n1", "c1").await.unwrap(), 2);
        assert!(store.latest("t1").unwrap().contains("c1:n1"));

        assert_eq!(store.delete_node("t1", "c1").await.unwrap(), 3);
        assert!(!store.latest("t1").unwrap().contains("c1"));
        assert_eq!(store.version_count("t1"), 3);

        assert!(store.delete_node("t1", "missing").await.is_err());
        assert!(store.delete_node("unknown", "c1").await.is_err());
    }

    #[tokio::test]
    async fn export_returns_document() {
        let store = MemoryTemplateStore::new();
        store.save_template("t1", "Grant", &forest()).await.unwrap();

        let bytes = store.export_template("t1", 1).await.unwrap();
        let doc: TemplateDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.name, "Grant");
        assert_eq!(doc.to_forest().node_count(), 2);

        assert!(store.export_template("t1", 0).await.is_err());
        assert!(store.export_template("t1", 2).await.is_err());
    }
}
