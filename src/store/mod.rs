//! Store Module - template persistence collaborators
//!
//! The editor talks to persistence through the `TemplateStore` trait;
//! it never sees a wire format.
//!
//! Key types:
//! - `TemplateStore`: save / delete / clone / export of templates
//! - `MemoryTemplateStore`: DashMap-backed store with failure injection
//! - `FileTemplateStore`: versioned JSON documents in a directory

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::template::Forest;

pub use file::FileTemplateStore;
pub use memory::MemoryTemplateStore;

/// Remote persistence for templates
///
/// Every successful write produces a new version and returns its number.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Persist the whole forest under the template's display name
    async fn save_template(&self, template_id: &str, name: &str, forest: &Forest) -> Result<u32>;

    async fn delete_node(&self, template_id: &str, node_id: &str) -> Result<u32>;

    /// Clone calculation `source_id` under `target_id`
    async fn clone_calculation(&self, template_id: &str, target_id: &str, source_id: &str)
        -> Result<u32>;

    /// Serialized document of a saved version
    async fn export_template(&self, template_id: &str, version: u32) -> Result<Vec<u8>>;
}
