//! fundtree - funding template tree editor and job status tracker

pub mod config;
pub mod edit_log;
pub mod editor;
pub mod error;
pub mod jobs;
pub mod store;
pub mod template;
pub mod tree;

pub use config::FundtreeConfig;
pub use edit_log::{EditEvent, EditEventKind, EditLog};
pub use editor::{CalculationDraft, LineDraft, TemplateEditor};
pub use error::{FixSuggestion, FundError, Result};
pub use jobs::{JobFilter, JobNotification, JobPoller, JobRegistry};
pub use store::{FileTemplateStore, MemoryTemplateStore, TemplateStore};
pub use template::{Forest, Node, NodeId, NodeKind, TemplateDocument};
