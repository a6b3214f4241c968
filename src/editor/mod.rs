//! Editor Module - the interactive side of the template builder
//!
//! - `state`: `TemplateEditor`, the single owner of the forest being edited
//! - `selection`: node selection and sidebar form dispatch
//! - `summary`: page-level collector of remote failures
//! - `export`: PNG/PDF export through a `Rasterizer`, text outline
//! - `script`: replayable lists of edit operations

pub mod export;
pub mod script;
pub mod selection;
pub mod state;
pub mod summary;

pub use export::{export_to, render_outline, ExportFormat, Rasterizer};
pub use script::{EditOp, EditScript, ScriptReport};
pub use selection::{sidebar_form, SelectedNode, Selection, SelectionMode, Sidebar, SidebarForm};
pub use state::{CalculationDraft, CloneOutcome, LineDraft, TemplateEditor};
pub use summary::{ErrorSummary, RemoteError};
