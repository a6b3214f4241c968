//! Error types with fix suggestions
//!
//! Error code ranges:
//! - FT-000-009: Document and IO errors
//! - FT-010-019: Configuration errors
//! - FT-020-029: Editor errors (lookup, validation, delete protocol)
//! - FT-030-039: Remote collaborator errors (persistence, export, job status)

use thiserror::Error;

use crate::tree::validate::ValidationReport;

pub type Result<T> = std::result::Result<T, FundError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum FundError {
    // ═══════════════════════════════════════════
    // DOCUMENT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[FT-001] Failed to parse template: {details}")]
    ParseError { details: String },

    #[error("[FT-002] Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("[FT-003] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[FT-004] YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("[FT-005] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[FT-010] Configuration error: {reason}")]
    Config { reason: String },

    // ═══════════════════════════════════════════
    // EDITOR ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[FT-020] Node '{node_id}' not found in template")]
    NodeNotFound { node_id: String },

    #[error("[FT-021] Node '{node_id}' is invalid: {report}")]
    Validation {
        node_id: String,
        report: ValidationReport,
    },

    #[error("[FT-022] No delete is pending confirmation")]
    DeleteNotRequested,

    #[error("[FT-023] Node '{node_id}' is a {actual}, not a {expected}")]
    KindMismatch {
        node_id: String,
        expected: String,
        actual: String,
    },

    #[error("[FT-024] No free {namespace} ids are left")]
    IdsExhausted { namespace: String },

    // ═══════════════════════════════════════════
    // REMOTE ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[FT-030] Remote {operation} failed: {message}")]
    Remote { operation: String, message: String },

    #[error("[FT-031] Export failed: {reason}")]
    Export { reason: String },

    #[error("[FT-032] Job status source failed: {message}")]
    JobSource { message: String },

    #[error("[FT-033] Template id '{template_id}' cannot be used as a store key")]
    InvalidTemplateId { template_id: String },
}

impl FixSuggestion for FundError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FundError::ParseError { .. } => {
                Some("Check the template structure: fundingLines with kind FundingLine/Calculation")
            }
            FundError::UnsupportedFormat { .. } => Some("Use a .json, .yaml or .yml file"),
            FundError::Io(_) => Some("Check file path and permissions"),
            FundError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            FundError::Json(_) => Some("Check JSON syntax (try parsing with jq)"),
            FundError::Config { .. } => Some("Fix or delete the config file, then retry"),
            FundError::NodeNotFound { .. } => Some("Verify the node id exists in the template"),
            FundError::Validation { .. } => Some("Correct the listed fields and save again"),
            FundError::DeleteNotRequested => Some("Request the delete before confirming it"),
            FundError::KindMismatch { .. } => {
                Some("Use a funding line update for funding lines and a calculation update for calculations")
            }
            FundError::IdsExhausted { .. } => {
                Some("Give the new node an explicit id below the highest one in use")
            }
            FundError::Remote { .. } => {
                Some("Reload the template to pick up the server state, then reapply the edit")
            }
            FundError::Export { .. } => Some("Check the export destination is writable"),
            FundError::JobSource { .. } => Some("Check the job status source is reachable"),
            FundError::InvalidTemplateId { .. } => {
                Some("Use a template id without path separators or leading dots")
            }
        }
    }
}
