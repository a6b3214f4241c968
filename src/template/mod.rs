//! Template domain model: nodes, forest, updates, documents

pub mod document;
pub mod forest;
pub mod node;
pub mod update;

pub use document::{DocumentFormat, TemplateDocument};
pub use forest::{Forest, RootEntry};
pub use node::{
    AggregationType, Calculation, CalculationType, FundingLine, FundingLineType, GroupRate, Node,
    NodeId, NodeKind, PercentageChange, ValueFormat,
};
pub use update::{CalculationUpdate, FundingLineUpdate, NodeUpdate};
