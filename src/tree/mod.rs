//! Tree operations over a [`Forest`](crate::template::Forest)
//!
//! - `visit`: pre-order walker with early exit, locate by id
//! - `identity`: numeric id namespaces and candidate counters
//! - `mutate`: copy-on-write insert, delete, update, move and clone
//! - `validate`: per-kind validation run before saves

pub mod identity;
pub mod mutate;
pub mod validate;
pub mod visit;

pub use identity::{ids_in_use, is_id_in_use, new_node_id, IdentityService};
pub use mutate::{
    add_node, add_root, change_hierarchy, clone_id, clone_node, delete_node, update_node, Mutation,
};
pub use validate::{
    duplicate_node_ids, validate_calculation, validate_forest, validate_funding_line,
    validate_node, Field, FieldError, ValidationReport,
};
pub use visit::{locate, walk, NodeLocation, Visit};
