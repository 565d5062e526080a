//! Semantic validation of parsed `.dg` models.

pub mod errors;
pub mod validate;

pub use errors::{IssueSeverity, Result, ValidationError, ValidationIssue, ValidationReport};
pub use validate::validate_model;
