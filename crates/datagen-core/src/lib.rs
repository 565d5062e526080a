//! Core contracts shared across datagen crates.
//!
//! This crate defines the parsed model description, the source-tree representation
//! and the error type used by the parser, validator, code generator and CLI.

pub mod dgdir;
pub mod error;
pub mod model;

pub use dgdir::{DirectoryNode, collect_dg_dir};
pub use error::{Error, Result};
pub use model::{
    CallExpression, CodeBlock, DEFAULT_METADATA_COUNT, DG_DIR_DELIMITER, DG_EXTENSION, Field,
    GenFunction, Metadata, ModelDefinition, Param, TypeExpr, qualified_name,
};
