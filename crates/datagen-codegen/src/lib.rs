//! Template-driven code generation for datagen models.
//!
//! [`CodegenEngine::generate`] turns validated [`datagen_core::ModelDefinition`]s into the
//! sources of a standalone Cargo project: one module per model, one table binding per model and
//! sink kind, the shared command/registry scaffolding, and the runtime support modules.

pub mod engine;
pub mod errors;
pub mod names;
pub mod options;
pub mod project;
pub mod templates;
pub mod views;

pub use engine::CodegenEngine;
pub use errors::{CodegenError, Result};
pub use options::{CodegenOptions, parse_sink_kinds};
pub use project::{GeneratedFile, GeneratedProject};
