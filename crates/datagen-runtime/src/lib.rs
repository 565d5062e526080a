//! Support code compiled into every generated program.
//!
//! The modules only refer to each other through `super::`, so the code generator can copy the
//! sources unchanged under a generated program's `runtime/` module. Building them here keeps
//! them compiled and tested with the rest of the workspace.

pub mod config;
pub mod links;
pub mod logger;
pub mod mysql;
pub mod postgres;
pub mod record;
pub mod sink;
pub mod stdlib;
pub mod writers;

pub use config::{Config, ConfigError, ModelConfig, SinkSpec};
pub use links::{DependencyGraph, GenerationScope};
pub use record::{Format, Metadata, Record, RecordGenerator};
pub use sink::{LoadSummary, SinkAdapter, SinkError, SinkKind, TableBinding};
pub use writers::{WriteError, write_records};

/// Source of each runtime module, as `(module name, contents)`.
pub const SOURCES: &[(&str, &str)] = &[
    ("config", include_str!("config.rs")),
    ("links", include_str!("links.rs")),
    ("logger", include_str!("logger.rs")),
    ("record", include_str!("record.rs")),
    ("sink", include_str!("sink.rs")),
    ("stdlib", include_str!("stdlib.rs")),
    ("writers", include_str!("writers.rs")),
];

/// Backend modules, included only for the sink kinds a program is generated with.
pub fn sink_source(kind: SinkKind) -> (&'static str, &'static str) {
    match kind {
        SinkKind::Mysql => ("mysql", include_str!("mysql.rs")),
        SinkKind::Postgres => ("postgres", include_str!("postgres.rs")),
    }
}
