use datagen_runtime::SinkKind;

use crate::errors::{CodegenError, Result};

/// Knobs for one code generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Cargo package name of the generated program.
    pub package_name: String,
    /// Backends the program can load into.
    pub sinks: Vec<SinkKind>,
    /// Parse every generated `.rs` file with `syn` before accepting it.
    pub verify_syntax: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            package_name: "datagen-generated".to_string(),
            sinks: SinkKind::ALL.to_vec(),
            verify_syntax: true,
        }
    }
}

impl CodegenOptions {
    /// Replace the sink list from config or CLI names, rejecting unknown kinds.
    pub fn with_sink_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.sinks = parse_sink_kinds(names)?;
        Ok(self)
    }
}

/// Parse sink kind names, keeping their first-seen order and dropping repeats.
pub fn parse_sink_kinds<S: AsRef<str>>(names: &[S]) -> Result<Vec<SinkKind>> {
    let mut kinds = Vec::new();
    for name in names {
        let name = name.as_ref();
        let kind: SinkKind = name
            .parse()
            .map_err(|_| CodegenError::UnsupportedSink(name.to_string()))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}
