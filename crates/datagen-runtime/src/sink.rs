//! Sink contracts shared by the SQL backends.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::config::ConfigError;
use super::record::Record;

/// Supported sink backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SinkKind {
    Mysql,
    Postgres,
}

impl SinkKind {
    pub const ALL: [SinkKind; 2] = [SinkKind::Mysql, SinkKind::Postgres];

    /// Value of `sink_type` in the config.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Display label used in load reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Mysql => "MySQL",
            Self::Postgres => "Postgres",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unsupported sink kind {value:?}"))
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(
        "✘ [{label}] {model}: FAILED\n   └─ Rows inserted: {inserted}/{total}\n   └─ Error: {message}"
    )]
    Load {
        label: &'static str,
        model: String,
        inserted: usize,
        total: usize,
        message: String,
    },
    #[error("failed to clear {model} from {label}: {message}")]
    Clear {
        label: &'static str,
        model: String,
        message: String,
    },
    #[error("unsupported sink_type {sink_type:?} for model {model:?}")]
    Unsupported { sink_type: String, model: String },
    #[error("no {kind} table binding for model {model:?}")]
    MissingBinding { kind: SinkKind, model: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SinkError {
    pub fn load(
        kind: SinkKind,
        model: &str,
        inserted: usize,
        total: usize,
        message: impl fmt::Display,
    ) -> Self {
        Self::Load {
            label: kind.label(),
            model: model.to_string(),
            inserted,
            total,
            message: message.to_string(),
        }
    }

    pub fn clear(kind: SinkKind, model: &str, message: impl fmt::Display) -> Self {
        Self::Clear {
            label: kind.label(),
            model: model.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// How one model maps onto a table of one backend.
pub trait TableBinding: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// Qualified model name.
    fn model(&self) -> &'static str;

    /// Default table name, used when the sink config does not override it.
    fn table(&self) -> &'static str;

    /// Column names, in insert order.
    fn columns(&self) -> &'static [&'static str];

    /// Multi-row `INSERT` for `rows` records into `table` using the backend's placeholders.
    fn insert_statement(&self, table: &str, rows: usize) -> String;

    fn clear_statement(&self, table: &str) -> String;

    /// Values bound for one record, aligned with [`TableBinding::columns`].
    fn row_values(&self, record: &dyn Record) -> Vec<Value> {
        let json = record.to_json();
        self.columns()
            .iter()
            .map(|column| json.get(*column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub batches: usize,
}

/// One configured backend connection.
#[async_trait]
pub trait SinkAdapter: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// Insert every record in one transaction.
    async fn load(
        &self,
        binding: &dyn TableBinding,
        records: &[Box<dyn Record>],
    ) -> Result<LoadSummary>;

    async fn clear(&self, binding: &dyn TableBinding) -> Result<()>;
}

/// Batch size to use for `total` rows; zero means a single batch.
pub fn effective_batch_size(batch_size: usize, total: usize) -> usize {
    if batch_size == 0 {
        total.max(1)
    } else {
        batch_size
    }
}

/// Join placeholders into `(..), (..)` groups for a multi-row insert.
pub fn values_clause(rows: usize, columns: usize, placeholder: impl Fn(usize) -> String) -> String {
    (0..rows)
        .map(|row| {
            let cells: Vec<String> = (0..columns)
                .map(|col| placeholder(row * columns + col + 1))
                .collect();
            format!("({})", cells.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
