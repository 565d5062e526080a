use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{
    PgArguments, PgConnectOptions, PgConnection, PgPool, PgPoolOptions, Postgres,
};
use sqlx::query::Query;
use tracing::{debug, info, warn};

use super::config::SinkSpec;
use super::record::Record;
use super::sink::{
    LoadSummary, Result, SinkAdapter, SinkError, SinkKind, TableBinding, effective_batch_size,
    values_clause,
};

const KIND: SinkKind = SinkKind::Postgres;

const COLUMN_TYPES_SQL: &str = "SELECT a.attname::text, pg_catalog.format_type(a.atttypid, a.atttypmod) \
     FROM pg_catalog.pg_attribute a \
     WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped";

fn default_port() -> u16 {
    5432
}

fn default_connect_timeout() -> u64 {
    10
}

/// `config` block of a `postgres` sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Schema the table lives in; unqualified when absent.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub batch_size: usize,
    #[serde(default)]
    pub throttle_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a possibly `schema.table` qualified name.
pub fn quote_table(table: &str) -> String {
    table.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

pub fn placeholder(position: usize) -> String {
    format!("${position}")
}

/// Placeholder cast to the declared column type, so text-bound values reach
/// `uuid`, `date`, `jsonb` and similar columns through an explicit cast.
pub fn typed_placeholder(position: usize, column_type: Option<&str>) -> String {
    match column_type {
        Some(column_type) => format!("${position}::{column_type}"),
        None => placeholder(position),
    }
}

/// Multi-row `INSERT` whose placeholders carry `column_types`, aligned with `columns`.
pub fn typed_insert_statement(
    table: &str,
    columns: &[&str],
    column_types: &[Option<String>],
    rows: usize,
) -> String {
    let quoted: Vec<String> = columns.iter().map(|column| quote_ident(column)).collect();
    let values = values_clause(rows, columns.len(), |position| {
        let column = (position - 1) % columns.len();
        typed_placeholder(position, column_types.get(column).and_then(|ty| ty.as_deref()))
    });
    format!(
        "INSERT INTO {} ({}) VALUES {values}",
        quote_table(table),
        quoted.join(", ")
    )
}

pub fn clear_statement(table: &str) -> String {
    format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", quote_table(table))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => query.bind(int),
            None => query.bind(number.as_f64()),
        },
        Value::String(text) => query.bind(text),
        other => query.bind(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct PostgresSink {
    name: String,
    config: PostgresConfig,
}

impl PostgresSink {
    pub fn new(name: impl Into<String>, config: PostgresConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn from_spec(spec: &SinkSpec) -> Result<Self> {
        Ok(Self::new(spec.sink_name.clone(), spec.config_into()?))
    }

    /// Target table, schema-qualified when a schema is configured.
    pub fn table(&self, binding: &dyn TableBinding) -> String {
        let table = self.config.table.as_deref().unwrap_or(binding.table());
        match &self.config.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }

    async fn connect(&self) -> std::result::Result<PgPool, sqlx::Error> {
        debug!(sink = %self.name, host = %self.config.host, "connecting to Postgres");
        let options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.username)
            .password(&self.config.password)
            .database(&self.config.database);
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .connect_with(options)
            .await
    }

    /// Declared type of each bound column; empty when the table is not visible.
    async fn column_types(
        conn: &mut PgConnection,
        table: &str,
        columns: &[&str],
    ) -> std::result::Result<Vec<Option<String>>, sqlx::Error> {
        let declared: HashMap<String, String> =
            sqlx::query_as::<_, (String, String)>(COLUMN_TYPES_SQL)
                .bind(quote_table(table))
                .fetch_all(conn)
                .await?
                .into_iter()
                .collect();
        if declared.is_empty() {
            return Ok(Vec::new());
        }
        Ok(columns
            .iter()
            .map(|column| declared.get(*column).cloned())
            .collect())
    }

    async fn insert_all(
        &self,
        pool: &PgPool,
        binding: &dyn TableBinding,
        records: &[Box<dyn Record>],
        inserted: &mut usize,
    ) -> std::result::Result<usize, sqlx::Error> {
        let table = self.table(binding);
        let batch_size = effective_batch_size(self.config.batch_size, records.len());
        let mut tx = pool.begin().await?;
        let mut batches = 0;

        let column_types = Self::column_types(&mut *tx, &table, binding.columns()).await?;
        if column_types.is_empty() {
            warn!(model = binding.model(), table = %table, "column types unknown, binding untyped");
        }

        for batch in records.chunks(batch_size) {
            let sql = if column_types.is_empty() {
                binding.insert_statement(&table, batch.len())
            } else {
                typed_insert_statement(&table, binding.columns(), &column_types, batch.len())
            };
            let mut query = sqlx::query(&sql);
            for record in batch {
                for value in binding.row_values(record.as_ref()) {
                    query = bind_value(query, value);
                }
            }
            query.execute(&mut *tx).await?;
            *inserted += batch.len();
            batches += 1;
            debug!(model = binding.model(), inserted = *inserted, "batch committed to transaction");

            if self.config.throttle_ms > 0 && *inserted < records.len() {
                tokio::time::sleep(Duration::from_millis(self.config.throttle_ms)).await;
            }
        }

        tx.commit().await?;
        Ok(batches)
    }
}

#[async_trait]
impl SinkAdapter for PostgresSink {
    fn kind(&self) -> SinkKind {
        KIND
    }

    async fn load(
        &self,
        binding: &dyn TableBinding,
        records: &[Box<dyn Record>],
    ) -> Result<LoadSummary> {
        let model = binding.model();
        let total = records.len();
        let pool = self
            .connect()
            .await
            .map_err(|err| SinkError::load(KIND, model, 0, total, err))?;

        let mut inserted = 0;
        let outcome = self.insert_all(&pool, binding, records, &mut inserted).await;
        pool.close().await;

        let batches = outcome.map_err(|err| SinkError::load(KIND, model, inserted, total, err))?;
        info!(model, sink = %self.name, inserted, total, "loaded rows into Postgres");
        Ok(LoadSummary { inserted, batches })
    }

    async fn clear(&self, binding: &dyn TableBinding) -> Result<()> {
        let model = binding.model();
        let pool = self
            .connect()
            .await
            .map_err(|err| SinkError::clear(KIND, model, err))?;

        let sql = binding.clear_statement(&self.table(binding));
        let outcome = sqlx::query(&sql).execute(&pool).await;
        pool.close().await;

        outcome.map(|_| {
            info!(model, sink = %self.name, "truncated Postgres table");
        })
        .map_err(|err| {
            warn!(model, sink = %self.name, error = %err, "failed to truncate Postgres table");
            SinkError::clear(KIND, model, err)
        })
    }
}
