use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::query::Query;
use tracing::{debug, info, warn};

use super::config::SinkSpec;
use super::record::Record;
use super::sink::{
    LoadSummary, Result, SinkAdapter, SinkError, SinkKind, TableBinding, effective_batch_size,
};

const KIND: SinkKind = SinkKind::Mysql;

fn default_port() -> u16 {
    3306
}

fn default_connect_timeout() -> u64 {
    10
}

/// `config` block of a `mysql` sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MySqlConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Overrides the table derived from the model name.
    #[serde(default)]
    pub table: Option<String>,
    /// Rows per insert statement; 0 inserts everything at once.
    #[serde(default)]
    pub batch_size: usize,
    /// Pause between batches, in milliseconds.
    #[serde(default)]
    pub throttle_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote a possibly `db.table` qualified name.
pub fn quote_table(table: &str) -> String {
    table.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

pub fn placeholder(_position: usize) -> String {
    "?".to_string()
}

pub fn clear_statement(table: &str) -> String {
    format!("DELETE FROM {}", quote_table(table))
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: Value,
) -> Query<'q, MySql, MySqlArguments> {
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

/// MySQL backend for one configured sink.
#[derive(Debug, Clone)]
pub struct MySqlSink {
    name: String,
    config: MySqlConfig,
}

impl MySqlSink {
    pub fn new(name: impl Into<String>, config: MySqlConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn from_spec(spec: &SinkSpec) -> Result<Self> {
        Ok(Self::new(spec.sink_name.clone(), spec.config_into()?))
    }

    pub fn table<'a>(&'a self, binding: &'a dyn TableBinding) -> &'a str {
        self.config.table.as_deref().unwrap_or(binding.table())
    }

    async fn connect(&self) -> std::result::Result<MySqlPool, sqlx::Error> {
        debug!(sink = %self.name, host = %self.config.host, "connecting to MySQL");
        let options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.username)
            .password(&self.config.password)
            .database(&self.config.database);
        MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .connect_with(options)
            .await
    }

    async fn insert_all(
        &self,
        pool: &MySqlPool,
        binding: &dyn TableBinding,
        records: &[Box<dyn Record>],
        inserted: &mut usize,
    ) -> std::result::Result<usize, sqlx::Error> {
        let table = self.table(binding);
        let batch_size = effective_batch_size(self.config.batch_size, records.len());
        let mut tx = pool.begin().await?;
        let mut batches = 0;

        for (index, batch) in records.chunks(batch_size).enumerate() {
            debug!(
                model = binding.model(),
                start = index * batch_size,
                size = batch.len(),
                "loading batch into MySQL"
            );
            let sql = binding.insert_statement(table, batch.len());
            let mut query = sqlx::query(&sql);
            for record in batch {
                for value in binding.row_values(record.as_ref()) {
                    query = bind_value(query, value);
                }
            }
            query.execute(&mut *tx).await?;
            *inserted += batch.len();
            batches += 1;

            if self.config.throttle_ms > 0 && *inserted < records.len() {
                tokio::time::sleep(Duration::from_millis(self.config.throttle_ms)).await;
            }
        }

        tx.commit().await?;
        Ok(batches)
    }
}

#[async_trait]
impl SinkAdapter for MySqlSink {
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
        info!(model, sink = %self.name, inserted, total, "loaded rows into MySQL");
        Ok(LoadSummary { inserted, batches })
    }

    async fn clear(&self, binding: &dyn TableBinding) -> Result<()> {
        let model = binding.model();
        let pool = self
            .connect()
            .await
            .map_err(|err| SinkError::clear(KIND, model, err))?;

        let sql = binding.clear_statement(self.table(binding));
        let outcome = sqlx::query(&sql).execute(&pool).await;
        pool.close().await;

        match outcome {
            Ok(done) => {
                info!(model, sink = %self.name, rows = done.rows_affected(), "cleared MySQL table");
                Ok(())
            }
            Err(err) => {
                warn!(model, sink = %self.name, error = %err, "failed to clear MySQL table");
                Err(SinkError::clear(KIND, model, err))
            }
        }
    }
}
