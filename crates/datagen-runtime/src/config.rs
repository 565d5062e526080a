//! JSON configuration for the `execute` command.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} sink {sink_name:?} config: {source}")]
    SinkConfig {
        kind: String,
        sink_name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config references unknown model {0:?}")]
    UnknownModel(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Clear every configured sink before loading.
    #[serde(default)]
    pub clear_data: bool,
    /// Per-model settings keyed by qualified model name.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    /// Overrides the model's metadata count.
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub sinks: Vec<SinkSpec>,
}

/// One sink a model is loaded into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SinkSpec {
    /// Backend kind, e.g. `mysql` or `postgres`.
    pub sink_type: String,
    /// Free-form label used in logs.
    pub sink_name: String,
    /// Backend specific settings.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl SinkSpec {
    /// Deserialize the backend specific settings.
    pub fn config_into<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.config.clone()).map_err(|source| ConfigError::SinkConfig {
            kind: self.sink_type.clone(),
            sink_name: self.sink_name.clone(),
            source,
        })
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Fail when the config names a model the program does not know.
    pub fn check_models<'a>(&self, known: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let known: Vec<&str> = known.into_iter().collect();
        match self.models.keys().find(|name| !known.contains(&name.as_str())) {
            Some(unknown) => Err(ConfigError::UnknownModel(unknown.clone())),
            None => Ok(()),
        }
    }

    pub fn sink_specs_for_model(&self, name: &str) -> &[SinkSpec] {
        self.models
            .get(name)
            .map(|model| model.sinks.as_slice())
            .unwrap_or_default()
    }

    /// Configured count for `name`, falling back to `default`.
    pub fn record_count(&self, name: &str, default: usize) -> usize {
        self.models
            .get(name)
            .and_then(|model| model.count)
            .unwrap_or(default)
    }
}

/// JSON Schema of [`Config`], pretty-printed.
pub fn schema_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&schemars::schema_for!(Config))
}
