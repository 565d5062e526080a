mod atomic;
mod settings;

pub use atomic::{write_bytes_atomic, write_json_atomic};
pub use settings::{SETTINGS_FILE, Settings, load_settings};

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings file {path}: {source}")]
    TomlDecode {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
