use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{WorkspaceError, WorkspaceResult};

/// Settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "datagen.toml";

/// Defaults for the transpiler; CLI flags override each of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the generated crate is written.
    pub output_dir: PathBuf,
    /// Parent of the per-run directories.
    pub run_dir: PathBuf,
    pub package_name: String,
    pub sinks: Vec<String>,
    /// Cargo executable used to build the generated crate.
    pub cargo: String,
    pub release: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("datagen-out"),
            run_dir: PathBuf::from("runs"),
            package_name: "datagen-generated".to_string(),
            sinks: vec!["mysql".to_string(), "postgres".to_string()],
            cargo: "cargo".to_string(),
            release: false,
        }
    }
}

/// Read settings from `explicit`, or from `datagen.toml` in the working directory when present.
///
/// An explicit path must exist; a missing implicit file yields the defaults.
pub fn load_settings(explicit: Option<&Path>) -> WorkspaceResult<Settings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = PathBuf::from(SETTINGS_FILE);
            if !implicit.exists() {
                debug!("no settings file, using defaults");
                return Ok(Settings::default());
            }
            implicit
        }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| WorkspaceError::Io {
        path: path.clone(),
        source,
    })?;
    parse_settings(&content).map_err(|source| WorkspaceError::TomlDecode { path, source })
}

fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let settings = parse_settings("package_name = \"shop-data\"\nrelease = true\n").unwrap();
        assert_eq!(settings.package_name, "shop-data");
        assert!(settings.release);
        assert_eq!(settings.output_dir, PathBuf::from("datagen-out"));
        assert_eq!(settings.sinks, ["mysql", "postgres"]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join(format!("{}.toml", uuid::Uuid::new_v4()));
        let err = load_settings(Some(&missing)).unwrap_err();
        assert!(matches!(err, WorkspaceError::Io { .. }));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(parse_settings("release = \"yes\"").is_err());
    }
}
