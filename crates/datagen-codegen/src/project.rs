use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{CodegenError, Result};

/// One rendered artifact, with its path relative to the generated crate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
    /// Template (or runtime module) the file came from.
    pub template: &'static str,
}

/// Every artifact of one run, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedProject {
    pub files: Vec<GeneratedFile>,
}

impl GeneratedProject {
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
        self.files.iter().find(|file| file.path == path.as_ref())
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|file| file.path.as_path()).collect()
    }

    /// Write every file below `root` through `write`, returning the absolute paths.
    pub fn write_to<W>(&self, root: &Path, mut write: W) -> Result<Vec<PathBuf>>
    where
        W: FnMut(&Path, &[u8]) -> io::Result<()>,
    {
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = root.join(&file.path);
            write(&path, file.contents.as_bytes())
                .map_err(|source| CodegenError::Write {
                    path: path.clone(),
                    source,
                })?;
            written.push(path);
        }
        Ok(written)
    }
}
