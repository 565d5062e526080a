use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{DG_EXTENSION, qualified_name};

/// One directory level of the source tree, with its `.dg` units keyed by qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub models: IndexMap<String, Vec<u8>>,
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Every unit in the tree, this level first, then children depth-first.
    pub fn units(&self) -> Vec<(&str, &[u8])> {
        let mut out = Vec::new();
        self.collect_units(&mut out);
        out
    }

    fn collect_units<'a>(&'a self, out: &mut Vec<(&'a str, &'a [u8])>) {
        for (name, source) in &self.models {
            out.push((name.as_str(), source.as_slice()));
        }
        for child in &self.children {
            child.collect_units(out);
        }
    }

    pub fn model_count(&self) -> usize {
        self.models.len() + self.children.iter().map(Self::model_count).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.model_count() == 0
    }
}

/// Build the directory tree for a `.dg` file or a directory of them.
///
/// Dotfiles are skipped, non-`.dg` files are ignored, and any name containing whitespace is
/// rejected since it cannot become part of a qualified name.
pub fn collect_dg_dir(path: &Path) -> Result<DirectoryNode> {
    let meta = fs::metadata(path).map_err(|err| Error::io(path, err))?;
    if meta.is_file() {
        return collect_file(path);
    }
    collect_directory(path, &[])
}

fn collect_file(path: &Path) -> Result<DirectoryNode> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(DG_EXTENSION) {
        return Err(Error::InvalidInput(format!(
            "file {} is not a .{DG_EXTENSION} file",
            path.display()
        )));
    }
    let file_name = file_name(path)?;
    check_whitespace(&file_name)?;
    let stem = file_name
        .strip_suffix(&format!(".{DG_EXTENSION}"))
        .unwrap_or(&file_name)
        .to_string();
    let content = fs::read(path).map_err(|err| Error::io(path, err))?;

    let mut node = DirectoryNode::new(String::new());
    node.models.insert(stem, content);
    Ok(node)
}

fn collect_directory(root: &Path, segments: &[String]) -> Result<DirectoryNode> {
    let dir = segments.iter().fold(root.to_path_buf(), |acc, seg| acc.join(seg));
    let mut entries = fs::read_dir(&dir)
        .map_err(|err| Error::io(&dir, err))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|err| Error::io(&dir, err))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut node = DirectoryNode::new(segments.last().cloned().unwrap_or_default());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        check_whitespace(&name)?;

        let entry_path = entry.path();
        let file_type = entry.file_type().map_err(|err| Error::io(&entry_path, err))?;
        if file_type.is_dir() {
            let mut nested = segments.to_vec();
            nested.push(name);
            node.children.push(collect_directory(root, &nested)?);
            continue;
        }

        let Some(stem) = name.strip_suffix(&format!(".{DG_EXTENSION}")) else {
            continue;
        };
        let content = fs::read(&entry_path).map_err(|err| Error::io(&entry_path, err))?;
        let key = qualified_name(segments, stem);
        debug!(unit = %key, path = %entry_path.display(), "collected dg unit");
        node.models.insert(key, content);
    }

    Ok(node)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidInput(format!("invalid path {}", path.display())))
}

fn check_whitespace(name: &str) -> Result<()> {
    if name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!(
            "directory/file name contains whitespace: {name:?}"
        )));
    }
    Ok(())
}
