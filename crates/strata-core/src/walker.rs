//! Hierarchy discovery
//!
//! Walks from the root directory down to the leaf, one directory per level,
//! and turns every level into a [`Layer`]: the documents sitting directly in
//! that directory, loaded in name order and merged together.

use std::path::{Path, PathBuf};

use glob::MatchOptions;

use crate::error::{Error, Result};
use crate::loader::Loader;
use crate::merge::{merge, MergePolicy};
use crate::value::Value;

const DOCUMENT_PATTERNS: [&str; 3] = ["*.yaml", "*.yml", "*.json"];

/// One directory's merged documents
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub dir: PathBuf,
    /// Distance from the root; the root itself is 0
    pub depth: usize,
    /// Documents that produced this layer, in merge order
    pub documents: Vec<PathBuf>,
    pub value: Value,
}

/// Directories from `root` to `leaf`, inclusive, root first
///
/// `leaf` may be absolute or relative to `root`. A file leaf ends the walk
/// at its parent directory.
pub fn hierarchy_dirs(root: &Path, leaf: &Path) -> Result<Vec<PathBuf>> {
    let root = std::fs::canonicalize(root)
        .map_err(|e| Error::path(format!("Root '{}' is not accessible: {}", root.display(), e)))?;
    if !root.is_dir() {
        return Err(Error::path(format!("Root '{}' is not a directory", root.display())));
    }

    let joined = if leaf.is_absolute() {
        leaf.to_path_buf()
    } else {
        root.join(leaf)
    };
    let target = std::fs::canonicalize(&joined)
        .map_err(|_| Error::path(format!("Path '{}' does not exist", joined.display())))?;
    let leaf_dir = if target.is_file() {
        target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.clone())
    } else {
        target
    };

    let relative = leaf_dir.strip_prefix(&root).map_err(|_| {
        Error::path(format!(
            "'{}' is not inside '{}'",
            leaf_dir.display(),
            root.display()
        ))
    })?;

    let mut dirs = vec![root.clone()];
    let mut current = root;
    for component in relative.components() {
        current = current.join(component);
        dirs.push(current.clone());
    }
    Ok(dirs)
}

/// Documents directly inside `dir`, sorted by file name; hidden files are skipped
pub fn documents_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());

    let mut documents = Vec::new();
    for pattern in DOCUMENT_PATTERNS {
        let full = format!("{}/{}", escaped, pattern);
        let paths = glob::glob_with(&full, options)
            .map_err(|e| Error::path(format!("Invalid search pattern '{}': {}", full, e)))?;
        for entry in paths {
            let path = entry.map_err(|e| Error::io(e.path().display(), e.error()))?;
            if path.is_file() {
                documents.push(path);
            }
        }
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

/// Load every level between `root` and `leaf` into a layer, root first
pub fn discover_layers(
    root: &Path,
    leaf: &Path,
    loader: &Loader,
    policy: &MergePolicy,
) -> Result<Vec<Layer>> {
    let dirs = hierarchy_dirs(root, leaf)?;
    let mut layers = Vec::with_capacity(dirs.len());

    for (depth, dir) in dirs.into_iter().enumerate() {
        let documents = documents_in(&dir)?;
        log::debug!(
            "Layer {} at {}: {} document(s)",
            depth,
            dir.display(),
            documents.len()
        );

        let values = documents
            .iter()
            .map(|doc| {
                log::debug!("Reading {}", doc.display());
                loader.load(doc)
            })
            .collect::<Result<Vec<_>>>()?;
        let value = merge(&values, policy)?;

        layers.push(Layer {
            dir,
            depth,
            documents,
            value,
        });
    }

    if layers.iter().all(|layer| layer.documents.is_empty()) {
        return Err(Error::path(format!(
            "No documents found between '{}' and '{}'",
            root.display(),
            leaf.display()
        ))
        .with_help("Add at least one .yaml, .yml or .json file to the hierarchy"));
    }

    Ok(layers)
}
