//! Batch generation
//!
//! Processes every leaf directory under a source tree and writes one YAML
//! document per leaf, laid out by the values of the configured level keys.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::filter::FilterRules;
use crate::processor::{ProcessOptions, Processor};
use crate::value::Value;

/// Options for [`generate`]
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Directory receiving the generated documents
    pub output_dir: PathBuf,
    /// Top-level keys whose values name the output directories and file
    pub levels: Vec<String>,
    /// Directory name prefixes marking a leaf (e.g. `cluster=`)
    pub leaf_prefixes: Vec<String>,
    /// Key holding the filter rules applied to every document
    pub filter_rules_key: Option<String>,
    pub process: ProcessOptions,
}

impl GenerateOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.levels = levels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_leaf_prefixes(
        mut self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.leaf_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter_rules_key(mut self, key: impl Into<String>) -> Self {
        self.filter_rules_key = Some(key.into());
        self
    }

    pub fn with_process_options(mut self, options: ProcessOptions) -> Self {
        self.process = options;
        self
    }
}

/// Every non-hidden directory below `src` whose name starts with one of
/// `prefixes`, sorted
///
/// Symlinked directories are not followed.
pub fn find_leaf_directories(src: &Path, prefixes: &[String]) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| match e.io_error() {
            Some(io) => Error::io(e.path().unwrap_or(src).display(), io),
            None => Error::path(format!("Cannot walk '{}': {}", src.display(), e)),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            found.push(entry.into_path());
        }
    }
    found.sort();

    if found.is_empty() {
        return Err(Error::path(format!(
            "No leaf directories under '{}' match {}",
            src.display(),
            prefixes.join(", ")
        )));
    }
    Ok(found)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Generate one document per leaf directory using the built-in providers
pub fn generate(src: &Path, options: &GenerateOptions) -> Result<Vec<PathBuf>> {
    generate_with(&Processor::new(options.process.clone()), src, options)
}

/// Generate with a caller-supplied processor; its own options are used for
/// each leaf and `options.process` is ignored
pub fn generate_with(
    processor: &Processor,
    src: &Path,
    options: &GenerateOptions,
) -> Result<Vec<PathBuf>> {
    if options.levels.is_empty() {
        return Err(Error::parse("At least one level is required to name output files"));
    }

    let leaves = find_leaf_directories(src, &options.leaf_prefixes)?;
    log::info!("Generating {} document(s) from {}", leaves.len(), src.display());

    let mut written = Vec::with_capacity(leaves.len());
    for leaf in &leaves {
        log::debug!("Processing leaf {}", leaf.display());
        let output = processor.process(src, leaf)?;
        let target = output_path(&options.output_dir, &options.levels, &output)?;

        let output = match &options.filter_rules_key {
            Some(key) => {
                let rules = output.get_path(key).map_err(|e| {
                    e.with_help(format!("Define '{}' in the hierarchy or drop the filter rules key", key))
                })?;
                FilterRules::from_value(rules, &options.levels)?.apply(&output)
            }
            None => output,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent.display(), &e))?;
        }
        fs::write(&target, output.to_yaml_string()?)
            .map_err(|e| Error::io(target.display(), &e))?;
        log::info!("Wrote {}", target.display());
        written.push(target);
    }

    Ok(written)
}

/// `output_dir/<level1>/.../<levelN>.yaml`
fn output_path(output_dir: &Path, levels: &[String], output: &Value) -> Result<PathBuf> {
    let mut path = output_dir.to_path_buf();
    for (i, level) in levels.iter().enumerate() {
        let segment = match output.get_path(level)? {
            Value::Null | Value::Sequence(_) | Value::Mapping(_) => {
                return Err(Error::path_not_found(level.clone())
                    .with_help(format!("'{}' must be a scalar to name an output file", level)))
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if i + 1 == levels.len() {
            path.push(format!("{}.yaml", segment));
        } else {
            path.push(segment);
        }
    }
    Ok(path)
}
