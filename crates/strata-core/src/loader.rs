//! Document loading
//!
//! Reads one YAML or JSON document into a [`Value`] mapping. Two load-time
//! conveniences are expanded here rather than in the resolver:
//!
//! - `!include <file> <dotted.path>` pulls a deep copy of a value out of
//!   another document, relative to the loader's include root
//! - the literal token `{{cwd}}` becomes the absolute directory holding the
//!   document

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result, SourceLocation};
use crate::value::Value;

const INCLUDE_TAG: &str = "!include";
const CWD_TOKEN: &str = "{{cwd}}";

/// Supported document formats, picked by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Format for a path; anything that is not `.json` is read as YAML
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Loads configuration documents from disk
#[derive(Debug, Clone)]
pub struct Loader {
    include_root: PathBuf,
}

impl Loader {
    /// Create a loader resolving relative `!include` paths against `include_root`
    pub fn new(include_root: impl Into<PathBuf>) -> Self {
        Self {
            include_root: include_root.into(),
        }
    }

    /// Directory relative `!include` paths are resolved against
    pub fn include_root(&self) -> &Path {
        &self.include_root
    }

    /// Load a document; the top level must be a mapping (an empty document
    /// loads as an empty mapping)
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Value> {
        let mut include_stack = Vec::new();
        self.load_document(path.as_ref(), &mut include_stack)
    }

    fn load_document(&self, path: &Path, include_stack: &mut Vec<PathBuf>) -> Result<Value> {
        log::debug!("Loading document {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path.display(), &e))?;
        let location = SourceLocation::file(path.display().to_string());

        let identity = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        include_stack.push(identity);

        let parsed = match Format::for_path(path) {
            Format::Json => parse_json(&content, &location),
            Format::Yaml => parse_yaml(&content, &location)
                .and_then(|doc| self.convert_yaml(doc, &location, include_stack)),
        };
        include_stack.pop();

        let value = match parsed? {
            Value::Null => Value::empty_mapping(),
            value @ Value::Mapping(_) => value,
            other => {
                return Err(Error::parse(format!(
                    "Top level of a document must be a mapping, got {}",
                    other.type_name()
                ))
                .with_source_location(location))
            }
        };

        let dir = document_dir(path)?;
        Ok(value.map_strings(&mut |s: &str| replace_cwd(s, &dir)))
    }

    fn convert_yaml(
        &self,
        value: serde_yaml::Value,
        location: &SourceLocation,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<Value> {
        Ok(match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => number_value(n.as_i64(), n.as_f64()),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => Value::Sequence(
                seq.into_iter()
                    .map(|item| self.convert_yaml(item, location, include_stack))
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_yaml::Value::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    let key = yaml_key(key).map_err(|e| e.with_source_location(location.clone()))?;
                    out.insert(key, self.convert_yaml(item, location, include_stack)?);
                }
                Value::Mapping(out)
            }
            serde_yaml::Value::Tagged(tagged) => {
                if tagged.tag == INCLUDE_TAG {
                    let spec = match tagged.value {
                        serde_yaml::Value::String(s) => s,
                        other => {
                            return Err(Error::parse(format!(
                                "{} expects '<file> <dotted.path>', got {:?}",
                                INCLUDE_TAG, other
                            ))
                            .with_source_location(location.clone()))
                        }
                    };
                    self.include(&spec, location, include_stack)?
                } else {
                    log::debug!("Ignoring unknown tag {} in {}", tagged.tag, location.file);
                    self.convert_yaml(tagged.value, location, include_stack)?
                }
            }
        })
    }

    fn include(
        &self,
        spec: &str,
        location: &SourceLocation,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<Value> {
        let mut parts = spec.split_whitespace();
        let (file, key) = match (parts.next(), parts.next(), parts.next()) {
            (Some(file), Some(key), None) => (file, key),
            _ => {
                return Err(Error::parse(format!(
                    "{} expects '<file> <dotted.path>', got '{}'",
                    INCLUDE_TAG, spec
                ))
                .with_source_location(location.clone()))
            }
        };

        let target = self.include_root.join(file);
        let identity = std::fs::canonicalize(&target).unwrap_or_else(|_| target.clone());
        if include_stack.contains(&identity) {
            let mut chain: Vec<String> = include_stack
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(identity.display().to_string());
            return Err(Error::circular_reference(spec, chain)
                .with_source_location(location.clone()));
        }

        log::debug!("Including '{}' from {}", key, target.display());
        let document = self.load_document(&target, include_stack)?;
        let value = document
            .lookup(key)?
            .ok_or_else(|| {
                Error::path_not_found(key)
                    .with_source_location(SourceLocation::file(target.display().to_string()))
            })?;
        Ok(value.clone())
    }
}

fn parse_yaml(content: &str, location: &SourceLocation) -> Result<serde_yaml::Value> {
    serde_yaml::from_str(content).map_err(|e| {
        let mut loc = location.clone();
        if let Some(mark) = e.location() {
            loc.line = Some(mark.line());
            loc.column = Some(mark.column());
        }
        Error::parse(e.to_string()).with_source_location(loc)
    })
}

fn parse_json(content: &str, location: &SourceLocation) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    let doc: serde_json::Value = serde_json::from_str(content).map_err(|e| {
        Error::parse(e.to_string()).with_source_location(SourceLocation {
            file: location.file.clone(),
            line: Some(e.line()),
            column: Some(e.column()),
        })
    })?;
    Ok(from_json(doc))
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => number_value(n.as_i64(), n.as_f64()),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Sequence(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Mapping(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn number_value(int: Option<i64>, float: Option<f64>) -> Value {
    match (int, float) {
        (Some(i), _) => Value::Integer(i),
        (None, Some(f)) => Value::Float(f),
        (None, None) => Value::Null,
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        other => Err(Error::parse(format!(
            "Mapping keys must be scalars, got {:?}",
            other
        ))),
    }
}

fn document_dir(path: &Path) -> Result<String> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let absolute = std::path::absolute(parent).map_err(|e| Error::io(parent.display(), &e))?;
    Ok(absolute.display().to_string())
}

fn replace_cwd(s: &str, dir: &str) -> String {
    if s.contains(CWD_TOKEN) {
        s.replace(CWD_TOKEN, dir)
    } else {
        s.to_string()
    }
}
