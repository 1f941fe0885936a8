//! Output shaping
//!
//! Applied to the resolved tree before it is written out: key include and
//! exclude lists, wrapping in or unwrapping from an enclosing key, and the
//! rule-driven [`FilterRules`] used by batch generation.

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};
use crate::value::Value;

/// Include/exclude lists over top-level keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter {
    /// Keep only these keys, in this order; unknown keys are ignored
    pub include: Vec<String>,
    /// Drop these keys
    pub exclude: Vec<String>,
}

impl OutputFilter {
    pub fn with_include(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Apply both lists; non-mapping trees pass through unchanged
    pub fn apply(&self, tree: &Value) -> Value {
        let Value::Mapping(map) = tree else {
            return tree.clone();
        };

        let mut out: IndexMap<String, Value> = if self.include.is_empty() {
            map.clone()
        } else {
            self.include
                .iter()
                .filter_map(|key| map.get(key).map(|v| (key.clone(), v.clone())))
                .collect()
        };

        for key in &self.exclude {
            if out.shift_remove(key).is_some() {
                log::info!("Excluding key {}", key);
            } else {
                log::info!("Excluded key {} not found or already removed", key);
            }
        }

        Value::Mapping(out)
    }
}

/// Wrap a tree under a single key
pub fn add_enclosing_key(tree: Value, key: &str) -> Value {
    log::info!("Adding enclosing key {}", key);
    let mut map = IndexMap::with_capacity(1);
    map.insert(key.to_string(), tree);
    Value::Mapping(map)
}

/// Replace a tree with the value under one of its top-level keys
pub fn remove_enclosing_key(tree: &Value, key: &str) -> Result<Value> {
    log::info!("Removing enclosing key {}", key);
    tree.as_mapping()
        .and_then(|map| map.get(key))
        .cloned()
        .ok_or_else(|| Error::path_not_found(key))
}

/// One rule: when every selector matches, the listed keys survive
#[derive(Debug, Clone)]
pub struct FilterRule {
    selector: Vec<(String, Regex)>,
    keep_values: Vec<String>,
    keep_regex: Option<Regex>,
}

impl FilterRule {
    /// Every selector pattern matches the start of its key's value; a missing
    /// key reads as the empty string
    fn matches(&self, tree: &IndexMap<String, Value>) -> bool {
        self.selector.iter().all(|(key, pattern)| {
            let text = match tree.get(key) {
                None => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            pattern.is_match(&text)
        })
    }

    fn keeps(&self, key: &str) -> bool {
        self.keep_values.iter().any(|k| k == key)
            || self.keep_regex.as_ref().is_some_and(|re| re.is_match(key))
    }
}

/// Rule set deciding which top-level keys a generated document keeps
///
/// Keys named by a hierarchy level always stay. Any other key is removed
/// unless a matching rule keeps it.
#[derive(Debug, Clone)]
pub struct FilterRules {
    rules: Vec<FilterRule>,
    levels: Vec<String>,
}

impl FilterRules {
    /// Build rules from their configuration form:
    ///
    /// ```yaml
    /// - selector: { env: "prod.*" }
    ///   keys:
    ///     values: [cluster, region]
    ///     regex: "^app_"
    /// ```
    pub fn from_value(rules: &Value, levels: &[String]) -> Result<Self> {
        let items = rules
            .as_sequence()
            .ok_or_else(|| Error::parse(format!("Filter rules must be a sequence, got {}", rules.type_name())))?;

        let rules = items
            .iter()
            .map(parse_rule)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            levels: levels.to_vec(),
        })
    }

    pub fn apply(&self, tree: &Value) -> Value {
        let Value::Mapping(map) = tree else {
            return tree.clone();
        };

        let active: Vec<&FilterRule> = self.rules.iter().filter(|r| r.matches(map)).collect();
        let out = map
            .iter()
            .filter(|(key, _)| {
                let keep = self.levels.contains(*key) || active.iter().any(|r| r.keeps(key));
                if !keep {
                    log::debug!("Filter rules drop key {}", key);
                }
                keep
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Mapping(out)
    }
}

fn parse_rule(rule: &Value) -> Result<FilterRule> {
    let rule = rule
        .as_mapping()
        .ok_or_else(|| Error::parse("Each filter rule must be a mapping"))?;

    let selector = match rule.get("selector") {
        None => Vec::new(),
        Some(Value::Mapping(selector)) => selector
            .iter()
            .map(|(key, pattern)| Ok((key.clone(), anchored_regex(&scalar_text(pattern))?)))
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(Error::parse(format!(
                "Filter selector must be a mapping, got {}",
                other.type_name()
            )))
        }
    };

    let keys = rule.get("keys").and_then(Value::as_mapping);
    let keep_values = keys
        .and_then(|k| k.get("values"))
        .and_then(Value::as_sequence)
        .map(|values| values.iter().map(scalar_text).collect())
        .unwrap_or_default();
    let keep_regex = keys
        .and_then(|k| k.get("regex"))
        .map(|pattern| anchored_regex(&scalar_text(pattern)))
        .transpose()?;

    Ok(FilterRule {
        selector,
        keep_values,
        keep_regex,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Patterns match at the start of the text, like a prefix match
fn anchored_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| Error::parse(format!("Invalid filter regex '{}': {}", pattern, e)))
}
