//! Deep merge engine
//!
//! Layers are folded left to right, starting from an empty mapping. At every
//! node the [`MergePolicy`] picks an ordered list of strategies:
//!
//! - both sides share a [`TypeTag`]: the strategies configured for that tag,
//!   then the fallback list
//! - the tags differ: the type-conflict list
//!
//! The first strategy returning [`StrategyOutcome::Applied`] wins. When every
//! strategy declines the merge fails with `MergeType`.
//!
//! The default policy deep-merges mappings, appends sequences and lets the
//! later value win everywhere else.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::{TypeTag, Value};

/// Result of asking a strategy to merge two values
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Applied(Value),
    NotApplicable,
}

/// A user-supplied merge strategy
pub trait MergeStrategy: Send + Sync {
    /// Name used in logs and by [`Strategy::from_str`]
    fn name(&self) -> &str;

    /// Merge `next` onto `base` at `path`, or decline with `NotApplicable`
    fn apply(
        &self,
        ctx: &MergeContext<'_>,
        path: &str,
        base: &Value,
        next: &Value,
    ) -> Result<StrategyOutcome>;
}

/// One entry in a policy's strategy list
#[derive(Clone)]
pub enum Strategy {
    /// Key-by-key recursion over two mappings
    Merge,
    /// `base ++ next` for sequences
    Append,
    /// `next ++ base` for sequences
    Prepend,
    /// `base ++ next`, skipping items already present
    AppendUnique,
    /// `next` replaces `base`
    Override,
    Custom(Arc<dyn MergeStrategy>),
}

impl Strategy {
    /// Wrap a custom strategy
    pub fn custom(strategy: impl MergeStrategy + 'static) -> Self {
        Strategy::Custom(Arc::new(strategy))
    }

    pub fn name(&self) -> &str {
        match self {
            Strategy::Merge => "merge",
            Strategy::Append => "append",
            Strategy::Prepend => "prepend",
            Strategy::AppendUnique => "append_unique",
            Strategy::Override => "override",
            Strategy::Custom(s) => s.name(),
        }
    }

    fn apply(
        &self,
        ctx: &MergeContext<'_>,
        path: &str,
        base: &Value,
        next: &Value,
    ) -> Result<StrategyOutcome> {
        use StrategyOutcome::*;

        Ok(match (self, base, next) {
            (Strategy::Merge, Value::Mapping(b), Value::Mapping(n)) => {
                Applied(Value::Mapping(merge_mappings(ctx, path, b, n)?))
            }
            (Strategy::Append, Value::Sequence(b), Value::Sequence(n)) => {
                Applied(Value::Sequence(b.iter().chain(n).cloned().collect()))
            }
            (Strategy::Prepend, Value::Sequence(b), Value::Sequence(n)) => {
                Applied(Value::Sequence(n.iter().chain(b).cloned().collect()))
            }
            (Strategy::AppendUnique, Value::Sequence(b), Value::Sequence(n)) => {
                let mut out = b.clone();
                for item in n {
                    if !out.contains(item) {
                        out.push(item.clone());
                    }
                }
                Applied(Value::Sequence(out))
            }
            (Strategy::Override, _, next) => Applied(next.clone()),
            (Strategy::Custom(s), base, next) => s.apply(ctx, path, base, next)?,
            _ => NotApplicable,
        })
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Custom(s) => write!(f, "Custom({})", s.name()),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "merge" => Ok(Strategy::Merge),
            "append" => Ok(Strategy::Append),
            "prepend" => Ok(Strategy::Prepend),
            "append_unique" => Ok(Strategy::AppendUnique),
            "override" => Ok(Strategy::Override),
            "merge_by_id" => Ok(Strategy::custom(MergeById)),
            other => Err(Error::parse(format!("Unknown merge strategy '{}'", other)).with_help(
                "Use one of: merge, append, prepend, append_unique, override, merge_by_id",
            )),
        }
    }
}

/// Per-type strategy lists used by the merge engine
#[derive(Debug, Clone)]
pub struct MergePolicy {
    type_strategies: IndexMap<TypeTag, Vec<Strategy>>,
    fallback: Vec<Strategy>,
    type_conflict: Vec<Strategy>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        let mut type_strategies = IndexMap::new();
        type_strategies.insert(TypeTag::Mapping, vec![Strategy::Merge]);
        type_strategies.insert(TypeTag::Sequence, vec![Strategy::Append]);
        Self {
            type_strategies,
            fallback: vec![Strategy::Override],
            type_conflict: vec![Strategy::Override],
        }
    }
}

impl MergePolicy {
    /// A policy with no strategies at all; every merge fails until some are added
    pub fn empty() -> Self {
        Self {
            type_strategies: IndexMap::new(),
            fallback: Vec::new(),
            type_conflict: Vec::new(),
        }
    }

    /// Replace the strategy list for one type tag
    pub fn with_type(mut self, tag: TypeTag, strategies: Vec<Strategy>) -> Self {
        self.type_strategies.insert(tag, strategies);
        self
    }

    /// Use a single strategy for sequences, falling back to `append` if it declines
    pub fn with_sequence_strategy(self, strategy: Strategy) -> Self {
        let mut strategies = vec![strategy];
        if !matches!(strategies[0], Strategy::Append) {
            strategies.push(Strategy::Append);
        }
        self.with_type(TypeTag::Sequence, strategies)
    }

    pub fn with_fallback(mut self, strategies: Vec<Strategy>) -> Self {
        self.fallback = strategies;
        self
    }

    pub fn with_type_conflict(mut self, strategies: Vec<Strategy>) -> Self {
        self.type_conflict = strategies;
        self
    }

    /// Strategies configured for a type tag, excluding the fallback list
    pub fn strategies_for(&self, tag: TypeTag) -> &[Strategy] {
        self.type_strategies
            .get(&tag)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn candidates(&self, base: &Value, next: &Value) -> impl Iterator<Item = &Strategy> {
        let (typed, rest) = if base.type_tag() == next.type_tag() {
            (self.strategies_for(base.type_tag()), self.fallback.as_slice())
        } else {
            (&[][..], self.type_conflict.as_slice())
        };
        typed.iter().chain(rest)
    }
}

/// What a strategy sees besides the two values being merged
pub struct MergeContext<'a> {
    policy: &'a MergePolicy,
    partial: &'a Value,
}

impl<'a> MergeContext<'a> {
    /// The accumulated result of the fold before this step
    pub fn partial(&self) -> &Value {
        self.partial
    }

    pub fn policy(&self) -> &MergePolicy {
        self.policy
    }

    /// Merge two values with the full policy, for strategies that recurse
    pub fn merge(&self, path: &str, base: &Value, next: &Value) -> Result<Value> {
        let candidates = self.policy.candidates(base, next);
        for strategy in candidates {
            if let StrategyOutcome::Applied(value) = strategy.apply(self, path, base, next)? {
                return Ok(value);
            }
        }
        Err(Error::merge_type(
            display_path(path),
            base.type_name(),
            next.type_name(),
        ))
    }
}

fn merge_mappings(
    ctx: &MergeContext<'_>,
    path: &str,
    base: &IndexMap<String, Value>,
    next: &IndexMap<String, Value>,
) -> Result<IndexMap<String, Value>> {
    let mut out = base.clone();
    for (key, value) in next {
        let merged = match base.get(key) {
            Some(existing) => ctx.merge(&child_path(path, key), existing, value)?,
            None => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    Ok(out)
}

pub(crate) fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

/// Merge `next` onto `base`
pub fn merge_two(base: &Value, next: &Value, policy: &MergePolicy) -> Result<Value> {
    let ctx = MergeContext {
        policy,
        partial: base,
    };
    ctx.merge("", base, next)
}

/// Fold trees left to right, starting from an empty mapping
pub fn merge<'a>(
    trees: impl IntoIterator<Item = &'a Value>,
    policy: &MergePolicy,
) -> Result<Value> {
    let mut acc = Value::empty_mapping();
    for tree in trees {
        acc = merge_two(&acc, tree, policy)?;
    }
    Ok(acc)
}

/// Merges sequences of mappings by their `id` key.
///
/// An item whose `id` matches a base item replaces it in place; an item with
/// a `remove` key deletes the matching base item and is not added. Declines
/// when either side holds a non-mapping item.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeById;

impl MergeStrategy for MergeById {
    fn name(&self) -> &str {
        "merge_by_id"
    }

    fn apply(
        &self,
        _ctx: &MergeContext<'_>,
        _path: &str,
        base: &Value,
        next: &Value,
    ) -> Result<StrategyOutcome> {
        let (Value::Sequence(base), Value::Sequence(next)) = (base, next) else {
            return Ok(StrategyOutcome::NotApplicable);
        };
        if !base.iter().chain(next).all(Value::is_mapping) {
            return Ok(StrategyOutcome::NotApplicable);
        }

        let id_of = |item: &Value| item.as_mapping().and_then(|m| m.get("id")).cloned();

        let mut out = base.clone();
        for item in next {
            let removing = item.as_mapping().is_some_and(|m| m.contains_key("remove"));
            let position = id_of(item).and_then(|id| out.iter().position(|b| id_of(b) == Some(id.clone())));

            match (position, removing) {
                (Some(idx), true) => {
                    out.remove(idx);
                }
                (Some(idx), false) => out[idx] = item.clone(),
                (None, true) => {}
                (None, false) => out.push(item.clone()),
            }
        }
        Ok(StrategyOutcome::Applied(Value::Sequence(out)))
    }
}
