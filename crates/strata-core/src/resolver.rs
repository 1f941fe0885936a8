//! Placeholder resolution
//!
//! Resolution runs in passes. Each pass walks a read-only snapshot of the
//! tree and builds a new one; references are looked up in the snapshot and
//! resolved on demand, so most trees settle in a single pass. A reference to
//! a path that does not exist yet stays pending for the next pass.
//!
//! Every placeholder being resolved is identified by its key path plus its
//! raw text. Meeting an identity that is already in progress is a cycle.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};
use crate::interpolation::{self, Call, Expr, Part, Placeholder, Template};
use crate::merge::child_path;
use crate::provider::{ProviderArgs, ProviderContext, ProviderRegistry};
use crate::value::Value;

/// Options controlling how strict a resolve is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Leave unresolved placeholders in place (logged at warn) instead of failing
    pub skip_validation: bool,
    /// Leave provider calls untouched; implies `skip_validation`
    pub skip_providers: bool,
}

impl ResolveOptions {
    pub fn with_skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    pub fn with_skip_providers(mut self, skip: bool) -> Self {
        self.skip_providers = skip;
        self
    }

    fn tolerates_pending(&self) -> bool {
        self.skip_validation || self.skip_providers
    }
}

/// Resolves every placeholder in a tree against the tree itself and a
/// provider registry
pub struct Resolver<'r> {
    registry: &'r ProviderRegistry,
    options: ResolveOptions,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r ProviderRegistry) -> Self {
        Self {
            registry,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve all placeholders, returning a new tree
    pub fn resolve(&self, tree: &Value) -> Result<Value> {
        let max_passes = count_placeholders(tree) + 1;
        let mut current = tree.clone();
        let mut pending = Vec::new();

        for pass in 1..=max_passes {
            let (next, still_pending, substitutions) = {
                let mut state = Pass::new(self, &current);
                let next = state.walk("", &current)?;
                (next, state.pending, state.substitutions)
            };
            log::trace!(
                "Resolution pass {}: {} substitutions, {} pending",
                pass,
                substitutions,
                still_pending.len()
            );

            current = next;
            if still_pending.is_empty() {
                log::debug!("Resolved all placeholders in {} pass(es)", pass);
                return Ok(current);
            }
            pending = still_pending.into_iter().collect();
            if substitutions == 0 {
                break;
            }
        }

        if self.options.tolerates_pending() {
            for placeholder in &pending {
                log::warn!("Leaving unresolved placeholder {}", placeholder);
            }
            Ok(current)
        } else {
            Err(Error::unresolved(pending))
        }
    }

    /// Check placeholder syntax without resolving anything
    ///
    /// Returns every top-level placeholder as `path: {{...}}`.
    pub fn validate(tree: &Value) -> Result<Vec<String>> {
        let mut found = Vec::new();
        collect_placeholders("", tree, &mut found)?;
        Ok(found)
    }
}

/// Upper bound on the number of placeholders in a tree, nested ones included
pub fn count_placeholders(value: &Value) -> usize {
    match value {
        Value::String(s) => s.matches("{{").count(),
        Value::Sequence(items) => items.iter().map(count_placeholders).sum(),
        Value::Mapping(map) => map.values().map(count_placeholders).sum(),
        _ => 0,
    }
}

fn collect_placeholders(path: &str, value: &Value, found: &mut Vec<String>) -> Result<()> {
    match value {
        Value::String(s) if interpolation::needs_processing(s) => {
            let template = interpolation::parse(s).map_err(|e| e.with_path(path))?;
            found.extend(template.placeholders().map(|p| identity(path, p)));
        }
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_placeholders(&index_path(path, i), item, found)?;
            }
        }
        Value::Mapping(map) => {
            for (key, item) in map {
                collect_placeholders(&child_path(path, key), item, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

fn identity(path: &str, placeholder: &Placeholder) -> String {
    format!("{}: {}", path, placeholder.raw())
}

/// State for one pass over one snapshot
struct Pass<'a> {
    registry: &'a ProviderRegistry,
    options: &'a ResolveOptions,
    snapshot: &'a Value,
    in_progress: Vec<String>,
    /// Fully resolved values of looked-up paths
    memo: HashMap<String, Value>,
    /// Provider results keyed by kind and arguments
    calls: HashMap<String, Value>,
    pending: IndexSet<String>,
    substitutions: usize,
}

impl<'a> Pass<'a> {
    fn new(resolver: &'a Resolver<'_>, snapshot: &'a Value) -> Self {
        Self {
            registry: resolver.registry,
            options: &resolver.options,
            snapshot,
            in_progress: Vec::new(),
            memo: HashMap::new(),
            calls: HashMap::new(),
            pending: IndexSet::new(),
            substitutions: 0,
        }
    }

    /// Build the next tree, recording pending placeholders and progress
    fn walk(&mut self, path: &str, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) if interpolation::needs_processing(s) => {
                let (resolved, _) = self.resolve_string(path, s)?;
                if resolved != *value {
                    self.substitutions += 1;
                }
                // provider output and copied subtrees may carry placeholders
                // of their own; those are picked up by the next pass
                self.record_pending(path, &resolved);
                Ok(resolved)
            }
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.walk(&index_path(path, i), item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.walk(&child_path(path, key), item)?);
                }
                Ok(Value::Mapping(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Note every placeholder left in a freshly built value
    fn record_pending(&mut self, path: &str, value: &Value) {
        match value {
            Value::String(s) if interpolation::needs_processing(s) => {
                // text a provider returned may not parse; it stays literal
                if let Ok(template) = interpolation::parse(s) {
                    self.pending
                        .extend(template.placeholders().map(|p| identity(path, p)));
                }
            }
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.record_pending(&index_path(path, i), item);
                }
            }
            Value::Mapping(map) => {
                for (key, item) in map {
                    self.record_pending(&child_path(path, key), item);
                }
            }
            _ => {}
        }
    }

    /// Resolve a subtree completely, or `None` if anything in it is pending
    ///
    /// When pending placeholders are tolerated the subtree comes back with
    /// them left in place, so a reference still copies it.
    fn resolve_deep(&mut self, path: &str, value: &Value) -> Result<Option<Value>> {
        match value {
            Value::String(s) if interpolation::needs_processing(s) => {
                let (resolved, pending) = self.resolve_string(path, s)?;
                Ok((!pending || self.options.tolerates_pending()).then_some(resolved))
            }
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match self.resolve_deep(&index_path(path, i), item)? {
                        Some(resolved) => out.push(resolved),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::Sequence(out)))
            }
            Value::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    match self.resolve_deep(&child_path(path, key), item)? {
                        Some(resolved) => {
                            out.insert(key.clone(), resolved);
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::Mapping(out)))
            }
            other => Ok(Some(other.clone())),
        }
    }

    /// Resolve the placeholders in one string; the flag is true when some
    /// stayed pending
    fn resolve_string(&mut self, path: &str, s: &str) -> Result<(Value, bool)> {
        let template = interpolation::parse(s).map_err(|e| e.with_path(path))?;

        if let Some(placeholder) = template.as_single_placeholder() {
            return Ok(match self.resolve_placeholder(path, placeholder)? {
                Some(value) => (value, false),
                None => (Value::String(s.to_string()), true),
            });
        }

        let mut out = String::with_capacity(s.len());
        let mut pending = false;
        for part in template.parts() {
            match part {
                Part::Literal(text) | Part::Escaped(text) => out.push_str(text),
                Part::Placeholder(placeholder) => {
                    match self.resolve_placeholder(path, placeholder)? {
                        Some(value) => out.push_str(&render_scalar(path, placeholder, &value)?),
                        None => {
                            pending = true;
                            out.push_str(placeholder.raw());
                        }
                    }
                }
            }
        }
        Ok((Value::String(out), pending))
    }

    fn resolve_placeholder(&mut self, path: &str, placeholder: &Placeholder) -> Result<Option<Value>> {
        let id = identity(path, placeholder);
        if self.in_progress.contains(&id) {
            let mut chain = self.in_progress.clone();
            chain.push(id);
            return Err(Error::circular_reference(path, chain));
        }

        self.in_progress.push(id);
        let result = match placeholder.expr() {
            Expr::Path(template) => self.resolve_reference(path, template),
            Expr::Call(call) => self.resolve_call(path, placeholder, call),
        };
        self.in_progress.pop();
        result
    }

    fn resolve_reference(&mut self, path: &str, template: &Template) -> Result<Option<Value>> {
        match self.render_template(path, template)? {
            Some(target) => self.lookup(path, &target),
            None => Ok(None),
        }
    }

    fn resolve_call(
        &mut self,
        path: &str,
        placeholder: &Placeholder,
        call: &Call,
    ) -> Result<Option<Value>> {
        if self.options.skip_providers {
            return Ok(None);
        }

        let mut args = ProviderArgs::new();
        for (name, template) in &call.args {
            match self.render_template(path, template)? {
                Some(value) => {
                    args.insert(name.clone(), value);
                }
                None => return Ok(None),
            }
        }

        let key = format!("{}{:?}", call.kind, args);
        if let Some(value) = self.calls.get(&key) {
            return Ok(Some(value.clone()));
        }

        let ctx = ProviderContext::new(path, placeholder.raw(), self.snapshot);
        let value = self.registry.resolve(&call.kind, &args, &ctx)?;
        self.calls.insert(key, value.clone());
        Ok(Some(value))
    }

    /// Render a template to text, or `None` if a nested placeholder is pending
    fn render_template(&mut self, path: &str, template: &Template) -> Result<Option<String>> {
        let mut out = String::new();
        for part in template.parts() {
            match part {
                Part::Literal(text) | Part::Escaped(text) => out.push_str(text),
                Part::Placeholder(inner) => match self.resolve_placeholder(path, inner)? {
                    Some(value) => out.push_str(&render_scalar(path, inner, &value)?),
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(out))
    }

    /// Look up a path in the snapshot and resolve whatever is found there
    fn lookup(&mut self, path: &str, target: &str) -> Result<Option<Value>> {
        if let Some(value) = self.memo.get(target) {
            return Ok(Some(value.clone()));
        }

        let snapshot = self.snapshot;
        let node = snapshot.lookup(target).map_err(|e| e.with_path(path))?;
        let found = match node {
            Some(node) => self.resolve_deep(target, node)?,
            None => self.lookup_through_placeholder(path, target)?,
        };

        if let Some(value) = &found {
            self.memo.insert(target.to_string(), value.clone());
        }
        Ok(found)
    }

    /// Handle a target whose longest existing prefix is itself a placeholder,
    /// e.g. `{{alias.key}}` with `alias: "{{real}}"`
    fn lookup_through_placeholder(&mut self, path: &str, target: &str) -> Result<Option<Value>> {
        let snapshot = self.snapshot;

        for (idx, ch) in target.char_indices().rev() {
            if ch != '.' && ch != '[' {
                continue;
            }
            let prefix = &target[..idx];
            let Some(node) = snapshot.lookup(prefix).map_err(|e| e.with_path(path))? else {
                continue;
            };

            let rest = target[idx..].trim_start_matches('.');
            return match node {
                Value::String(s) if interpolation::needs_processing(s) => {
                    match self.lookup(path, prefix)? {
                        Some(resolved) => Ok(resolved
                            .lookup(rest)
                            .map_err(|e| e.with_path(path))?
                            .cloned()),
                        None => Ok(None),
                    }
                }
                _ => Ok(None),
            };
        }
        Ok(None)
    }
}

/// Text for a value embedded in a longer string
fn render_scalar(path: &str, placeholder: &Placeholder, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Mapping(_) | Value::Sequence(_) => {
            Err(Error::type_coercion(path, "scalar", value.type_name()).with_help(format!(
                "{} resolves to a {}; only a placeholder that is the whole value can take one",
                placeholder.raw(),
                value.type_name()
            )))
        }
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mapping;
    use pretty_assertions::assert_eq;

    fn resolve(tree: &Value) -> Result<Value> {
        let registry = ProviderRegistry::with_builtins();
        Resolver::new(&registry).resolve(tree)
    }

    #[test]
    fn test_reference_inside_string() {
        let tree = mapping! {
            "account" => mapping! { "id" => "123456" },
            "role" => "arn:aws:iam::{{account.id}}:role/admin",
        };
        let resolved = resolve(&tree).unwrap();

        assert_eq!(
            resolved.get_path("role").unwrap().as_str(),
            Some("arn:aws:iam::123456:role/admin")
        );
    }

    #[test]
    fn test_whole_subtree_reference() {
        let tree = mapping! {
            "projects" => mapping! {
                "webapp1" => mapping! {
                    "tagging" => mapping! { "team" => "web", "cost" => 42 },
                },
            },
            "tagging" => "{{projects.webapp1.tagging}}",
        };
        let resolved = resolve(&tree).unwrap();

        assert_eq!(
            resolved.get_path("tagging").unwrap(),
            &mapping! { "team" => "web", "cost" => 42 }
        );
    }

    #[test]
    fn test_nested_path_placeholder() {
        let tree = mapping! {
            "project" => mapping! { "name" => "webapp1" },
            "projects" => mapping! {
                "webapp1" => mapping! { "tagging" => mapping! { "team" => "web" } },
            },
            "tagging" => "{{projects.{{project.name}}.tagging}}",
        };
        let resolved = resolve(&tree).unwrap();

        assert_eq!(
            resolved.get_path("tagging").unwrap(),
            &mapping! { "team" => "web" }
        );
    }

    #[test]
    fn test_whole_placeholder_keeps_type() {
        let tree = mapping! {
            "port" => 5432,
            "enabled" => true,
            "db_port" => "{{port}}",
            "db_enabled" => "{{ enabled }}",
            "url" => "db:{{port}}",
        };
        let resolved = resolve(&tree).unwrap();

        assert_eq!(resolved.get_path("db_port").unwrap(), &Value::Integer(5432));
        assert_eq!(resolved.get_path("db_enabled").unwrap(), &Value::Bool(true));
        assert_eq!(resolved.get_path("url").unwrap().as_str(), Some("db:5432"));
    }

    #[test]
    fn test_reference_chain_resolved_on_demand() {
        let tree = mapping! {
            "c" => "{{b}}-c",
            "b" => "{{a}}-b",
            "a" => "a",
            "map1" => mapping! { "key1" => "value1" },
            "map2" => "{{map1}}",
            "value" => "something-{{map2.key1}}",
        };
        let resolved = resolve(&tree).unwrap();

        assert_eq!(resolved.get_path("c").unwrap().as_str(), Some("a-b-c"));
        assert_eq!(
            resolved.get_path("value").unwrap().as_str(),
            Some("something-value1")
        );
    }

    #[test]
    fn test_sequence_references() {
        let tree = mapping! {
            "servers" => vec![mapping! { "host" => "a.example" }, mapping! { "host" => "{{fallback}}" }],
            "fallback" => "b.example",
            "primary" => "{{servers[0].host}}",
            "secondary" => "{{servers[1].host}}",
        };
        let resolved = resolve(&tree).unwrap();

        assert_eq!(resolved.get_path("primary").unwrap().as_str(), Some("a.example"));
        assert_eq!(resolved.get_path("secondary").unwrap().as_str(), Some("b.example"));
        assert_eq!(resolved.get_path("servers[1].host").unwrap().as_str(), Some("b.example"));
    }

    #[test]
    fn test_circular_reference() {
        let tree = mapping! { "a" => "{{b}}", "b" => "{{a}}" };
        let err = resolve(&tree).unwrap_err();

        assert_eq!(err.kind, ErrorKind::CircularReference);
        assert!(err.to_string().contains("a: {{b}} → b: {{a}} → a: {{b}}"));
    }

    #[test]
    fn test_self_reference_through_parent() {
        let tree = mapping! { "a" => mapping! { "x" => "{{a}}" } };
        let err = resolve(&tree).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CircularReference);
    }

    #[test]
    fn test_missing_reference() {
        let tree = mapping! { "a" => "{{missing.key}}", "b" => "ok" };
        let err = resolve(&tree).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::UnresolvedReference(vec!["a: {{missing.key}}".into()])
        );
    }

    #[test]
    fn test_skip_validation_leaves_placeholder() {
        let tree = mapping! {
            "a" => "{{missing.key}}",
            "b" => "x-{{c}}-{{missing}}",
            "c" => "c",
        };
        let registry = ProviderRegistry::with_builtins();
        let resolved = Resolver::new(&registry)
            .with_options(ResolveOptions::default().with_skip_validation(true))
            .resolve(&tree)
            .unwrap();

        assert_eq!(
            resolved,
            mapping! {
                "a" => "{{missing.key}}",
                "b" => "x-c-{{missing}}",
                "c" => "c",
            }
        );
    }

    #[test]
    fn test_unresolved_lists_each_placeholder() {
        let tree = mapping! {
            "b" => "x-{{c}}-{{missing}}-{{gone.key}}",
            "c" => "c",
        };
        let err = resolve(&tree).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::UnresolvedReference(vec![
                "b: {{missing}}".into(),
                "b: {{gone.key}}".into(),
            ])
        );
    }

    #[test]
    fn test_provider_output_resolved_in_next_pass() {
        let mut registry = ProviderRegistry::new();
        registry.register_fn("alias", |args, _| {
            Ok(Value::String(format!("{{{{{}}}}}", args["alias"])))
        });
        let tree = mapping! {
            "a" => "{{alias(other.key)}}",
            "other" => mapping! { "key" => "v" },
        };
        let resolved = Resolver::new(&registry).resolve(&tree).unwrap();

        assert_eq!(resolved.get_path("a").unwrap().as_str(), Some("v"));
    }

    #[test]
    fn test_pass_bound_is_unresolved() {
        // every call yields a new call, so no pass ever settles
        let mut registry = ProviderRegistry::new();
        registry.register_fn("gen", |args, _| {
            let n: i64 = args["gen"].parse().unwrap_or(0);
            Ok(Value::String(format!("{{{{gen({})}}}}", n + 1)))
        });
        let tree = mapping! { "a" => "{{gen(0)}}" };
        let err = Resolver::new(&registry).resolve(&tree).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::UnresolvedReference(vec!["a: {{gen(2)}}".into()])
        );
    }

    #[test]
    fn test_mapping_inside_string_is_type_error() {
        let tree = mapping! {
            "tags" => mapping! { "team" => "web" },
            "label" => "tags={{tags}}",
        };
        let err = resolve(&tree).unwrap_err();

        assert_eq!(err.kind, ErrorKind::TypeCoercion);
        assert_eq!(err.path.as_deref(), Some("label"));
    }

    #[test]
    fn test_provider_call() {
        std::env::set_var("STRATA_RESOLVER_USER", "admin");
        let tree = mapping! {
            "user" => "{{env(STRATA_RESOLVER_USER)}}",
            "greeting" => "hello {{user}}",
        };
        let resolved = resolve(&tree).unwrap();
        std::env::remove_var("STRATA_RESOLVER_USER");

        assert_eq!(resolved.get_path("greeting").unwrap().as_str(), Some("hello admin"));
    }

    #[test]
    fn test_provider_args_are_resolved() {
        let mut registry = ProviderRegistry::new();
        registry.register_fn("ssm", |args, _| {
            Ok(Value::String(format!("secret:{}:{}", args["path"], args["aws_profile"])))
        });
        let tree = mapping! {
            "env" => "prod",
            "aws" => mapping! { "profile" => "{{env}}-admin" },
            "password" => "{{ssm.path(/{{env}}/db).aws_profile({{aws.profile}})}}",
        };
        let resolved = Resolver::new(&registry).resolve(&tree).unwrap();

        assert_eq!(
            resolved.get_path("password").unwrap().as_str(),
            Some("secret:/prod/db:prod-admin")
        );
    }

    #[test]
    fn test_unknown_provider_fails() {
        let tree = mapping! { "secret" => "{{vault.path(kv/app)}}" };
        let err = resolve(&tree).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownProvider { name: "vault".into() });
    }

    #[test]
    fn test_skip_providers_leaves_calls() {
        let tree = mapping! {
            "secret" => "{{vault.path(kv/app)}}",
            "name" => "app",
            "label" => "{{name}}",
        };
        let registry = ProviderRegistry::with_builtins();
        let resolved = Resolver::new(&registry)
            .with_options(ResolveOptions::default().with_skip_providers(true))
            .resolve(&tree)
            .unwrap();

        assert_eq!(
            resolved,
            mapping! {
                "secret" => "{{vault.path(kv/app)}}",
                "name" => "app",
                "label" => "app",
            }
        );
    }

    #[test]
    fn test_skip_providers_still_copies_subtree() {
        let tree = mapping! {
            "aws" => mapping! { "region" => "us", "secret" => "{{ssm.path(x)}}" },
            "copy" => "{{aws}}",
        };
        let registry = ProviderRegistry::new();
        let resolved = Resolver::new(&registry)
            .with_options(ResolveOptions::default().with_skip_providers(true))
            .resolve(&tree)
            .unwrap();

        assert_eq!(
            resolved.get_path("copy").unwrap(),
            &mapping! { "region" => "us", "secret" => "{{ssm.path(x)}}" }
        );
    }

    #[test]
    fn test_escaped_and_literal_braces_untouched() {
        let tree = mapping! {
            "template" => "{{`{{ .Values.name }}`}}",
            "broken" => "value {{ not closed",
        };
        assert_eq!(resolve(&tree).unwrap(), tree);
    }

    #[test]
    fn test_bad_syntax_reports_path() {
        let tree = mapping! { "deep" => mapping! { "bad" => "{{a..b}}" } };
        let err = resolve(&tree).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.path.as_deref(), Some("deep.bad"));
    }

    #[test]
    fn test_resolve_does_not_mutate_input() {
        let tree = mapping! { "a" => "1", "b" => "{{a}}" };
        let snapshot = tree.clone();
        let _ = resolve(&tree).unwrap();
        assert_eq!(tree, snapshot);
    }

    #[test]
    fn test_validate_lists_placeholders() {
        let tree = mapping! {
            "a" => "{{missing.key}}",
            "list" => vec!["x-{{b}}-{{vault.path(p)}}"],
            "plain" => "text",
        };
        let found = Resolver::validate(&tree).unwrap();

        assert_eq!(
            found,
            vec![
                "a: {{missing.key}}".to_string(),
                "list[0]: {{b}}".to_string(),
                "list[0]: {{vault.path(p)}}".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_reports_syntax_errors() {
        let tree = mapping! { "a" => "{{ssm.path(x}}" };
        let err = Resolver::validate(&tree).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.path.as_deref(), Some("a"));
    }

    #[test]
    fn test_count_placeholders() {
        let tree = mapping! {
            "a" => "{{b}}",
            "c" => vec!["{{x.{{y}}}}", "plain"],
            "n" => 1,
        };
        assert_eq!(count_placeholders(&tree), 3);
    }
}
