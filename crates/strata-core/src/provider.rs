//! Value providers
//!
//! A provider answers call placeholders such as `{{env(HOME)}}` or
//! `{{ssm.path(/app/db).aws_profile(prod)}}`. The first link names the
//! provider; every `name(value)` link becomes an argument, with values
//! already resolved by the time the provider sees them.
//!
//! Only `env` is built in. Cloud-backed providers (`ssm`, `s3`, `vault`,
//! `outputs`) are registered by the embedding application.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;

/// Call arguments, in source order
pub type ProviderArgs = IndexMap<String, String>;

/// What a provider knows about the placeholder it is resolving
#[derive(Debug, Clone)]
pub struct ProviderContext<'a> {
    /// Key path of the value holding the placeholder (e.g. "db.password")
    pub config_path: String,
    /// The placeholder text as written
    pub placeholder: String,
    /// Snapshot of the tree being resolved
    pub root: &'a Value,
}

impl<'a> ProviderContext<'a> {
    pub fn new(
        config_path: impl Into<String>,
        placeholder: impl Into<String>,
        root: &'a Value,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            placeholder: placeholder.into(),
            root,
        }
    }

    /// Read a value from the snapshot, e.g. a default such as `aws.profile`
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        self.root.lookup(path).ok().flatten()
    }
}

/// Trait for provider implementations
pub trait Provider: Send + Sync {
    /// Name used as the first link of a call placeholder
    fn name(&self) -> &str;

    /// Produce a value for one call
    fn resolve(&self, args: &ProviderArgs, ctx: &ProviderContext<'_>) -> Result<Value>;
}

/// A simple function-based provider
pub struct FnProvider<F>
where
    F: Fn(&ProviderArgs, &ProviderContext<'_>) -> Result<Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&ProviderArgs, &ProviderContext<'_>) -> Result<Value> + Send + Sync,
{
    /// Create a new function-based provider
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Provider for FnProvider<F>
where
    F: Fn(&ProviderArgs, &ProviderContext<'_>) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, args: &ProviderArgs, ctx: &ProviderContext<'_>) -> Result<Value> {
        (self.func)(args, ctx)
    }
}

/// Registry of available providers
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in `env` provider
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FnProvider::new("env", env_provider)));
        registry
    }

    /// Register a provider, replacing any provider of the same name
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Register a provider with optional force overwrite.
    ///
    /// Without `force`, a name that is already taken is an error.
    pub fn register_with_force(&mut self, provider: Arc<dyn Provider>, force: bool) -> Result<()> {
        let name = provider.name().to_string();
        if !force && self.providers.contains_key(&name) {
            return Err(Error::provider_already_registered(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Register a function as a provider
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&ProviderArgs, &ProviderContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnProvider::new(name, func)));
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    /// Check if a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, in no particular order
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Dispatch one call to the named provider
    ///
    /// Failures come back as `Provider` errors carrying the call arguments,
    /// the placeholder and the config path.
    pub fn resolve(&self, name: &str, args: &ProviderArgs, ctx: &ProviderContext<'_>) -> Result<Value> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| Error::unknown_provider(name, Some(ctx.config_path.clone())))?;

        log::debug!("Resolving {} at '{}' via '{}'", ctx.placeholder, ctx.config_path, name);

        provider.resolve(args, ctx).map_err(|e| {
            let message = e.cause.clone().unwrap_or_else(|| e.kind.to_string());
            let err = if matches!(e.kind, ErrorKind::Provider { .. }) {
                e
            } else {
                Error::provider(name, args, message.clone())
            };
            err.with_path(ctx.config_path.clone())
                .with_cause(format!("{}: {}", ctx.placeholder, message))
        })
    }
}

/// Built-in environment variable provider
///
/// Usage:
///   {{env(VAR_NAME)}}
///   {{env.name(VAR_NAME)}}
fn env_provider(args: &ProviderArgs, _ctx: &ProviderContext<'_>) -> Result<Value> {
    let var_name = args
        .get("env")
        .or_else(|| args.get("name"))
        .ok_or_else(|| Error::provider("env", args, "env provider requires a variable name"))?;

    match std::env::var(var_name) {
        Ok(value) => Ok(Value::String(value)),
        Err(_) => Err(Error::provider(
            "env",
            args,
            format!("Environment variable '{}' is not set", var_name),
        )
        .with_help(format!("Export {} before running", var_name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping;
    use pretty_assertions::assert_eq;

    fn args(pairs: &[(&str, &str)]) -> ProviderArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_provider_with_value() {
        std::env::set_var("STRATA_TEST_VAR", "test_value");

        let root = Value::empty_mapping();
        let ctx = ProviderContext::new("test.path", "{{env(STRATA_TEST_VAR)}}", &root);
        let registry = ProviderRegistry::with_builtins();

        let result = registry
            .resolve("env", &args(&[("env", "STRATA_TEST_VAR")]), &ctx)
            .unwrap();
        assert_eq!(result, Value::from("test_value"));

        let named = registry
            .resolve("env", &args(&[("name", "STRATA_TEST_VAR")]), &ctx)
            .unwrap();
        assert_eq!(named, Value::from("test_value"));

        std::env::remove_var("STRATA_TEST_VAR");
    }

    #[test]
    fn test_env_provider_missing_var() {
        std::env::remove_var("STRATA_NONEXISTENT_VAR");

        let root = Value::empty_mapping();
        let ctx = ProviderContext::new("db.user", "{{env(STRATA_NONEXISTENT_VAR)}}", &root);
        let err = ProviderRegistry::with_builtins()
            .resolve("env", &args(&[("env", "STRATA_NONEXISTENT_VAR")]), &ctx)
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Provider { ref provider, .. } if provider == "env"));
        assert_eq!(err.path.as_deref(), Some("db.user"));
        let display = err.to_string();
        assert!(display.contains("{{env(STRATA_NONEXISTENT_VAR)}}"));
        assert!(display.contains("is not set"));
    }

    #[test]
    fn test_unknown_provider() {
        let root = Value::empty_mapping();
        let ctx = ProviderContext::new("secret", "{{vault.path(x)}}", &root);
        let err = ProviderRegistry::with_builtins()
            .resolve("vault", &args(&[("path", "x")]), &ctx)
            .unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::UnknownProvider {
                name: "vault".into()
            }
        );
    }

    #[test]
    fn test_fn_provider_reads_snapshot_defaults() {
        let mut registry = ProviderRegistry::new();
        registry.register_fn("ssm", |args, ctx| {
            let profile = args
                .get("aws_profile")
                .cloned()
                .or_else(|| ctx.get("aws.profile").and_then(Value::as_str).map(String::from))
                .unwrap_or_default();
            Ok(Value::String(format!("{}@{}", args["path"], profile)))
        });

        let root = mapping! { "aws" => mapping! { "profile" => "dev" } };
        let ctx = ProviderContext::new("db.password", "{{ssm.path(/db)}}", &root);

        let result = registry.resolve("ssm", &args(&[("path", "/db")]), &ctx).unwrap();
        assert_eq!(result, Value::from("/db@dev"));

        let explicit = registry
            .resolve("ssm", &args(&[("path", "/db"), ("aws_profile", "prod")]), &ctx)
            .unwrap();
        assert_eq!(explicit, Value::from("/db@prod"));
    }

    #[test]
    fn test_provider_failure_is_wrapped() {
        let mut registry = ProviderRegistry::new();
        registry.register_fn("s3", |_, _| Err(Error::parse("access denied")));

        let root = Value::empty_mapping();
        let ctx = ProviderContext::new("cert", "{{s3.bucket(b).path(k)}}", &root);
        let err = registry
            .resolve("s3", &args(&[("bucket", "b"), ("path", "k")]), &ctx)
            .unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Provider {
                provider: "s3".into(),
                args: vec![("bucket".into(), "b".into()), ("path".into(), "k".into())],
            }
        );
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_register_with_force() {
        let mut registry = ProviderRegistry::with_builtins();
        let replacement: Arc<dyn Provider> =
            Arc::new(FnProvider::new("env", |_: &ProviderArgs, _: &ProviderContext<'_>| {
                Ok(Value::from("fixed"))
            }));

        let err = registry
            .register_with_force(replacement.clone(), false)
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ProviderAlreadyRegistered { name: "env".into() }
        );

        registry.register_with_force(replacement, true).unwrap();
        let root = Value::empty_mapping();
        let ctx = ProviderContext::new("x", "{{env(ANY)}}", &root);
        assert_eq!(
            registry.resolve("env", &args(&[("env", "ANY")]), &ctx).unwrap(),
            Value::from("fixed")
        );
        assert!(registry.contains("env"));
        assert!(registry.get("ssm").is_none());
    }
}
