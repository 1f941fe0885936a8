//! End-to-end processing of one hierarchy path
//!
//! walk → merge → resolve → filter → enclosing key → escape cleaning

use std::path::Path;

use crate::error::Result;
use crate::filter::{self, OutputFilter};
use crate::interpolation::clean_escapes;
use crate::loader::Loader;
use crate::merge::{merge, MergePolicy};
use crate::provider::ProviderRegistry;
use crate::resolver::{ResolveOptions, Resolver};
use crate::value::Value;
use crate::walker::discover_layers;

/// Options for [`process`]
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub policy: MergePolicy,
    /// Keep unresolved placeholders instead of failing
    pub skip_validation: bool,
    /// Only check placeholder syntax; the merged tree is returned unresolved
    pub skip_resolving: bool,
    /// Leave provider calls in place
    pub skip_providers: bool,
    pub filter: OutputFilter,
    /// Wrap the output under this key
    pub enclosing_key: Option<String>,
    /// Replace the output with the value under this key
    pub remove_enclosing_key: Option<String>,
}

impl ProcessOptions {
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    pub fn with_skip_resolving(mut self, skip: bool) -> Self {
        self.skip_resolving = skip;
        self
    }

    pub fn with_skip_providers(mut self, skip: bool) -> Self {
        self.skip_providers = skip;
        self
    }

    pub fn with_filter(mut self, filter: OutputFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_enclosing_key(mut self, key: impl Into<String>) -> Self {
        self.enclosing_key = Some(key.into());
        self
    }

    pub fn with_remove_enclosing_key(mut self, key: impl Into<String>) -> Self {
        self.remove_enclosing_key = Some(key.into());
        self
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
            .with_skip_validation(self.skip_validation)
            .with_skip_providers(self.skip_providers)
    }
}

/// Processing options plus the providers placeholders may call
#[derive(Debug, Clone, Default)]
pub struct Processor {
    options: ProcessOptions,
    registry: ProviderRegistry,
}

impl Processor {
    /// A processor using the built-in providers
    pub fn new(options: ProcessOptions) -> Self {
        Self {
            options,
            registry: ProviderRegistry::with_builtins(),
        }
    }

    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Merge every layer from `root` down to `leaf` and post-process the result
    pub fn process(&self, root: &Path, leaf: &Path) -> Result<Value> {
        let options = &self.options;
        let loader = Loader::new(root);

        let layers = discover_layers(root, leaf, &loader, &options.policy)?;
        log::debug!("Merging {} layer(s)", layers.len());
        let merged = merge(layers.iter().map(|layer| &layer.value), &options.policy)?;

        let resolved = if options.skip_resolving {
            let placeholders = Resolver::validate(&merged)?;
            log::debug!("Skipping resolution of {} placeholder(s)", placeholders.len());
            merged
        } else {
            Resolver::new(&self.registry)
                .with_options(options.resolve_options())
                .resolve(&merged)?
        };

        let mut output = options.filter.apply(&resolved);
        if let Some(key) = &options.enclosing_key {
            output = filter::add_enclosing_key(output, key);
        }
        if let Some(key) = &options.remove_enclosing_key {
            output = filter::remove_enclosing_key(&output, key)?;
        }

        Ok(output.map_strings(&mut |s: &str| clean_escapes(s)))
    }
}

/// Process `leaf` within the hierarchy at `root` using the built-in providers
///
/// ```no_run
/// use std::path::Path;
/// use strata_core::{process, ProcessOptions};
///
/// let config = process(
///     Path::new("configs"),
///     Path::new("env=prod/region=us-east-1"),
///     &ProcessOptions::default(),
/// )?;
/// println!("{}", config.to_yaml_string()?);
/// # Ok::<(), strata_core::Error>(())
/// ```
pub fn process(root: &Path, leaf: &Path, options: &ProcessOptions) -> Result<Value> {
    Processor::new(options.clone()).process(root, leaf)
}
