//! strata-core: hierarchical configuration merging
//!
//! Configuration lives in a directory hierarchy such as
//! `env=prod/region=us-east-1/cluster=web`. Every directory from the root to
//! a leaf contributes a layer; layers are deep-merged root first, then
//! `{{...}}` placeholders are resolved against the merged tree and against
//! registered value providers.
//!
//! # Example
//!
//! ```rust
//! use strata_core::{merge, MergePolicy, ProviderRegistry, Resolver, Value};
//!
//! let base: Value = serde_yaml::from_str("account: { id: '123456' }\nlist: [a]").unwrap();
//! let next: Value = serde_yaml::from_str("role: 'arn:{{account.id}}'\nlist: [b]").unwrap();
//!
//! let merged = merge([&base, &next], &MergePolicy::default()).unwrap();
//! let registry = ProviderRegistry::with_builtins();
//! let resolved = Resolver::new(&registry).resolve(&merged).unwrap();
//!
//! assert_eq!(resolved.get_path("role").unwrap().as_str(), Some("arn:123456"));
//! assert_eq!(resolved.get_path("list").unwrap().as_sequence().unwrap().len(), 2);
//! ```

pub mod batch;
pub mod error;
pub mod filter;
pub mod interpolation;
pub mod loader;
pub mod merge;
pub mod processor;
pub mod provider;
pub mod resolver;
pub mod value;
pub mod walker;

pub use batch::{find_leaf_directories, generate, GenerateOptions};
pub use error::{Error, ErrorKind, Result};
pub use filter::{FilterRules, OutputFilter};
pub use loader::Loader;
pub use merge::{merge, merge_two, MergeById, MergePolicy, MergeStrategy, Strategy};
pub use processor::{process, ProcessOptions, Processor};
pub use provider::{Provider, ProviderArgs, ProviderContext, ProviderRegistry};
pub use resolver::{ResolveOptions, Resolver};
pub use value::{TypeTag, Value};
pub use walker::{discover_layers, Layer};
