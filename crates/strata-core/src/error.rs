//! Error types for strata
//!
//! Every stage reports through one structured error carrying the config path,
//! the source file when known, the underlying cause and an actionable hint.

use std::fmt;

/// Result type alias for strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for strata operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the config where the error occurred (e.g., "database.port")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed document or placeholder syntax
    #[error("Parse error")]
    Parse,
    /// Filesystem access failed
    #[error("I/O error")]
    Io,
    /// Root/leaf relationship is invalid or the hierarchy is empty
    #[error("Invalid hierarchy path")]
    Path,
    /// A key path does not exist in a tree
    #[error("Path not found")]
    PathNotFound,
    /// Every configured merge strategy declined
    #[error("No merge strategy applies ({base} vs {next})")]
    MergeType { base: String, next: String },
    /// Placeholders left over after the resolver stopped making progress
    #[error("Unresolved references: {}", .0.join(", "))]
    UnresolvedReference(Vec<String>),
    /// A placeholder depends on itself
    #[error("Circular reference detected")]
    CircularReference,
    /// No provider registered for a placeholder kind
    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },
    /// A provider call failed
    #[error("Provider '{provider}' failed for ({})", join_args(.args))]
    Provider {
        provider: String,
        args: Vec<(String, String)>,
    },
    /// A value cannot be used where it was placed
    #[error("Type coercion failed")]
    TypeCoercion,
    /// A provider name is already taken in a registry
    #[error("Provider already registered: {name}")]
    ProviderAlreadyRegistered { name: String },
}

fn join_args(args: &[(String, String)]) -> String {
    args.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Parse)
        }
    }

    /// Create an I/O error for a file or directory
    pub fn io(target: impl fmt::Display, err: &std::io::Error) -> Self {
        Self {
            cause: Some(format!("{}: {}", target, err)),
            ..Self::from_kind(ErrorKind::Io)
        }
    }

    /// Create a hierarchy path error
    pub fn path(message: impl Into<String>) -> Self {
        Self {
            help: Some("The leaf path must exist and live inside the root directory".into()),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Path)
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            help: Some(format!(
                "Check that '{}' exists in the configuration",
                path_str
            )),
            path: Some(path_str),
            ..Self::from_kind(ErrorKind::PathNotFound)
        }
    }

    /// Create a merge type error
    pub fn merge_type(
        path: impl Into<String>,
        base: impl Into<String>,
        next: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(
                "Add a fallback strategy (e.g. override) to the merge policy for this type".into(),
            ),
            ..Self::from_kind(ErrorKind::MergeType {
                base: base.into(),
                next: next.into(),
            })
        }
    }

    /// Create an unresolved reference error listing every pending placeholder
    pub fn unresolved(pending: Vec<String>) -> Self {
        Self {
            help: Some(
                "Check the referenced keys exist, or pass --skip-interpolation-validation".into(),
            ),
            ..Self::from_kind(ErrorKind::UnresolvedReference(pending))
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(path: impl Into<String>, chain: Vec<String>) -> Self {
        let chain_str = chain.join(" → ");
        Self {
            path: Some(path.into()),
            help: Some("Break the circular dependency by removing one of the references".into()),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::from_kind(ErrorKind::CircularReference)
        }
    }

    /// Create an unknown provider error
    pub fn unknown_provider(name: impl Into<String>, config_path: Option<String>) -> Self {
        let n = name.into();
        Self {
            path: config_path,
            help: Some(format!("Register the '{}' provider or check for typos", n)),
            ..Self::from_kind(ErrorKind::UnknownProvider { name: n })
        }
    }

    /// Create a provider failure error
    pub fn provider(
        provider: impl Into<String>,
        args: &indexmap::IndexMap<String, String>,
        message: impl Into<String>,
    ) -> Self {
        let provider_name = provider.into();
        Self {
            help: Some(format!(
                "Check the '{}' provider arguments and credentials",
                provider_name
            )),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Provider {
                provider: provider_name,
                args: args
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
        }
    }

    /// Create an error for a duplicate provider registration
    pub fn provider_already_registered(name: impl Into<String>) -> Self {
        Self {
            help: Some("Register with force to replace the existing provider".into()),
            ..Self::from_kind(ErrorKind::ProviderAlreadyRegistered { name: name.into() })
        }
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
            ..Self::from_kind(ErrorKind::TypeCoercion)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add or replace the cause
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl SourceLocation {
    /// Location naming only a file
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_circular_reference_error_display() {
        let err = Error::circular_reference(
            "a",
            vec!["a: {{b}}".into(), "b: {{a}}".into(), "a: {{b}}".into()],
        );
        let display = format!("{}", err);

        assert!(display.contains("Circular reference detected"));
        assert!(display.contains("a: {{b}} → b: {{a}} → a: {{b}}"));
    }

    #[test]
    fn test_path_not_found_error() {
        let err = Error::path_not_found("database.host");

        assert_eq!(err.kind, ErrorKind::PathNotFound);
        assert_eq!(err.path, Some("database.host".into()));
    }

    #[test]
    fn test_unresolved_lists_every_placeholder() {
        let err = Error::unresolved(vec!["a: {{missing.key}}".into(), "b: {{other}}".into()]);
        let display = format!("{}", err);

        assert!(display.contains("Unresolved references: a: {{missing.key}}, b: {{other}}"));
        assert!(display.contains("Help:"));
    }

    #[test]
    fn test_unknown_provider_error() {
        let err = Error::unknown_provider("vault", Some("db.password".into()));
        let display = format!("{}", err);

        assert!(display.contains("Unknown provider: vault"));
        assert!(display.contains("Path: db.password"));
        assert!(display.contains("Register the 'vault' provider"));
    }

    #[test]
    fn test_provider_error_carries_args() {
        let mut args = IndexMap::new();
        args.insert("path".to_string(), "/app/db".to_string());
        args.insert("aws_profile".to_string(), "prod".to_string());
        let err = Error::provider("ssm", &args, "access denied").with_path("db.password");
        let display = format!("{}", err);

        assert!(display.contains("Provider 'ssm' failed for (path=/app/db, aws_profile=prod)"));
        assert!(display.contains("access denied"));
        assert!(matches!(err.kind, ErrorKind::Provider { ref provider, .. } if provider == "ssm"));
    }

    #[test]
    fn test_merge_type_error() {
        let err = Error::merge_type("deep.list", "sequence", "sequence");
        let display = format!("{}", err);

        assert!(display.contains("No merge strategy applies (sequence vs sequence)"));
        assert!(display.contains("Path: deep.list"));
    }

    #[test]
    fn test_with_source_location() {
        let err = Error::parse("syntax error").with_source_location(SourceLocation {
            file: "config.yaml".into(),
            line: Some(42),
            column: None,
        });
        let display = format!("{}", err);

        assert!(display.contains("config.yaml:42"));
    }

    #[test]
    fn test_with_help() {
        let err = Error::parse("bad input").with_help("Try fixing the syntax");
        let display = format!("{}", err);

        assert!(display.contains("Help: Try fixing the syntax"));
    }

    #[test]
    fn test_type_coercion_error() {
        let err = Error::type_coercion("role", "scalar", "mapping");
        let display = format!("{}", err);

        assert!(display.contains("Type coercion failed"));
        assert!(display.contains("Path: role"));
        assert!(display.contains("Got: mapping"));
    }

    #[test]
    fn test_path_error_has_help() {
        let err = Error::path("'/etc' is not inside '/srv/configs'");
        assert_eq!(err.kind, ErrorKind::Path);
        assert!(err.to_string().contains("Invalid hierarchy path"));
        assert!(err.help.is_some());
    }
}
