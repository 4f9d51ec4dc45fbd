//! Error types for package graph construction.
//!
//! `GraphError` covers every way [`Packages::build`](crate::graph::Packages::build)
//! and the checked accessors can fail. Errors carry enough context (package
//! id, symbol name, patterns) to produce a useful message on their own.
//!
//! Any error reported by the front end for any package in the closure is
//! fatal: construction stops and nothing is returned.

use thiserror::Error;

use crate::frontend::FrontendError;

/// Errors from building or querying a package graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The front end could not load the patterns at all.
    #[error("load {patterns:?}: {source}")]
    Load {
        patterns: Vec<String>,
        #[source]
        source: FrontendError,
    },

    /// A package in the closure was loaded with errors.
    #[error("package {id} has errors: {}", errors.join("; "))]
    PackageErrors { id: String, errors: Vec<String> },

    /// A declared import was not delivered by the front end.
    #[error("package {package} imports {import}, which was not loaded")]
    MissingImport { package: String, import: String },

    /// A declaring identifier has no resolved symbol, or one of the wrong kind.
    #[error("{package}: no {expected} symbol for identifier {name}")]
    UnresolvedSymbol {
        package: String,
        name: String,
        expected: &'static str,
    },

    /// The front end could not evaluate an expression.
    #[error("{package}: cannot evaluate {expr:?}: {source}")]
    Eval {
        package: String,
        expr: String,
        #[source]
        source: FrontendError,
    },

    /// A checked lookup found nothing.
    #[error("{package}: {kind} {name} not found")]
    NotFound {
        package: String,
        kind: &'static str,
        name: String,
    },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub(crate) fn not_found(
        package: impl Into<String>,
        kind: &'static str,
        name: impl Into<String>,
    ) -> Self {
        GraphError::NotFound {
            package: package.into(),
            kind,
            name: name.into(),
        }
    }

    /// Whether the error came from a checked lookup rather than construction.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_errors_join_messages() {
        let err = GraphError::PackageErrors {
            id: "example.com/m/a".into(),
            errors: vec!["a.go:1:1: expected package".into(), "undefined: x".into()],
        };
        assert_eq!(
            err.to_string(),
            "package example.com/m/a has errors: a.go:1:1: expected package; undefined: x"
        );
    }

    #[test]
    fn load_error_keeps_source() {
        use std::error::Error as _;

        let err = GraphError::Load {
            patterns: vec!["./...".into()],
            source: FrontendError::other("go list failed"),
        };
        assert!(err.to_string().contains("go list failed"));
        assert!(err.source().is_some());
    }

    #[test]
    fn not_found_is_flagged() {
        let err = GraphError::not_found("m/a", "constant", "Missing");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "m/a: constant Missing not found");
        let other = GraphError::MissingImport {
            package: "m/a".into(),
            import: "m/b".into(),
        };
        assert!(!other.is_not_found());
    }
}
