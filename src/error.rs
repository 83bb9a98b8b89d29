//! Error types for definition resolution

use thiserror::Error;

/// Errors that can occur while resolving definitions
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No definition source knows the identifier
    #[error("No entry or class found for '{id}'")]
    NotFound { id: String },

    /// Definition is structurally inconsistent (non-instantiable class, alias cycle, ...)
    #[error("Invalid definition for '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },

    /// A required parameter could not be satisfied
    #[error("Parameter '{parameter}' of {callable} has no value defined or guessable (position {position})")]
    Binding {
        parameter: String,
        position: usize,
        callable: String,
    },

    /// Environment variable missing and no default configured
    #[error("The environment variable '{variable}' has not been defined (entry '{id}')")]
    EnvironmentVariable { variable: String, id: String },

    /// Alias points at an identifier nobody can resolve
    #[error("Alias '{alias}' points to '{target}', which cannot be found")]
    AliasTargetMissing { alias: String, target: String },

    /// A cycle that a lazy proxy cannot break
    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// Resolution nested deeper than the configured limit
    #[error("Resolution depth limit of {limit} exceeded while resolving '{id}'")]
    DepthExceeded { limit: usize, id: String },

    /// An argument handed to a constructor/method/factory has the wrong shape
    #[error("Invalid argument at position {position}: {reason}")]
    InvalidArgument { position: usize, reason: String },

    /// A value could not be viewed as the requested Rust type
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// User construction code failed
    #[error("Failed to create '{id}': {reason}")]
    CreationFailed { id: String, reason: String },

    /// Root failure decorated with the identifier chain that led to it
    #[error("{source} (while resolving {})", chain.join(" -> "))]
    Resolution {
        chain: Vec<String>,
        source: Box<DiError>,
    },
}

/// Coarse classification of a [`DiError`], ignoring the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidDefinition,
    Binding,
    EnvironmentVariable,
    AliasTargetMissing,
    CircularDependency,
    DepthExceeded,
    InvalidArgument,
    TypeMismatch,
    CreationFailed,
}

impl DiError {
    /// Create a NotFound error
    #[inline]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an InvalidDefinition error
    #[inline]
    pub fn invalid_definition(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a Binding error
    #[inline]
    pub fn binding(
        parameter: impl Into<String>,
        position: usize,
        callable: impl Into<String>,
    ) -> Self {
        Self::Binding {
            parameter: parameter.into(),
            position,
            callable: callable.into(),
        }
    }

    /// Create an InvalidArgument error
    #[inline]
    pub fn invalid_argument(position: usize, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            position,
            reason: reason.into(),
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// The deepest failure, with any resolution chain stripped
    pub fn root(&self) -> &DiError {
        match self {
            Self::Resolution { source, .. } => source.root(),
            other => other,
        }
    }

    /// Identifier chain recorded when the failure happened (empty if none)
    pub fn chain(&self) -> &[String] {
        match self {
            Self::Resolution { chain, .. } => chain,
            _ => &[],
        }
    }

    /// Classify the root failure
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidDefinition { .. } => ErrorKind::InvalidDefinition,
            Self::Binding { .. } => ErrorKind::Binding,
            Self::EnvironmentVariable { .. } => ErrorKind::EnvironmentVariable,
            Self::AliasTargetMissing { .. } => ErrorKind::AliasTargetMissing,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::CreationFailed { .. } => ErrorKind::CreationFailed,
            // root() never returns a Resolution
            Self::Resolution { source, .. } => source.kind(),
        }
    }

    /// Attach a resolution chain unless one is already recorded
    pub(crate) fn with_chain(self, chain: Vec<String>) -> Self {
        match self {
            already @ Self::Resolution { .. } => already,
            other if chain.is_empty() => other,
            other => Self::Resolution {
                chain,
                source: Box::new(other),
            },
        }
    }

    /// Rebuild the error around a different root, keeping the chain
    pub(crate) fn map_root(self, f: impl FnOnce(DiError) -> DiError) -> Self {
        match self {
            Self::Resolution { chain, source } => Self::Resolution {
                chain,
                source: Box::new((*source).map_root(f)),
            },
            other => f(other),
        }
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, DiError>;
