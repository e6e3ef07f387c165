//! Error types for the resolution engine.

use std::sync::Arc;

use crate::behavior::Behavior;
use crate::key::Key;

/// Resolution engine errors
///
/// Construction-time variants (`Circular`, `IncompatibleBehavior`,
/// `UnresolvedInheritance`, `MissingDependency`, `MissingMetadata`,
/// `ArityMismatch`) prevent a provider from being produced at all. Runtime
/// variants are reported to whichever call triggered the resolution and are
/// never retried by the engine.
///
/// The type is `Clone` because one build result is delivered to every waiter
/// collapsed onto the same pending key.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{DiError, ErrorKind, Key, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build().unwrap();
/// match provider.get::<String>(&Key::name("missing")) {
///     Err(err @ DiError::NotFound(_)) => {
///         assert_eq!(err.kind(), ErrorKind::NotFound);
///         assert_eq!(err.to_string(), "service not found: name:missing");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// Key not registered with the provider
    #[error("service not found: {0}")]
    NotFound(Key),
    /// A descriptor depends on a key nobody registered
    #[error("{service} depends on unregistered service {dependency}")]
    MissingDependency { service: Key, dependency: Key },
    /// Circular dependency detected (path starts and ends with `key`)
    #[error("circular dependency on {key}: {}", join_path(.path))]
    Circular { key: Key, path: Vec<Key> },
    /// A long-lived service depends on a shorter-lived one
    #[error("{service_behavior} {service} cannot depend on {dependency_behavior} {dependency}")]
    IncompatibleBehavior {
        service: Key,
        service_behavior: Behavior,
        dependency: Key,
        dependency_behavior: Behavior,
    },
    /// An inherited behavior survived propagation
    #[error("{service} depends on {dependency} whose behavior is still inherited")]
    UnresolvedInheritance { service: Key, dependency: Key },
    /// Type-based descriptor without recorded parameter metadata
    #[error("missing metadata for {0}")]
    MissingMetadata(&'static str),
    /// The build function needs more parameters than dependencies were declared
    #[error("{key} requires {required} dependencies but {declared} were declared")]
    ArityMismatch {
        key: Key,
        required: usize,
        declared: usize,
    },
    /// Resolving a scoped service on a provider without a scope
    #[error("scope is not defined while resolving {0}")]
    ScopeNotDefined(Key),
    /// Creating a scope on a provider that already has one
    #[error("scope is already defined on this provider")]
    ScopeAlreadyDefined,
    /// Destroying a scope that was never created
    #[error("scope was never created on this provider")]
    ScopeNotCreated,
    /// Downcast of a resolved value failed
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: Key, expected: &'static str },
    /// The build function reported an error
    #[error("failed to build {key}: {reason}")]
    Build { key: Key, reason: Arc<anyhow::Error> },
    /// The build function dropped its completion without completing
    #[error("build of {0} was abandoned before completion")]
    Abandoned(Key),
    /// A synchronous getter was used on a value that completes later
    #[error("{0} did not complete synchronously")]
    Pending(Key),
    /// Engine configuration could not be loaded
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The nameable error taxonomy of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CircularDependency,
    BehaviorIncompatibility,
    MissingMetadata,
    ScopeMisuse,
    Descriptor,
    Resolution,
    Configuration,
}

impl DiError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiError::NotFound(_) | DiError::MissingDependency { .. } => ErrorKind::NotFound,
            DiError::Circular { .. } => ErrorKind::CircularDependency,
            DiError::IncompatibleBehavior { .. } | DiError::UnresolvedInheritance { .. } => {
                ErrorKind::BehaviorIncompatibility
            }
            DiError::MissingMetadata(_) => ErrorKind::MissingMetadata,
            DiError::ScopeNotDefined(_) | DiError::ScopeAlreadyDefined | DiError::ScopeNotCreated => {
                ErrorKind::ScopeMisuse
            }
            DiError::ArityMismatch { .. } => ErrorKind::Descriptor,
            DiError::TypeMismatch { .. }
            | DiError::Build { .. }
            | DiError::Abandoned(_)
            | DiError::Pending(_) => ErrorKind::Resolution,
            DiError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Wraps a build function failure.
    pub fn build(key: Key, reason: anyhow::Error) -> Self {
        DiError::Build {
            key,
            reason: Arc::new(reason),
        }
    }
}

fn join_path(path: &[Key]) -> String {
    path.iter().map(Key::to_string).collect::<Vec<_>>().join(" -> ")
}

/// Result type for resolution engine operations
pub type DiResult<T> = Result<T, DiError>;
