//! Failure taxonomy for registration and resolution.

use std::sync::Arc;
use thiserror::Error;

/// Error type returned by user construction code.
///
/// The engine wraps the first such error into
/// [ResolutionError::Construction]; deeper resolution failures are already
/// [ResolutionError] values and pass through untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by registration, declaration and resolution.
///
/// Cloneable so that one failed construction can be observed by every caller
/// attached to the same in-flight future; the underlying cause is shared
/// behind an [Arc].
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// The token already has a registry entry.
    #[error("token `{0}` is already registered")]
    DuplicateRegistration(String),

    /// The token has no registry entry.
    #[error("no construction unit registered for token `{0}`")]
    MissingDependency(String),

    /// The unit was used in a construction position without a recipe.
    #[error("`{0}` has no recipe and cannot be resolved")]
    Undeclared(String),

    /// The request is none of the recognized shapes.
    #[error("request is not a token, construction unit, list or map")]
    UnresolvableRequest,

    /// A unit's identity repeats on its own ancestor path.
    ///
    /// The chain runs from the root request down to the repeated identity,
    /// which appears twice.
    #[error("circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// User construction code failed.
    ///
    /// The chain names every ancestor from the root request down to the
    /// failing unit. Nested construction failures are never re-wrapped, so
    /// exactly one of these carries the original cause.
    #[error("construction of `{}` failed: {}", .chain.join(" -> "), .cause)]
    Construction {
        chain: Vec<String>,
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A recipe was attached to a unit that already has one.
    #[error("`{0}` already has a recipe")]
    AlreadyDeclared(String),

    /// The resolved value is not of the type the token promises.
    #[error("value resolved for token `{0}` is not of the requested type")]
    TypeMismatch(String),
}
