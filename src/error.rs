//! Error types for the dependency injection container.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by user code (factories, constructors, disposers).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Dependency injection errors
///
/// Covers the three phases a service request goes through: registration,
/// call-site construction (missing services, cycles, captive dependencies) and
/// production (errors raised by user constructors and factories).
///
/// # Examples
///
/// ```rust
/// use aspect_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use aspect_di::DiError;
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(
///     circular.to_string(),
///     "Circular dependency: ServiceA -> ServiceB -> ServiceA"
/// );
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// No declared constructor could be satisfied and there is no default activation
    #[error(
        "No viable constructor for {implementation}: unable to resolve {}",
        .missing.join(", ")
    )]
    NoViableConstructor {
        implementation: &'static str,
        missing: Vec<&'static str>,
    },
    /// A singleton transitively depends on a scoped service
    #[error("Cannot consume scoped service {scoped} from singleton {singleton}")]
    ScopedFromSingleton {
        scoped: &'static str,
        singleton: &'static str,
    },
    /// A scoped service (or something requiring one) was resolved from the root scope
    #[error("{}", scoped_from_root_message(.service, .scoped))]
    ScopedFromRoot {
        service: &'static str,
        scoped: &'static str,
    },
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Invalid registration or collection operation
    #[error("Invalid registration: {0}")]
    Registration(String),
    /// Invalid provider configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The scope or provider has been disposed
    #[error("Cannot resolve services from a disposed scope")]
    Disposed,
    /// Error raised by a user constructor or factory, surfaced unchanged
    #[error(transparent)]
    Failed(Arc<dyn StdError + Send + Sync>),
}

fn scoped_from_root_message(service: &str, scoped: &str) -> String {
    if service == scoped {
        format!("Cannot resolve scoped service {} from root provider", service)
    } else {
        format!(
            "Cannot resolve {} from root provider because it requires scoped service {}",
            service, scoped
        )
    }
}

impl DiError {
    /// Wraps an error produced by user code.
    ///
    /// ```rust
    /// use aspect_di::DiError;
    ///
    /// let err = DiError::failed("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn failed(err: impl Into<BoxError>) -> Self {
        DiError::Failed(Arc::from(err.into()))
    }

    /// Returns the user error carried by [`DiError::Failed`], if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            DiError::Failed(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

/// Failures collected while disposing a scope.
///
/// Every captured disposable is attempted even when earlier ones fail; the
/// failures are reported together, in disposal order.
#[derive(Debug, Error)]
#[error("{} disposable(s) failed during disposal", .failures.len())]
pub struct DisposeError {
    pub failures: Vec<BoxError>,
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout aspect-di.
///
/// ```rust
/// use aspect_di::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::NotFound("some_service"))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
