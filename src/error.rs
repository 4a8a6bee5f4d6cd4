//! Error types for the container and the interception layer.

use std::fmt;

/// Container and interception configuration errors.
///
/// Resolution failures (`NotFound`, `WrongLifetime`, ...) come from the
/// container core. `NotAnInterface` and `Configuration` are configuration
/// errors raised while interception is wired into the construction pipeline;
/// they surface from [`ServiceCollection::try_build`](crate::ServiceCollection::try_build)
/// before any proxy exists.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
///
/// let err = DiError::NotAnInterface("app::Config");
/// assert_eq!(err.to_string(), "Cannot intercept app::Config: only interface (trait object) services can be proxied");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DiError {
    /// Service not registered
    NotFound(&'static str),
    /// Type downcast failed
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g., scoped from root)
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    DepthExceeded(usize),
    /// An interception predicate selected a concrete (non-trait) service type
    NotAnInterface(&'static str),
    /// Any other invalid interception or registration setup
    Configuration(String),
}

impl DiError {
    /// Returns true for errors raised while configuring the container rather
    /// than while resolving from it.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DiError::NotAnInterface(_) | DiError::Configuration(_))
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(name) => write!(f, "Service not found: {}", name),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::Circular(path) => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
            DiError::WrongLifetime(msg) => write!(f, "Lifetime error: {}", msg),
            DiError::DepthExceeded(depth) => write!(f, "Max depth {} exceeded", depth),
            DiError::NotAnInterface(name) => write!(
                f,
                "Cannot intercept {}: only interface (trait object) services can be proxied",
                name
            ),
            DiError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;

/// Misuse of an [`Invocation`](crate::Invocation) by an interceptor.
///
/// Argument and return slots are type-checked so that a proxy can always hand
/// the wrapped method values of the declared types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptError {
    /// Argument index past the end of the argument list
    ArgumentOutOfRange { index: usize, len: usize },
    /// Replacement or lookup used a type other than the declared parameter type
    ArgumentTypeMismatch { index: usize, expected: &'static str },
    /// Return value of a type other than the method's declared return type
    ReturnTypeMismatch { method: &'static str, expected: &'static str },
}

impl fmt::Display for InterceptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterceptError::ArgumentOutOfRange { index, len } => {
                write!(f, "Argument index {} out of range ({} arguments)", index, len)
            }
            InterceptError::ArgumentTypeMismatch { index, expected } => {
                write!(f, "Argument {} expects a value of type {}", index, expected)
            }
            InterceptError::ReturnTypeMismatch { method, expected } => {
                write!(f, "{} returns {}", method, expected)
            }
        }
    }
}

impl std::error::Error for InterceptError {}
