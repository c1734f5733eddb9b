//! Error types for the resolver

use thiserror::Error;

/// The universal error type user functions may return.
///
/// A constructor or entry point signals failure by returning
/// `Result<_, E>` for any `E` convertible into this type; the resolver
/// consumes the error instead of treating it as a provided value.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while assembling or running the graph
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A constructor was registered that provides no value
    #[error("unsupported provide target: {0} has no non-error output")]
    UnsupportedProvideTarget(String),

    /// An entry point was registered that returns a value
    #[error("unsupported invoke target: {0} returns a value")]
    UnsupportedInvokeTarget(String),

    /// A logger target was registered that cannot produce a logger
    #[error("unsupported logger provider: {0}")]
    UnsupportedLoggerProvider(String),

    /// Two producers match the same input type
    #[error("multiple provide of type {type_name}\nfirst usage:  {first}\nsecond usage: {second}")]
    MultipleProvide {
        type_name: &'static str,
        first: String,
        second: String,
    },

    /// No producer matches an input type
    #[error("cannot provide value of type {type_name} for {consumer}")]
    CannotProvideValue {
        type_name: &'static str,
        consumer: String,
    },

    /// The demand graph loops back on itself
    #[error("cyclic provide detected: {}", .path.join(" -> "))]
    CyclicProvideDetected { path: Vec<String> },

    /// The cancellation token was triggered
    #[error("resolve cancelled")]
    Cancelled,

    /// An error returned by a user function, propagated unwrapped
    #[error(transparent)]
    User(BoxError),

    /// Impossible state reached (defensive; should never fire)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// The user function error carried by this result, if any.
    ///
    /// Entry points and constructors fail with their own error types;
    /// use this to get at the boxed value for downcasting.
    #[inline]
    pub fn user_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::User(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// True when the resolve was aborted by its cancellation token.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for resolver operations
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
