//! Error types for routing and dispatch.

use thiserror::Error;

/// Router-specific errors.
///
/// A request that matches no route is not an error; lookups return `None`
/// and the dispatcher answers with a 404.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A handler tried to write a response after one was already sent.
    #[error("response already sent")]
    ResponseAlreadySent,

    /// A route pattern could not be registered.
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// The HTTP method string is not one of the supported verbs.
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),

    /// No service is registered under this name.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// A service exists under this name but has a different type.
    #[error("service {0} is not of the requested type")]
    ServiceTypeMismatch(String),

    /// A required path parameter is absent.
    #[error("missing path parameter: {0}")]
    MissingParam(String),

    /// The request carried no body to decode.
    #[error("request body is empty")]
    EmptyBody,

    /// The request body could not be decoded as JSON.
    #[error("failed to decode request body: {0}")]
    BodyDecode(#[source] serde_json::Error),

    /// A response value could not be encoded as JSON.
    #[error("failed to encode response body: {0}")]
    Encode(#[source] serde_json::Error),

    /// Route name not found.
    #[error("route not found: {0}")]
    RouteNotFound(String),
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
