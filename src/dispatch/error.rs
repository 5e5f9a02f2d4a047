//! Dispatch-time error definitions.

use axum::http::StatusCode;
use thiserror::Error;

use crate::dispatch::resolver::ResolveError;

/// Errors raised after a route matched: resolving, binding or running it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Controller or middleware could not be constructed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The route names an action its controller does not expose.
    #[error("controller `{controller}` has no action `{action}`")]
    UnknownAction { controller: String, action: String },

    /// A path variable could not be bound to an action parameter.
    #[error("invalid parameter `{name}`: {reason}")]
    BadParameter { name: String, reason: String },

    /// The controller action or a middleware stage failed.
    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    pub fn handler<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        DispatchError::Handler(error.into())
    }

    /// Parameter binding failures are the client's fault; the rest are ours.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::BadParameter { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
