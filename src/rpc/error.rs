//! Error types for the RPC bridge.

use crate::http::{RpcResponse, StatusCode};

/// A failure raised by a method body.
///
/// Renders the way a thrown error stringifies on the wire: `"<name>: <message>"`,
/// with the name defaulting to `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    name: String,
    message: String,
}

impl Failure {
    /// Create a failure named `Error`.
    pub fn new(message: impl Into<String>) -> Self {
        Self::named("Error", message)
    }

    /// Create a failure with a specific error name, e.g. `TypeError`.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Error name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl std::error::Error for Failure {}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::new(message)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::new(message)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::named("TypeError", err.to_string())
    }
}

/// Errors surfaced by augmentation, dispatch and the client transports.
///
/// Execution failures on the server never show up here: they are folded into
/// an error envelope by the server response wrapper.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Bad setup, e.g. an empty endpoint.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed routing headers or arguments on an inbound request.
    #[error("{0}")]
    Request(String),

    /// A method name the augmented class does not have.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The HTTP call from the client side failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A client-side or untouched method body failed.
    #[error("{0}")]
    Method(Failure),
}

impl RpcError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        RpcError::Configuration(message.into())
    }

    /// Create a request error.
    pub fn request(message: impl Into<String>) -> Self {
        RpcError::Request(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        RpcError::Transport(message.into())
    }

    /// HTTP status a host should answer with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Request(_) => StatusCode::BAD_REQUEST,
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::Transport(_) => StatusCode::BAD_GATEWAY,
            RpcError::Configuration(_) | RpcError::Method(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RpcError> for RpcResponse {
    fn from(err: RpcError) -> Self {
        RpcResponse::error(err.status(), err.to_string())
    }
}

impl From<Failure> for RpcError {
    fn from(failure: Failure) -> Self {
        RpcError::Method(failure)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Request(err.to_string())
    }
}

impl From<hyper::Error> for RpcError {
    fn from(err: hyper::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

impl From<hyper_util::client::legacy::Error> for RpcError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}
