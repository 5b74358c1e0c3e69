//! Generic dispatch handler shared by every inbound HTTP verb.

use crate::http::{RpcRequest, RpcResponse, StatusCode};
use crate::rpc::envelope::Envelope;
use crate::rpc::error::RpcError;
use crate::rpc::registry::FunctionRegistry;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Header carrying `<Class>.<method>`.
pub const FUNCTION_HEADER: &str = "X-Servell-Function";
/// Header carrying the JSON argument array, or [`BODY_SENTINEL`].
pub const ARGS_HEADER: &str = "X-Servell-Args";
/// Value of [`ARGS_HEADER`] meaning the arguments are in the request body.
pub const BODY_SENTINEL: &str = "body";

/// Resolves routing headers against the registry and invokes the target.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Arc<FunctionRegistry> {
        self.registry.clone()
    }

    /// Dispatch one request.
    ///
    /// Malformed routing headers or arguments are returned as
    /// [`RpcError::Request`]. Everything else, including unknown targets and
    /// failing methods, is answered with an envelope response.
    pub async fn dispatch(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        let (target, args_header) = match (
            request.get_header(FUNCTION_HEADER),
            request.get_header(ARGS_HEADER),
        ) {
            (Some(target), Some(args)) => (target, args),
            _ => {
                return Err(RpcError::request(format!(
                    "Required headers '{}' or '{}' missing from the request",
                    FUNCTION_HEADER, ARGS_HEADER
                )))
            }
        };

        let (class, method) = split_function(target)?;
        let args = decode_args(args_header, &request)?;
        let path = request.path();

        debug!("Dispatching {}.{} at '{}' ({} arg(s))", class, method, path, args.len());

        let Some(function) = self.registry.lookup(path, class, method).await else {
            let envelope = Envelope::error(format!(
                "Function '{}.{}' is not registered at '{}'",
                class, method, path
            ));
            return Ok(respond(envelope)?.with_status(StatusCode::NOT_FOUND));
        };

        respond(function.invoke(args).await)
    }

    /// Entry point for GET.
    pub async fn get_handler(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        self.dispatch(request).await
    }

    /// Entry point for POST.
    pub async fn post_handler(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        self.dispatch(request).await
    }

    /// Entry point for PUT.
    pub async fn put_handler(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        self.dispatch(request).await
    }

    /// Entry point for PATCH.
    pub async fn patch_handler(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        self.dispatch(request).await
    }

    /// Entry point for DELETE.
    pub async fn delete_handler(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        self.dispatch(request).await
    }
}

fn respond(envelope: Envelope) -> Result<RpcResponse, RpcError> {
    envelope
        .into_response()
        .map_err(|e| RpcError::configuration(format!("failed to encode envelope: {}", e)))
}

/// Split `<Class>.<method>` on the first dot.
pub fn split_function(header: &str) -> Result<(&str, &str), RpcError> {
    match header.split_once('.') {
        Some((class, method)) if !class.is_empty() && !method.is_empty() => Ok((class, method)),
        _ => Err(RpcError::request(format!(
            "The value of the '{}' header is invalid",
            FUNCTION_HEADER
        ))),
    }
}

/// Decode the argument array from the header, or from the body under the sentinel.
pub fn decode_args(header: &str, request: &RpcRequest) -> Result<Vec<Value>, RpcError> {
    let value: Value = if header == BODY_SENTINEL {
        match request.json::<Value>() {
            Some(parsed) => parsed?,
            None => {
                return Err(RpcError::request(format!(
                    "'{}' is '{}' but the request has no body",
                    ARGS_HEADER, BODY_SENTINEL
                )))
            }
        }
    } else {
        serde_json::from_str(header)?
    };

    match value {
        Value::Array(args) => Ok(args),
        _ => Err(RpcError::request("Arguments must be a JSON array")),
    }
}
