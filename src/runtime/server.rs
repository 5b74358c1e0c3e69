//! RPC host HTTP server.

use crate::http::{RpcRequest, RpcResponse, StatusCode, Verb};
use crate::rpc::{Dispatcher, FunctionRegistry};
use crate::runtime::ServerConfig;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// RPC host server.
///
/// Every path other than the system endpoints goes to the dispatcher, which
/// resolves it against the registry. Classes must be augmented before
/// [`RpcServer::run`] is called.
pub struct RpcServer {
    /// Server configuration.
    config: ServerConfig,
    /// Dispatcher over the registry.
    dispatcher: Dispatcher,
}

impl RpcServer {
    /// Create a new server over `registry`.
    pub fn new(config: ServerConfig, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(registry),
        }
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Bind to the configured address and serve.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("RPC server listening on {}", listener.local_addr()?);

        let dispatcher = self.dispatcher.clone();
        let config = self.config.clone();

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);

            let dispatcher = dispatcher.clone();
            let config = config.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = dispatcher.clone();
                    let config = config.clone();
                    async move { handle_request(req, dispatcher, config, remote_addr).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Dispatcher,
    config: ServerConfig,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let request_id = generate_request_id();

    debug!(
        "Handling request: {} {} from {} [{}]",
        method, path, remote_addr, request_id
    );

    if config.enable_health && path == "/_health" {
        return Ok(build_response(RpcResponse::text("OK")));
    }

    if config.enable_listing && path == "/_functions" {
        let namespaces = dispatcher.registry().list().await;
        let listing = serde_json::json!({
            "namespaces": namespaces.iter().map(|(key, methods)| {
                serde_json::json!({
                    "endpoint": key.endpoint(),
                    "class": key.class(),
                    "methods": methods,
                })
            }).collect::<Vec<_>>()
        });
        return Ok(build_response(
            RpcResponse::json(&listing).unwrap_or_else(|_| RpcResponse::text("{}")),
        ));
    }

    let Some(verb) = Verb::from_hyper(&method) else {
        return Ok(build_response(RpcResponse::error(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {} is not supported", method),
        )));
    };

    let rpc_request = match convert_request(req, verb, &config).await {
        Ok(req) => req,
        Err(e) => {
            warn!("Failed to convert request: {} [{}]", e, request_id);
            return Ok(build_response(RpcResponse::error(
                StatusCode::BAD_REQUEST,
                e.to_string(),
            )));
        }
    };

    let result = match verb {
        Verb::Get => dispatcher.get_handler(rpc_request).await,
        Verb::Post => dispatcher.post_handler(rpc_request).await,
        Verb::Put => dispatcher.put_handler(rpc_request).await,
        Verb::Patch => dispatcher.patch_handler(rpc_request).await,
        Verb::Delete => dispatcher.delete_handler(rpc_request).await,
    };

    match result {
        Ok(response) => Ok(build_response(response)),
        Err(e) => {
            warn!("Rejected request {} {}: {} [{}]", method, path, e, request_id);
            Ok(build_response(e.into()))
        }
    }
}

/// Convert a hyper Request to RpcRequest.
///
/// The body is read through a [`Limited`] wrapper so an oversized request is
/// rejected before it is buffered.
async fn convert_request(
    req: Request<Incoming>,
    verb: Verb,
    config: &ServerConfig,
) -> Result<RpcRequest, Box<dyn std::error::Error + Send + Sync>> {
    let (parts, body) = req.into_parts();
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        headers.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }

    let body_bytes = match Limited::new(body, config.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Err(format!(
                "Request body exceeds the limit of {} bytes",
                config.max_body_size
            )
            .into())
        }
        Err(e) => return Err(e),
    };

    Ok(RpcRequest {
        method: verb,
        url,
        headers,
        body: if body_bytes.is_empty() { None } else { Some(body_bytes) },
    })
}

/// Build a hyper Response from RpcResponse.
fn build_response(rpc_response: RpcResponse) -> Response<Full<Bytes>> {
    let status = hyper::StatusCode::from_u16(rpc_response.status.0).unwrap_or_else(|_| {
        warn!(
            "Invalid status code {}, falling back to 500 Internal Server Error",
            rpc_response.status.0
        );
        hyper::StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);

    for (name, value) in rpc_response.headers {
        builder = builder.header(name, value);
    }

    let body = rpc_response.body.unwrap_or_default();
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        let mut fallback = Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Generate a unique request ID.
fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}", timestamp)
}
