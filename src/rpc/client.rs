//! Client request wrapper and the transports it sends through.

use crate::http::{RpcRequest, RpcResponse, StatusCode};
use crate::rpc::dispatch::{Dispatcher, ARGS_HEADER, BODY_SENTINEL, FUNCTION_HEADER};
use crate::rpc::error::RpcError;
use crate::rpc::metadata::MethodMeta;
use crate::rpc::method::{is_truthy, AsyncMethod, Invocation, Outcome};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tracing::debug;

/// Carries a request to wherever the server half lives.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, RpcError>;
}

/// HTTP/1 transport over `hyper-util`'s pooled client.
///
/// Request urls are resolved against `origin`, e.g. `http://127.0.0.1:8080`.
pub struct HttpTransport {
    origin: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { origin, client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        let uri = format!("{}{}", self.origin, request.url);
        let mut builder = hyper::Request::builder()
            .method(hyper::Method::from(request.method))
            .uri(uri.as_str());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let outbound = builder
            .body(Full::new(request.body.unwrap_or_default()))
            .map_err(|e| RpcError::transport(format!("invalid request for {}: {}", uri, e)))?;
        let response = self.client.request(outbound).await?;

        let status = StatusCode(response.status().as_u16());
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let body = response.into_body().collect().await?.to_bytes();
        Ok(RpcResponse {
            status,
            headers,
            body: if body.is_empty() { None } else { Some(body) },
        })
    }
}

/// In-process transport that hands requests straight to a dispatcher.
///
/// Request errors are answered the way [`crate::runtime::RpcServer`] answers
/// them, so callers observe the same responses as over the network.
#[derive(Clone)]
pub struct LocalTransport {
    dispatcher: Dispatcher,
}

impl LocalTransport {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        match self.dispatcher.dispatch(request).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(err.into()),
        }
    }
}

/// Replaces a client-side method body with an HTTP call to the server half.
pub struct ClientRequestWrapper {
    class: String,
    method: String,
    endpoint: String,
    meta: MethodMeta,
    transport: Arc<dyn Transport>,
    inner: Arc<dyn AsyncMethod>,
}

impl ClientRequestWrapper {
    pub fn new(
        class: impl Into<String>,
        method: impl Into<String>,
        endpoint: impl Into<String>,
        meta: MethodMeta,
        transport: Arc<dyn Transport>,
        inner: Arc<dyn AsyncMethod>,
    ) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            endpoint: endpoint.into(),
            meta,
            transport,
            inner,
        }
    }

    pub fn meta(&self) -> &MethodMeta {
        &self.meta
    }

    /// Build the outbound request for a call with `args`.
    pub fn build_request(&self, args: &[Value]) -> Result<RpcRequest, RpcError> {
        let in_body = self.meta.sends_body();

        let mut request = RpcRequest::new(self.meta.verb, self.endpoint.clone());
        for (name, value) in &self.meta.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(directive) = self.meta.cache.and_then(|cache| cache.header_value()) {
            request = request.header("Cache-Control", directive);
        }

        request = request.header(FUNCTION_HEADER, format!("{}.{}", self.class, self.method));
        if in_body {
            if !request.has_header("Content-Type") {
                request = request.header("Content-Type", "application/json");
            }
            request = request
                .header(ARGS_HEADER, BODY_SENTINEL)
                .body(serde_json::to_vec(args)?);
        } else {
            request = request.header(ARGS_HEADER, header_json(args)?);
        }

        Ok(request)
    }

    /// Issue the call, then run the original body with the raw response appended.
    ///
    /// Transport errors and failures of the body propagate to the caller.
    pub async fn call(&self, args: Vec<Value>) -> Result<Outcome, RpcError> {
        let request = self.build_request(&args)?;
        debug!(
            "Calling {}.{} via {} {}",
            self.class, self.method, request.method, self.endpoint
        );

        let response = self.transport.send(request).await?;
        let returned = self
            .inner
            .call(Invocation::new(args).with_response(response.clone()))
            .await?;

        if is_truthy(&returned) {
            Ok(Outcome::Value(returned))
        } else {
            Ok(Outcome::Response(response))
        }
    }
}

/// Compact JSON with every non-ASCII character written as `\uXXXX`, so the
/// result is a valid header value.
fn header_json(args: &[Value]) -> Result<String, RpcError> {
    let mut buf = Vec::new();
    args.serialize(&mut Serializer::with_formatter(&mut buf, AsciiFormatter))?;
    String::from_utf8(buf).map_err(|e| RpcError::request(e.to_string()))
}

struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\u{7f}' {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
