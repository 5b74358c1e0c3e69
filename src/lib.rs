//! # Servell - an HTTP RPC bridge for shared class definitions
//!
//! Servell lets one class definition be used on both sides of an HTTP
//! boundary. On the server the class's async methods run the real logic and
//! are registered under `endpoint:class`; on the client the same methods turn
//! into HTTP calls that reach them, without hand-written routes or requests.
//!
//! ## Architecture
//!
//! ```text
//!   client                                   server
//! ┌──────────────────────┐             ┌─────────────────────────────────┐
//! │ AugmentedClass       │             │ RpcServer (hyper)               │
//! │  ClientRequestWrapper│── HTTP ────▶│  Dispatcher                     │
//! │   X-Servell-Function │             │   FunctionRegistry              │
//! │   X-Servell-Args     │             │    "/api/rpc:Accounts"          │
//! │                      │◀── JSON ────│     getBalance ─▶ ServerResponse│
//! │ {status, data}       │             │                    Wrapper      │
//! └──────────────────────┘             └─────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use servell::prelude::*;
//! use std::sync::Arc;
//!
//! async fn get_balance(invocation: Invocation) -> Result<Value, Failure> {
//!     let id: String = invocation.arg_as(0)?;
//!     Ok(json!({ "id": id, "balance": 42 }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let registry = Arc::new(FunctionRegistry::new());
//!
//!     // Classes must be augmented before the server accepts traffic.
//!     Augmenter::new(registry.clone())
//!         .augment(
//!             ClassDef::new("Accounts").method("getBalance", get_balance),
//!             &AugmentOptions::server(),
//!         )
//!         .await?;
//!
//!     RpcServer::new(ServerConfig::default(), registry).run().await
//! }
//! ```
//!
//! ## Wire contract
//!
//! - `X-Servell-Function: <Class>.<method>`
//! - `X-Servell-Args: <JSON array>`, or `body` when the arguments are the body
//! - response body `{"status":"ok"|"error","data":...}` with status 200, 500,
//!   or 404 when nothing is registered for the target at the request path

pub mod http;
pub mod rpc;
pub mod runtime;

pub use serde_json::{json, Value};
pub use servell_macro::rpc_method;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::http::{RpcRequest, RpcResponse, StatusCode, Verb};
    pub use crate::rpc::{
        AugmentOptions, AugmentedClass, Augmenter, BodyMode, CachePolicy, ClassDef, ContentMode,
        Context, DeclaredMethod, Dispatcher, Envelope, Failure, FunctionRegistry, HttpTransport,
        Invocation, LocalTransport, MethodMeta, Outcome, RpcError, Runtime, Transport,
    };
    pub use crate::runtime::{RpcServer, ServerConfig};
    pub use crate::{json, rpc_method, Value};
    pub use async_trait::async_trait;
}

// Re-export for convenience
pub use http::{RpcRequest, RpcResponse};
pub use rpc::{Augmenter, ClassDef, Dispatcher, Envelope, FunctionRegistry, RpcError};
pub use runtime::{RpcServer, ServerConfig};
