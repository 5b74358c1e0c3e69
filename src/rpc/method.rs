//! Method bodies and the values that flow through them.

use crate::http::RpcResponse;
use crate::rpc::envelope::Envelope;
use crate::rpc::error::Failure;
use crate::rpc::metadata::MethodMeta;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

/// Arguments of a single call.
///
/// On the client side the raw HTTP response is appended as a trailing extra
/// argument and exposed through [`Invocation::response`].
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Raw response, present only inside a client-wrapped body.
    pub response: Option<RpcResponse>,
}

impl Invocation {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            response: None,
        }
    }

    pub fn with_response(mut self, response: RpcResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// Positional argument by index.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Positional argument decoded into `T`. A missing argument decodes as `null`.
    pub fn arg_as<T: DeserializeOwned>(&self, index: usize) -> Result<T, Failure> {
        let value = self.args.get(index).cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// The raw response handed to a client-side body.
    pub fn response(&self) -> Option<&RpcResponse> {
        self.response.as_ref()
    }
}

/// An asynchronous method body. Only these are eligible for wrapping.
#[async_trait]
pub trait AsyncMethod: Send + Sync {
    async fn call(&self, invocation: Invocation) -> Result<Value, Failure>;
}

#[async_trait]
impl<F, Fut> AsyncMethod for F
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
{
    async fn call(&self, invocation: Invocation) -> Result<Value, Failure> {
        (self)(invocation).await
    }
}

/// A synchronous method body. Copied through augmentation untouched.
pub trait SyncMethod: Send + Sync {
    fn call(&self, invocation: Invocation) -> Result<Value, Failure>;
}

impl<F> SyncMethod for F
where
    F: Fn(Invocation) -> Result<Value, Failure> + Send + Sync,
{
    fn call(&self, invocation: Invocation) -> Result<Value, Failure> {
        (self)(invocation)
    }
}

/// A method type that carries its own name and metadata, as generated by
/// `#[rpc_method]`.
pub trait DeclaredMethod: AsyncMethod + Default + 'static {
    /// Method name on the wire.
    const NAME: &'static str;

    /// Metadata attached when the method is declared on a class.
    fn meta() -> MethodMeta;
}

/// What a call on an augmented class yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Value from an untouched method, or a truthy value from a client body.
    Value(Value),
    /// Envelope from a server-wrapped method.
    Envelope(Envelope),
    /// Raw response, when a client body returned nothing truthy.
    Response(RpcResponse),
}

impl Outcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Outcome::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&RpcResponse> {
        match self {
            Outcome::Response(response) => Some(response),
            _ => None,
        }
    }
}

/// Truthiness of a returned value: `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
