//! Server response wrapper: runs the real method body and folds the outcome
//! into an envelope.

use crate::rpc::envelope::{stringify, Envelope};
use crate::rpc::error::Failure;
use crate::rpc::metadata::ContentMode;
use crate::rpc::method::{AsyncMethod, Invocation};
use crate::rpc::registry::ServerFunction;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Wraps a method body so that every call yields exactly one envelope.
pub struct ServerResponseWrapper {
    name: String,
    content: ContentMode,
    inner: Arc<dyn AsyncMethod>,
}

impl ServerResponseWrapper {
    pub fn new(name: impl Into<String>, content: ContentMode, inner: Arc<dyn AsyncMethod>) -> Self {
        Self {
            name: name.into(),
            content,
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &ContentMode {
        &self.content
    }

    /// Invoke the body and normalize its result.
    pub async fn call(&self, args: Vec<Value>) -> Envelope {
        let result = self.inner.call(Invocation::new(args)).await;
        if let Err(failure) = &result {
            warn!("Method '{}' failed: {}", self.name, failure);
        }
        shape(&self.content, result)
    }
}

#[async_trait]
impl ServerFunction for ServerResponseWrapper {
    async fn invoke(&self, args: Vec<Value>) -> Envelope {
        self.call(args).await
    }
}

/// Turn a body's result into an envelope according to the content mode.
pub fn shape(content: &ContentMode, result: Result<Value, Failure>) -> Envelope {
    match result {
        Ok(value) => {
            let data = match content {
                ContentMode::Json => value,
                ContentMode::Text => Value::String(stringify(&value)),
                ContentMode::Other(_) => Value::Null,
            };
            Envelope::Ok { data: Some(data) }
        }
        Err(failure) => Envelope::error(failure.to_string()),
    }
}
