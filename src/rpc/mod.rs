//! The RPC bridge: registry, metadata, wrappers, augmentation and dispatch.

pub mod class;
pub mod client;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod method;
pub mod registry;
pub mod server;

pub use class::{AugmentOptions, AugmentedClass, Augmenter, ClassDef, Context, Member, Runtime, DEFAULT_ENDPOINT};
pub use client::{ClientRequestWrapper, HttpTransport, LocalTransport, Transport};
pub use dispatch::{Dispatcher, ARGS_HEADER, BODY_SENTINEL, FUNCTION_HEADER};
pub use envelope::Envelope;
pub use error::{Failure, RpcError};
pub use metadata::{BodyMode, CachePolicy, ContentMode, MetadataTable, MethodMeta};
pub use method::{AsyncMethod, DeclaredMethod, Invocation, Outcome, SyncMethod};
pub use registry::{FunctionRegistry, NamespaceKey, ServerFunction};
pub use server::ServerResponseWrapper;
