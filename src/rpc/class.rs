//! Class definitions and their augmentation into server or client form.
//!
//! A class is a named table of method descriptors plus static members.
//! Augmentation consumes the definition and returns an [`AugmentedClass`]
//! whose eligible methods are swapped for wrappers:
//!
//! | context | runtime   | async methods                         | registry        |
//! |---------|-----------|---------------------------------------|-----------------|
//! | server  | `Native`  | server response wrapper               | bucket installed|
//! | server  | `Browser` | untouched                             | untouched       |
//! | client  | `Browser` | client request wrapper                | untouched       |
//! | client  | `Native`  | untouched                             | untouched       |
//!
//! Synchronous and private methods are never wrapped.

use crate::rpc::client::{ClientRequestWrapper, Transport};
use crate::rpc::error::RpcError;
use crate::rpc::metadata::{MetadataTable, MethodMeta};
use crate::rpc::method::{AsyncMethod, DeclaredMethod, Invocation, Outcome, SyncMethod};
use crate::rpc::registry::{FunctionRegistry, MethodTable, NamespaceKey, ServerFunction};
use crate::rpc::server::ServerResponseWrapper;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "/api/rpc";

/// Which half of the bridge a class is declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Server,
    Client,
}

/// Where the code is actually running, as resolved by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// A browser-like environment that reaches the server over HTTP.
    Browser,
    /// The server process itself, or any other non-browser environment.
    Native,
}

/// Options for one augmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentOptions {
    /// Path the server methods are reachable at.
    pub endpoint: String,
    /// Declared context.
    pub context: Context,
    /// Actual runtime environment.
    pub runtime: Runtime,
}

impl AugmentOptions {
    /// Server context on the native runtime at the default endpoint.
    pub fn server() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            context: Context::Server,
            runtime: Runtime::Native,
        }
    }

    /// Client context in a browser-like runtime at the default endpoint.
    pub fn client() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            context: Context::Client,
            runtime: Runtime::Browser,
        }
    }

    /// Set the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the runtime environment.
    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }
}

impl Default for AugmentOptions {
    fn default() -> Self {
        Self::server()
    }
}

enum MethodDef {
    Async(Arc<dyn AsyncMethod>),
    Private(Arc<dyn AsyncMethod>),
    Sync(Arc<dyn SyncMethod>),
}

/// A class definition: name, static members, methods and their metadata.
pub struct ClassDef {
    name: String,
    statics: BTreeMap<String, Value>,
    methods: Vec<(String, MethodDef)>,
    metadata: MetadataTable,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statics: BTreeMap::new(),
            methods: Vec::new(),
            metadata: MetadataTable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a static member. Copied through augmentation unchanged.
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.statics.insert(name.into(), value.into());
        self
    }

    /// Add an async method. Eligible for wrapping.
    pub fn method(self, name: impl Into<String>, body: impl AsyncMethod + 'static) -> Self {
        self.define(name.into(), MethodDef::Async(Arc::new(body)))
    }

    /// Add an async method that is never exposed.
    pub fn private_method(self, name: impl Into<String>, body: impl AsyncMethod + 'static) -> Self {
        self.define(name.into(), MethodDef::Private(Arc::new(body)))
    }

    /// Add a synchronous method. Never wrapped.
    pub fn sync_method(self, name: impl Into<String>, body: impl SyncMethod + 'static) -> Self {
        self.define(name.into(), MethodDef::Sync(Arc::new(body)))
    }

    /// Attach metadata to a method of this class.
    pub fn param(mut self, method: impl Into<String>, meta: MethodMeta) -> Self {
        self.metadata.attach(self.name.clone(), method, meta);
        self
    }

    /// Add a method declared with `#[rpc_method]`, together with its metadata.
    pub fn declare<M: DeclaredMethod>(self) -> Self {
        self.param(M::NAME, M::meta()).method(M::NAME, M::default())
    }

    /// Metadata attached so far.
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    fn define(mut self, name: String, def: MethodDef) -> Self {
        match self.methods.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = def,
            None => self.methods.push((name, def)),
        }
        self
    }
}

/// A member of an augmented class.
#[derive(Clone)]
pub enum Member {
    /// Async method left as declared.
    Untouched(Arc<dyn AsyncMethod>),
    /// Synchronous method, copied through.
    Sync(Arc<dyn SyncMethod>),
    /// Server-wrapped method, also installed in the registry.
    Server(Arc<ServerResponseWrapper>),
    /// Client-wrapped method.
    Client(Arc<ClientRequestWrapper>),
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Member::Untouched(_) => "Untouched",
            Member::Sync(_) => "Sync",
            Member::Server(_) => "Server",
            Member::Client(_) => "Client",
        };
        f.write_str(kind)
    }
}

/// Result of augmenting a [`ClassDef`].
pub struct AugmentedClass {
    name: String,
    options: AugmentOptions,
    statics: BTreeMap<String, Value>,
    members: HashMap<String, Member>,
}

impl AugmentedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.options.endpoint
    }

    pub fn context(&self) -> Context {
        self.options.context
    }

    /// Registry key this class uses on the server.
    pub fn namespace_key(&self) -> NamespaceKey {
        NamespaceKey::new(self.options.endpoint.clone(), self.name.clone())
    }

    /// A static member.
    pub fn get_static(&self, name: &str) -> Option<&Value> {
        self.statics.get(name)
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Call a method by name.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Outcome, RpcError> {
        let member = self.members.get(method).ok_or_else(|| {
            RpcError::NotFound(format!("Class '{}' has no method '{}'", self.name, method))
        })?;

        match member {
            Member::Untouched(body) => Ok(Outcome::Value(body.call(Invocation::new(args)).await?)),
            Member::Sync(body) => Ok(Outcome::Value(body.call(Invocation::new(args))?)),
            Member::Server(wrapper) => Ok(Outcome::Envelope(wrapper.call(args).await)),
            Member::Client(wrapper) => wrapper.call(args).await,
        }
    }
}

/// Performs augmentation against a registry and, for clients, a transport.
#[derive(Clone)]
pub struct Augmenter {
    registry: Arc<FunctionRegistry>,
    transport: Option<Arc<dyn Transport>>,
}

impl Augmenter {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            transport: None,
        }
    }

    /// Transport used by client wrappers.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn registry(&self) -> Arc<FunctionRegistry> {
        self.registry.clone()
    }

    /// Augment `class` according to `options`.
    ///
    /// On the server the whole bucket is built first and installed with a
    /// single registry write. A context that does not match the runtime is
    /// skipped silently.
    pub async fn augment(
        &self,
        class: ClassDef,
        options: &AugmentOptions,
    ) -> Result<AugmentedClass, RpcError> {
        if options.endpoint.is_empty() {
            return Err(RpcError::configuration(
                "Missing 'endpoint' option in args to route the requests",
            ));
        }

        let ClassDef {
            name,
            statics,
            methods,
            metadata,
        } = class;

        if name.is_empty() {
            return Err(RpcError::configuration("Class name must not be empty"));
        }

        let wrap_server = options.context == Context::Server && options.runtime == Runtime::Native;
        let wrap_client = options.context == Context::Client && options.runtime == Runtime::Browser;

        let transport = match (&self.transport, wrap_client) {
            (Some(transport), true) => Some(transport.clone()),
            (None, true) => {
                return Err(RpcError::configuration(format!(
                    "Class '{}' is augmented for the client but no transport was supplied",
                    name
                )))
            }
            (_, false) => None,
        };

        if !wrap_server && !wrap_client {
            debug!(
                "Skipping wrappers for '{}': {:?} context on {:?} runtime",
                name, options.context, options.runtime
            );
        }

        let mut members = HashMap::new();
        let mut table = MethodTable::new();

        for (method, def) in methods {
            let member = match def {
                MethodDef::Sync(body) => Member::Sync(body),
                MethodDef::Private(body) => Member::Untouched(body),
                MethodDef::Async(body) => {
                    let meta = metadata.resolve(&name, &method);
                    if wrap_server {
                        let wrapper = Arc::new(ServerResponseWrapper::new(
                            method.clone(),
                            meta.content,
                            body,
                        ));
                        table.insert(method.clone(), wrapper.clone() as Arc<dyn ServerFunction>);
                        Member::Server(wrapper)
                    } else if let Some(transport) = &transport {
                        Member::Client(Arc::new(ClientRequestWrapper::new(
                            name.clone(),
                            method.clone(),
                            options.endpoint.clone(),
                            meta,
                            transport.clone(),
                            body,
                        )))
                    } else {
                        Member::Untouched(body)
                    }
                }
            };
            members.insert(method, member);
        }

        if wrap_server {
            self.registry
                .install(NamespaceKey::new(options.endpoint.clone(), name.clone()), table)
                .await;
        } else if wrap_client {
            info!("Wrapped client class '{}' for '{}'", name, options.endpoint);
        }

        Ok(AugmentedClass {
            name,
            options: options.clone(),
            statics,
            members,
        })
    }
}
