//! Function registry mapping `endpoint:class` buckets to wrapped server methods.

use crate::rpc::envelope::Envelope;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A registered, invocable server-side function.
///
/// Implementations never fail: every outcome is an envelope.
#[async_trait]
pub trait ServerFunction: Send + Sync {
    async fn invoke(&self, args: Vec<Value>) -> Envelope;
}

/// Methods of one class at one endpoint.
pub type MethodTable = HashMap<String, Arc<dyn ServerFunction>>;

/// Identifies one registry bucket. Renders as `endpoint:class`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceKey {
    endpoint: String,
    class: String,
}

impl NamespaceKey {
    pub fn new(endpoint: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            class: class.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl std::fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.class)
    }
}

/// Registry of server functions.
///
/// Buckets are installed while classes are augmented and only read while
/// requests are served. Hosts must finish augmenting every class before they
/// start accepting traffic; the registry does not order the two for them.
pub struct FunctionRegistry {
    namespaces: RwLock<HashMap<NamespaceKey, MethodTable>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    ///
    /// Created on first use and never replaced, so every caller in the process
    /// sees the same buckets.
    pub fn global() -> Arc<FunctionRegistry> {
        static GLOBAL: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(FunctionRegistry::new())).clone()
    }

    /// Install a bucket in one write. A bucket already at this key is replaced.
    pub async fn install(&self, key: NamespaceKey, methods: MethodTable) {
        let count = methods.len();
        let mut namespaces = self.namespaces.write().await;

        if namespaces.insert(key.clone(), methods).is_some() {
            warn!("Namespace '{}' was already registered, replacing it", key);
        }

        info!("Registered namespace '{}' with {} method(s)", key, count);
    }

    /// Look up a method in the bucket for `endpoint:class`.
    pub async fn lookup(
        &self,
        endpoint: &str,
        class: &str,
        method: &str,
    ) -> Option<Arc<dyn ServerFunction>> {
        let namespaces = self.namespaces.read().await;
        let found = namespaces
            .get(&NamespaceKey::new(endpoint, class))
            .and_then(|methods| methods.get(method))
            .cloned();

        if found.is_none() {
            debug!("No function '{}.{}' at '{}'", class, method, endpoint);
        }
        found
    }

    /// Whether a bucket exists for `endpoint:class`.
    pub async fn contains(&self, endpoint: &str, class: &str) -> bool {
        let namespaces = self.namespaces.read().await;
        namespaces.contains_key(&NamespaceKey::new(endpoint, class))
    }

    /// Method names registered for `endpoint:class`, sorted.
    pub async fn methods(&self, endpoint: &str, class: &str) -> Vec<String> {
        let namespaces = self.namespaces.read().await;
        let mut names: Vec<String> = namespaces
            .get(&NamespaceKey::new(endpoint, class))
            .map(|methods| methods.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// All buckets with their method names, sorted by key.
    pub async fn list(&self) -> Vec<(NamespaceKey, Vec<String>)> {
        let namespaces = self.namespaces.read().await;
        let mut entries: Vec<(NamespaceKey, Vec<String>)> = namespaces
            .iter()
            .map(|(key, methods)| {
                let mut names: Vec<String> = methods.keys().cloned().collect();
                names.sort();
                (key.clone(), names)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
