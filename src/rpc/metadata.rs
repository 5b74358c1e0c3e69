//! Per-method configuration and the side table it lives in.
//!
//! Metadata is attached to a `(class, method)` pair before the class is
//! augmented. The wrappers copy what they need at wrap time, so the record a
//! method was wrapped with is the one it keeps.

use crate::http::Verb;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the server wrapper shapes a successful return value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ContentMode {
    /// Pass the value through as JSON.
    #[default]
    Json,
    /// Coerce the value to its string representation.
    Text,
    /// Any other mode; the envelope carries `data: null`.
    Other(String),
}

impl From<&str> for ContentMode {
    fn from(mode: &str) -> Self {
        match mode {
            "json" => ContentMode::Json,
            "text" => ContentMode::Text,
            other => ContentMode::Other(other.to_string()),
        }
    }
}

/// Where the client puts the call arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    /// Arguments travel in the `X-Servell-Args` header.
    #[default]
    Omit,
    /// Arguments travel as a JSON array in the request body (ignored for GET).
    Json,
}

/// Cache directive for the outbound request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

impl CachePolicy {
    /// `Cache-Control` value sent by the native client, if any.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            CachePolicy::Default => None,
            CachePolicy::NoStore => Some("no-store"),
            CachePolicy::Reload | CachePolicy::NoCache => Some("no-cache"),
            CachePolicy::ForceCache => Some("max-stale"),
            CachePolicy::OnlyIfCached => Some("only-if-cached"),
        }
    }
}

impl std::str::FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(CachePolicy::Default),
            "no-store" => Ok(CachePolicy::NoStore),
            "reload" => Ok(CachePolicy::Reload),
            "no-cache" => Ok(CachePolicy::NoCache),
            "force-cache" => Ok(CachePolicy::ForceCache),
            "only-if-cached" => Ok(CachePolicy::OnlyIfCached),
            other => Err(format!("unknown cache policy '{}'", other)),
        }
    }
}

/// Metadata record for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodMeta {
    /// HTTP verb the client calls with.
    pub verb: Verb,
    /// Shape of successful results on the server.
    pub content: ContentMode,
    /// Extra request headers, applied before the routing headers.
    pub headers: Vec<(String, String)>,
    /// Argument placement.
    pub body: BodyMode,
    /// Cache directive.
    pub cache: Option<CachePolicy>,
}

impl MethodMeta {
    /// Defaults: GET, json content, no headers, arguments in the header.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verb(mut self, verb: Verb) -> Self {
        self.verb = verb;
        self
    }

    pub fn content(mut self, content: impl Into<ContentMode>) -> Self {
        self.content = content.into();
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: BodyMode) -> Self {
        self.body = body;
        self
    }

    pub fn cache(mut self, cache: CachePolicy) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Arguments go in the body only for non-GET verbs with body mode `json`.
    pub fn sends_body(&self) -> bool {
        self.verb != Verb::Get && self.body == BodyMode::Json
    }
}

/// Side table of method metadata keyed by `(class, method)`.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    entries: HashMap<(String, String), MethodMeta>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a record, replacing any earlier one for the same method.
    pub fn attach(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        meta: MethodMeta,
    ) {
        self.entries.insert((class.into(), method.into()), meta);
    }

    /// The attached record, if any.
    pub fn get(&self, class: &str, method: &str) -> Option<&MethodMeta> {
        self.entries.get(&(class.to_string(), method.to_string()))
    }

    /// The attached record, or the defaults.
    pub fn resolve(&self, class: &str, method: &str) -> MethodMeta {
        self.get(class, method).cloned().unwrap_or_default()
    }
}
