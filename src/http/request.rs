//! RPC HTTP request type providing a fetch-like API.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP verb an RPC method is called with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// All verbs the dispatcher answers to.
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    /// Map a hyper method onto a verb, `None` for anything outside the five.
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Verb::Get),
            hyper::Method::POST => Some(Verb::Post),
            hyper::Method::PUT => Some(Verb::Put),
            hyper::Method::PATCH => Some(Verb::Patch),
            hyper::Method::DELETE => Some(Verb::Delete),
            _ => None,
        }
    }

    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            other => Err(format!("unsupported HTTP verb '{}'", other)),
        }
    }
}

impl From<Verb> for hyper::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => hyper::Method::GET,
            Verb::Post => hyper::Method::POST,
            Verb::Put => hyper::Method::PUT,
            Verb::Patch => hyper::Method::PATCH,
            Verb::Delete => hyper::Method::DELETE,
        }
    }
}

/// Fetch-like HTTP request carrying an RPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// HTTP verb.
    pub method: Verb,
    /// Request target: path plus optional query string.
    pub url: String,
    /// HTTP headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
}

impl RpcRequest {
    /// Create a new request.
    pub fn new(method: Verb, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Set a header on the request, replacing any header whose name matches
    /// ignoring case.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.headers.retain(|name, _| !name.eq_ignore_ascii_case(&key));
        self.headers.insert(key, value.into());
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get a header value. Names compare case-insensitively.
    pub fn get_header(&self, key: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    /// Whether a header is present, ignoring case.
    pub fn has_header(&self, key: &str) -> bool {
        self.get_header(key).is_some()
    }

    /// The path component of the url, without query string or fragment.
    pub fn path(&self) -> &str {
        let end = self.url.find(|c| c == '?' || c == '#').unwrap_or(self.url.len());
        &self.url[..end]
    }

    /// Get the body as text if present.
    pub fn text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// Parse the body as JSON if present.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.body.as_ref().map(|b| serde_json::from_slice(b))
    }
}

impl Default for RpcRequest {
    fn default() -> Self {
        Self::new(Verb::Get, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_strips_query() {
        let request = RpcRequest::new(Verb::Get, "/api/rpc?trace=1");
        assert_eq!(request.path(), "/api/rpc");
        assert_eq!(RpcRequest::new(Verb::Get, "/api/rpc").path(), "/api/rpc");
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = RpcRequest::default().header("x-servell-args", "[]");
        assert_eq!(request.get_header("X-Servell-Args"), Some(&"[]".to_string()));
        assert!(!request.has_header("X-Servell-Function"));
    }

    #[test]
    fn test_header_replaces_other_casing() {
        let request = RpcRequest::default()
            .header("x-servell-args", "[999]")
            .header("X-Servell-Args", r#"["u1"]"#);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.get_header("x-servell-args"), Some(&r#"["u1"]"#.to_string()));
    }

    #[test]
    fn test_verb_parse_and_display() {
        assert_eq!("patch".parse::<Verb>(), Ok(Verb::Patch));
        assert!("HEAD".parse::<Verb>().is_err());
        assert_eq!(Verb::Delete.to_string(), "DELETE");
        assert_eq!(Verb::default(), Verb::Get);
        assert_eq!(Verb::from_hyper(&hyper::Method::OPTIONS), None);
    }
}
