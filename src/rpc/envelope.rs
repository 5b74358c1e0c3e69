//! The `{status, data}` result envelope returned by every server invocation.

use crate::http::{RpcResponse, StatusCode};
use crate::rpc::error::RpcError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Tagged outcome of a server-side call, as carried in the response body.
///
/// `data` is optional on the wire: an absent field and an explicit `null`
/// are kept apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Ok {
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        data: Option<Value>,
    },
    Error {
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        data: Option<Value>,
    },
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// Successful envelope carrying `data`.
    pub fn ok(data: impl Into<Value>) -> Self {
        Envelope::Ok {
            data: Some(data.into()),
        }
    }

    /// Error envelope carrying a message.
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            data: Some(Value::String(message.into())),
        }
    }

    /// Whether this is a `status: "ok"` envelope.
    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Ok { .. })
    }

    /// The payload, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Envelope::Ok { data } | Envelope::Error { data } => data.as_ref(),
        }
    }

    /// 200 for `ok`, 500 for `error`.
    pub fn status_code(&self) -> StatusCode {
        if self.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Serialize into a JSON response with the matching status code.
    pub fn into_response(self) -> Result<RpcResponse, serde_json::Error> {
        let status = self.status_code();
        Ok(RpcResponse::json(&self)?.with_status(status))
    }

    /// Decode the envelope from a raw response body.
    pub fn from_response(response: &RpcResponse) -> Result<Self, RpcError> {
        match response.json_body::<Envelope>() {
            Some(result) => result
                .map_err(|e| RpcError::transport(format!("undecodable response body: {}", e))),
            None => Err(RpcError::transport("response has no body to decode")),
        }
    }
}

/// String conversion matching how a dynamic runtime stringifies a value:
/// strings verbatim, arrays comma-joined with null elements left empty,
/// objects as `[object Object]`.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => stringify_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn stringify_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() => stringify_f64(f),
        _ => n.to_string(),
    }
}

/// Number-to-string the way a dynamic runtime prints it: plain decimal for
/// magnitudes in `[1e-6, 1e21)`, exponent form (`1e+21`, `1.5e-7`) otherwise,
/// and `0` for both zeros.
fn stringify_f64(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    if !f.is_finite() {
        return f.to_string();
    }

    // Shortest round-trip digits, e.g. "1.2345e3".
    let sci = format!("{:e}", f.abs());
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return f.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return f.to_string();
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat(-n as usize), digits)
    } else {
        let sign = if n - 1 < 0 { '-' } else { '+' };
        let (lead, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", lead, sign, (n - 1).abs())
        } else {
            format!("{}.{}e{}{}", lead, rest, sign, (n - 1).abs())
        }
    };

    if f < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}
