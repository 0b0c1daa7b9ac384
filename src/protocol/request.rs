//! Request types for the bridge protocol.

use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::Method;
use serde::Deserialize;
use uuid::Uuid;

use super::headers::AuthHeaders;

/// Everything known about a request before its body is read.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// URI path without the query string.
    pub path: String,
    pub headers: AuthHeaders,
}

impl RequestHead {
    pub fn new(method: Method, path: impl Into<String>, headers: AuthHeaders) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            headers: AuthHeaders::from_header_map(&parts.headers),
        }
    }
}

/// Token captured while a request was checked.
///
/// Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// A request that passed every authentication step.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest {
    pub request_id: Uuid,
    pub method: Method,
    pub path: String,
    /// Raw body; empty or UTF-8 JSON.
    pub body: Bytes,
    /// Timestamp header in Unix milliseconds. `None` for the handshake.
    pub timestamp_ms: Option<u64>,
    /// Generation header, if the client sent one.
    pub generation: Option<u64>,
    /// Session generation the request was validated against.
    pub session_generation: u64,
    /// Token the request presented.
    pub credential: Credential,
}

impl AuthenticatedRequest {
    /// Parse the body as JSON. An empty body is an empty object.
    pub fn json_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.body.is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&self.body)
    }
}

/// Body of `POST /handshake`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakePayload {
    #[serde(default)]
    pub new_token: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}
