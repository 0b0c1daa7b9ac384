//! A validated command waiting for the host thread.

use axum::body::Bytes;
use uuid::Uuid;

use crate::protocol::AuthenticatedRequest;

/// A mutation accepted at the network boundary.
///
/// Owned by the queue until the dispatcher takes it.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub request_id: Uuid,
    pub path: String,
    pub body: Bytes,
    /// Unix milliseconds when the command was queued.
    pub enqueued_at: u64,
    /// Session generation the request was validated against.
    pub generation: u64,
}

impl QueuedCommand {
    pub fn new(path: impl Into<String>, body: impl Into<Bytes>, enqueued_at: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            path: path.into(),
            body: body.into(),
            enqueued_at,
            generation: 0,
        }
    }

    pub fn from_request(request: AuthenticatedRequest, enqueued_at: u64) -> Self {
        Self {
            request_id: request.request_id,
            path: request.path,
            body: request.body,
            enqueued_at,
            generation: request.session_generation,
        }
    }

    /// Body as JSON. An empty body is an empty object.
    pub fn json_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.body.is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&self.body)
    }
}
