//! Response bodies of the bridge protocol.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthErrorKind, BridgeError};

/// Fixed client-facing message for each error code.
///
/// The detailed error stays in the server log; clients only learn the code.
fn client_message(code: &str) -> &'static str {
    match code {
        "UNAUTHORIZED" => "Unauthorized",
        "FORBIDDEN" => "Path not allowed",
        "REQUEST_EXPIRED" => "Request expired",
        "INVALID_SIGNATURE" => "Invalid signature",
        "GENERATION_DRIFT" => "Generation drift, re-handshake required",
        "BAD_REQUEST" => "Malformed request",
        "NOT_FOUND" => "Not found",
        "METHOD_NOT_ALLOWED" => "Method not allowed",
        "PAYLOAD_TOO_LARGE" => "Request body too large",
        "REQUEST_TIMEOUT" => "Request timed out",
        "SERVICE_UNAVAILABLE" => "Command queue full",
        _ => "Internal server error",
    }
}

/// Body of every rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub request_id: Uuid,
    pub error: ErrorDetail,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "GENERATION_DRIFT").
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Build the client-facing body for `error`.
    pub fn from_error(request_id: Uuid, error: &BridgeError) -> Self {
        let code = error.code();

        debug!(
            request_id = %request_id,
            code = code,
            error = %error,
            "Error response (sanitized for client)"
        );

        let details = match error {
            BridgeError::Auth {
                kind: AuthErrorKind::GenerationDrift { expected, .. },
            } => Some(serde_json::json!({ "generation": expected })),
            _ => None,
        };

        Self {
            success: false,
            request_id,
            error: ErrorDetail {
                code: code.to_string(),
                message: client_message(code).to_string(),
                details,
            },
        }
    }
}

/// How a command route acknowledges an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acknowledgement {
    /// `200 {"status":"ok"}`
    Ok,
    /// `202 {"status":"queued"}`
    Queued,
}

impl Acknowledgement {
    pub fn status_code(self) -> u16 {
        match self {
            Acknowledgement::Ok => 200,
            Acknowledgement::Queued => 202,
        }
    }
}

/// Body returned for an enqueued command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: Acknowledgement,
    pub request_id: Uuid,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"busy"` while the command queue is more than half full.
    pub status: String,
    pub generation: u64,
    pub provisioned: bool,
    pub queue_depth: usize,
}

/// Body of a successful `POST /handshake`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub status: String,
    pub engine_version: String,
    pub capabilities: Vec<String>,
    pub response: String,
    pub generation: u64,
}
