//! Error types for the vibe bridge.

use thiserror::Error;

/// Main error type for the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Listener and runtime errors.
    #[error("Server error: {message}")]
    Server { message: String },

    /// Authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Malformed or disallowed requests.
    #[error("Request error: {kind}")]
    Request { kind: RequestErrorKind },

    /// Command queue errors.
    #[error("Queue error: {kind}")]
    Queue { kind: QueueErrorKind },

    /// Main-thread handler errors.
    #[error("Handler error: {kind}")]
    Handler { kind: HandlerErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    #[error("Unauthorized: token missing or not current")]
    Unauthorized,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Request expired: clock skew {skew_ms}ms exceeds window of {window_ms}ms")]
    RequestExpired { skew_ms: u64, window_ms: u64 },

    #[error("Generation drift: expected {expected}, received {received}")]
    GenerationDrift { expected: u64, received: u64 },
}

/// Request error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestErrorKind {
    #[error("Path not whitelisted: {path}")]
    ForbiddenPath { path: String },

    #[error("No route for GET {path}")]
    NotFound { path: String },

    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("Missing required header: {header}")]
    MissingHeader { header: &'static str },

    #[error("Invalid value for header '{header}': {message}")]
    InvalidHeader {
        header: &'static str,
        message: String,
    },

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },

    #[error("Request body exceeds maximum of {max} bytes")]
    PayloadTooLarge { max: usize },

    #[error("Request not completed within {seconds}s")]
    Timeout { seconds: u64 },
}

/// Command queue error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueErrorKind {
    #[error("Command queue full at depth {depth}")]
    Full { depth: usize },

    #[error("Command queue closed")]
    Closed,
}

/// Handler error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerErrorKind {
    #[error("Handler registered for non-whitelisted path: {path}")]
    NotWhitelisted { path: String },

    #[error("Duplicate handler for path: {path}")]
    DuplicatePath { path: String },

    #[error("Invalid payload for {path}: {message}")]
    InvalidPayload { path: String, message: String },

    #[error("Host rejected {path}: {message}")]
    Rejected { path: String, message: String },
}

impl BridgeError {
    /// Shorthand for a `BadRequest` caused by an unusable body.
    pub fn invalid_body(message: impl Into<String>) -> Self {
        BridgeError::Request {
            kind: RequestErrorKind::InvalidBody {
                message: message.into(),
            },
        }
    }

    /// Stable error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Auth { kind } => match kind {
                AuthErrorKind::Unauthorized => "UNAUTHORIZED",
                AuthErrorKind::InvalidSignature => "INVALID_SIGNATURE",
                AuthErrorKind::RequestExpired { .. } => "REQUEST_EXPIRED",
                AuthErrorKind::GenerationDrift { .. } => "GENERATION_DRIFT",
            },
            BridgeError::Request { kind } => match kind {
                RequestErrorKind::ForbiddenPath { .. } => "FORBIDDEN",
                RequestErrorKind::NotFound { .. } => "NOT_FOUND",
                RequestErrorKind::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
                RequestErrorKind::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
                RequestErrorKind::Timeout { .. } => "REQUEST_TIMEOUT",
                RequestErrorKind::MissingHeader { .. }
                | RequestErrorKind::InvalidHeader { .. }
                | RequestErrorKind::InvalidBody { .. } => "BAD_REQUEST",
            },
            BridgeError::Queue { .. } => "SERVICE_UNAVAILABLE",
            BridgeError::Handler {
                kind: HandlerErrorKind::InvalidPayload { .. },
            } => "BAD_REQUEST",
            _ => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.code() {
            "UNAUTHORIZED" => 401,
            "FORBIDDEN" | "INVALID_SIGNATURE" | "REQUEST_EXPIRED" => 403,
            "GENERATION_DRIFT" => 409,
            "NOT_FOUND" => 404,
            "METHOD_NOT_ALLOWED" => 405,
            "REQUEST_TIMEOUT" => 408,
            "PAYLOAD_TOO_LARGE" => 413,
            "BAD_REQUEST" => 400,
            "SERVICE_UNAVAILABLE" => 503,
            _ => 500,
        }
    }
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                BridgeError::Auth {
                    kind: AuthErrorKind::Unauthorized,
                },
                401,
            ),
            (
                BridgeError::Request {
                    kind: RequestErrorKind::ForbiddenPath {
                        path: "/etc".to_string(),
                    },
                },
                403,
            ),
            (
                BridgeError::Auth {
                    kind: AuthErrorKind::RequestExpired {
                        skew_ms: 6000,
                        window_ms: 5000,
                    },
                },
                403,
            ),
            (
                BridgeError::Auth {
                    kind: AuthErrorKind::GenerationDrift {
                        expected: 1,
                        received: 0,
                    },
                },
                409,
            ),
            (BridgeError::invalid_body("not json"), 400),
            (
                BridgeError::Request {
                    kind: RequestErrorKind::Timeout { seconds: 30 },
                },
                408,
            ),
            (
                BridgeError::Queue {
                    kind: QueueErrorKind::Full { depth: 8 },
                },
                503,
            ),
            (
                BridgeError::Config {
                    message: "bad".to_string(),
                },
                500,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }

    #[test]
    fn test_error_codes_are_stable() {
        let err = BridgeError::Request {
            kind: RequestErrorKind::MissingHeader {
                header: "x-vibe-timestamp",
            },
        };
        assert_eq!(err.code(), "BAD_REQUEST");
        assert!(err.to_string().contains("x-vibe-timestamp"));

        let err = BridgeError::Auth {
            kind: AuthErrorKind::InvalidSignature,
        };
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }
}
