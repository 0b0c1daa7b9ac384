//! Per-request handler.

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http_body_util::LengthLimitError;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{sanitize_body, AuditEntry, AuditResult};
use crate::auth::Route;
use crate::error::{BridgeError, BridgeResult, RequestErrorKind};
use crate::protocol::{AckResponse, ErrorResponse, HealthResponse, RequestHead};
use crate::queue::QueuedCommand;

use super::state::BridgeState;

/// A response ready to send, plus what the audit log records about it.
struct Reply {
    status: StatusCode,
    body: Value,
    generation: u64,
    params: Option<Value>,
}

impl Reply {
    fn new<T: Serialize>(status: StatusCode, body: &T, generation: u64) -> BridgeResult<Self> {
        Ok(Self {
            status,
            body: serde_json::to_value(body)?,
            generation,
            params: None,
        })
    }

    fn with_params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }
}

/// Handle a single HTTP request.
///
/// Every path goes through here; the whitelist decides what exists.
pub async fn handle_request(State(state): State<Arc<BridgeState>>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let _active = state.metrics.track_request();

    let (parts, body) = request.into_parts();
    let head = RequestHead::from_parts(&parts);
    let content_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    debug!(
        request_id = %request_id,
        method = %head.method,
        path = %head.path,
        "Received request"
    );

    let outcome = tokio::time::timeout(
        state.request_timeout,
        process_request(&state, request_id, &head, content_length, body),
    )
    .await
    .unwrap_or_else(|_| {
        Err(BridgeError::Request {
            kind: RequestErrorKind::Timeout {
                seconds: state.request_timeout.as_secs(),
            },
        })
    });
    let duration_ms = start_time.elapsed().as_millis() as u64;

    match outcome {
        Ok(reply) => {
            state.metrics.record_request(true);
            info!(
                request_id = %request_id,
                method = %head.method,
                path = %head.path,
                status = reply.status.as_u16(),
                "Request accepted"
            );

            let entry = AuditEntry::request(
                request_id,
                head.method.as_str(),
                head.path.clone(),
                AuditResult::Accepted {
                    status_code: reply.status.as_u16(),
                },
            )
            .with_generation(reply.generation)
            .with_params(reply.params);
            write_audit(&state, entry, remote_addr, duration_ms);

            (reply.status, Json(reply.body)).into_response()
        }
        Err(e) => {
            state.metrics.record_request(false);
            warn!(
                request_id = %request_id,
                method = %head.method,
                path = %head.path,
                code = e.code(),
                error = %e,
                "Request rejected"
            );

            let entry = AuditEntry::request(
                request_id,
                head.method.as_str(),
                head.path.clone(),
                AuditResult::Rejected {
                    error_code: e.code().to_string(),
                    error_message: e.to_string(),
                },
            )
            .with_generation(state.session.current_generation());
            write_audit(&state, entry, remote_addr, duration_ms);

            error_response(request_id, &e)
        }
    }
}

/// Route, authenticate and answer one request.
async fn process_request(
    state: &BridgeState,
    request_id: Uuid,
    head: &RequestHead,
    content_length: Option<u64>,
    body: Body,
) -> BridgeResult<Reply> {
    let route = state.authenticator.route(head)?;
    if route == Route::Health {
        return health(state);
    }

    let verdict = state.authenticator.check_head(request_id, head)?;
    let body = read_body(body, content_length, state.max_body_bytes).await?;
    let request = state.authenticator.check_body(head, verdict, body)?;

    let params = if state.audit_logger.is_some() {
        sanitize_body(&request.body)
    } else {
        None
    };

    match route {
        Route::Health => health(state),
        Route::Handshake => {
            let response = state.handshake.handle(&request)?;
            // The new token is in the body; audit only that a handshake happened.
            Reply::new(StatusCode::OK, &response, response.generation)
        }
        Route::Metrics => {
            let snapshot = state.metrics.snapshot(
                state.session.current_generation(),
                state.session.is_provisioned(),
                state.queue.depth(),
                state.queue.capacity(),
            );
            Reply::new(StatusCode::OK, &snapshot, request.session_generation)
        }
        Route::Command(ack) => {
            let generation = request.session_generation;
            let command = QueuedCommand::from_request(request, state.clock.now_millis());
            let path = command.path.clone();
            let depth = state.queue.push(command)?;
            state.metrics.record_queued();
            debug!(request_id = %request_id, path = %path, depth = depth, "Command queued");

            let status = StatusCode::from_u16(ack.status_code()).unwrap_or(StatusCode::OK);
            let reply = Reply::new(
                status,
                &AckResponse {
                    status: ack,
                    request_id,
                },
                generation,
            )?;
            Ok(reply.with_params(params))
        }
    }
}

fn health(state: &BridgeState) -> BridgeResult<Reply> {
    let snapshot = state.session.snapshot();
    let depth = state.queue.depth();
    let status = if depth.saturating_mul(2) > state.queue.capacity() {
        "busy"
    } else {
        "ok"
    };
    Reply::new(
        StatusCode::OK,
        &HealthResponse {
            status: status.to_string(),
            generation: snapshot.generation,
            provisioned: snapshot.provisioned,
            queue_depth: depth,
        },
        snapshot.generation,
    )
}

/// Buffer the body, refusing anything over `limit` bytes.
async fn read_body(body: Body, content_length: Option<u64>, limit: usize) -> BridgeResult<Bytes> {
    let too_large = || BridgeError::Request {
        kind: RequestErrorKind::PayloadTooLarge { max: limit },
    };

    if content_length.is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if exceeds_limit(&e) => Err(too_large()),
        Err(e) => Err(BridgeError::invalid_body(format!("body read failed: {}", e))),
    }
}

/// Whether a body read stopped at the length limit rather than failing.
fn exceeds_limit(error: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn error_response(request_id: Uuid, error: &BridgeError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from_error(request_id, error))).into_response()
}

fn write_audit(
    state: &BridgeState,
    entry: AuditEntry,
    remote_addr: Option<String>,
    duration_ms: u64,
) {
    if let Some(logger) = &state.audit_logger {
        let entry = entry
            .with_remote_addr(remote_addr)
            .with_duration_ms(duration_ms);
        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let bytes = read_body(Body::from("{\"a\":1}"), Some(7), 16).await.unwrap();
        assert_eq!(&bytes[..], b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_read_body_declared_length_too_large() {
        let err = read_body(Body::from("{}"), Some(1024), 16).await.unwrap_err();
        assert_eq!(err.code(), "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_read_body_actual_length_too_large() {
        let body = Body::from(vec![b'x'; 64]);
        let err = read_body(body, None, 16).await.unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[tokio::test]
    async fn test_read_body_aborted_stream_is_bad_request() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"id\":")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));

        let err = read_body(body, Some(20), 1024).await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        assert_eq!(err.status_code(), 400);
    }
}
