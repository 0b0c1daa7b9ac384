//! Session handshake.
//!
//! The handshake is the only route exempt from timestamp, generation and
//! signature checks. It still needs the current token: the bootstrap
//! credential on first contact, the session token when re-keying.

use std::sync::Arc;

use tracing::info;

use crate::auth::signature::constant_time_eq;
use crate::auth::SessionStore;
use crate::config::HostConfig;
use crate::error::{AuthErrorKind, BridgeError, BridgeResult};
use crate::protocol::{AuthenticatedRequest, HandshakePayload, HandshakeResponse};

/// Prefix of the challenge echo in a handshake response.
pub const CHALLENGE_PREFIX: &str = "VIBE_HASH_";

/// Rotates the session on `POST /handshake`.
pub struct HandshakeHandler {
    session: Arc<SessionStore>,
    engine_version: String,
    capabilities: Vec<String>,
}

impl HandshakeHandler {
    pub fn new(session: Arc<SessionStore>, host: &HostConfig) -> Self {
        Self {
            session,
            engine_version: host.engine_version.clone(),
            capabilities: host.capabilities.clone(),
        }
    }

    /// Rotate the session for an authenticated handshake request.
    ///
    /// Every successful call increments the generation exactly once, so a
    /// retried handshake rotates again. If a concurrent handshake retired the
    /// presented token first, this one is `Unauthorized`.
    pub fn handle(&self, request: &AuthenticatedRequest) -> BridgeResult<HandshakeResponse> {
        let payload = parse_payload(request)?;

        let new_token = payload.new_token.as_deref().filter(|t| !t.is_empty());
        if let Some(token) = new_token {
            self.check_new_token(token)?;
        }

        let generation = self
            .session
            .rotate_if_current(request.credential.expose(), new_token)
            .ok_or(BridgeError::Auth {
                kind: AuthErrorKind::Unauthorized,
            })?;

        info!(
            request_id = %request.request_id,
            generation = generation,
            rekeyed = new_token.is_some(),
            client_version = payload.version.as_deref().unwrap_or("unknown"),
            "Handshake complete"
        );

        Ok(HandshakeResponse {
            status: "OK".to_string(),
            engine_version: self.engine_version.clone(),
            capabilities: self.capabilities.clone(),
            response: format!(
                "{}{}",
                CHALLENGE_PREFIX,
                payload.challenge.as_deref().unwrap_or("UNKNOWN")
            ),
            generation,
        })
    }

    /// A new token must differ from the bootstrap credential and be usable
    /// as an HTTP header value.
    fn check_new_token(&self, token: &str) -> BridgeResult<()> {
        if constant_time_eq(token, self.session.bootstrap_token()) {
            return Err(BridgeError::invalid_body(
                "new_token must differ from the bootstrap credential",
            ));
        }
        if !token.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            return Err(BridgeError::invalid_body(
                "new_token must be printable ASCII without spaces",
            ));
        }
        Ok(())
    }
}

fn parse_payload(request: &AuthenticatedRequest) -> BridgeResult<HandshakePayload> {
    let value = request
        .json_body()
        .map_err(|e| BridgeError::invalid_body(e.to_string()))?;
    if !value.is_object() {
        return Err(BridgeError::invalid_body("handshake body must be a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| BridgeError::invalid_body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Credential;
    use axum::body::Bytes;
    use axum::http::Method;
    use uuid::Uuid;

    const BOOTSTRAP: &str = "VIBE_BRIDGE_BOOTSTRAP_SECRET";

    fn handler() -> (Arc<SessionStore>, HandshakeHandler) {
        let session = Arc::new(SessionStore::new(BOOTSTRAP));
        let handler = HandshakeHandler::new(Arc::clone(&session), &HostConfig::default());
        (session, handler)
    }

    fn request(token: &str, body: &str) -> AuthenticatedRequest {
        AuthenticatedRequest {
            request_id: Uuid::new_v4(),
            method: Method::POST,
            path: "/handshake".to_string(),
            body: Bytes::from(body.to_string()),
            timestamp_ms: None,
            generation: None,
            session_generation: 0,
            credential: Credential::new(token),
        }
    }

    #[test]
    fn test_bootstrap_handshake_provisions_session() {
        let (session, handler) = handler();
        let response = handler
            .handle(&request(BOOTSTRAP, r#"{"new_token":"T1","challenge":"abc"}"#))
            .unwrap();

        assert_eq!(response.status, "OK");
        assert_eq!(response.generation, 1);
        assert_eq!(response.response, "VIBE_HASH_abc");
        assert!(!response.capabilities.is_empty());
        assert_eq!(session.current_token(), "T1");
    }

    #[test]
    fn test_missing_challenge() {
        let (_, handler) = handler();
        let response = handler.handle(&request(BOOTSTRAP, "")).unwrap();
        assert_eq!(response.response, "VIBE_HASH_UNKNOWN");
        assert_eq!(response.generation, 1);
    }

    #[test]
    fn test_retry_rotates_again() {
        let (session, handler) = handler();
        handler.handle(&request(BOOTSTRAP, r#"{"new_token":"T1"}"#)).unwrap();
        let response = handler.handle(&request("T1", "{}")).unwrap();
        assert_eq!(response.generation, 2);
        assert_eq!(session.current_token(), "T1");
    }

    #[test]
    fn test_empty_new_token_is_absent() {
        let (session, handler) = handler();
        handler.handle(&request(BOOTSTRAP, r#"{"new_token":""}"#)).unwrap();
        assert!(!session.is_provisioned());
        assert_eq!(session.current_generation(), 1);
    }

    #[test]
    fn test_bootstrap_as_new_token_rejected() {
        let (session, handler) = handler();
        let err = handler
            .handle(&request(
                BOOTSTRAP,
                r#"{"new_token":"VIBE_BRIDGE_BOOTSTRAP_SECRET"}"#,
            ))
            .unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        assert_eq!(session.current_generation(), 0);
    }

    #[test]
    fn test_unprintable_new_token_rejected() {
        let (_, handler) = handler();
        let err = handler
            .handle(&request(BOOTSTRAP, r#"{"new_token":"has space"}"#))
            .unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn test_non_object_body_rejected() {
        let (_, handler) = handler();
        for body in ["[1,2]", "\"T1\"", r#"{"new_token":5}"#] {
            assert_eq!(
                handler.handle(&request(BOOTSTRAP, body)).unwrap_err().code(),
                "BAD_REQUEST",
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_stale_token_loses_race() {
        let (session, handler) = handler();
        session.rotate(Some("T1"));
        let err = handler
            .handle(&request(BOOTSTRAP, r#"{"new_token":"T9"}"#))
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(session.current_token(), "T1");
    }
}
