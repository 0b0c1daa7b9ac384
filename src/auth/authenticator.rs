//! Request authentication pipeline.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. path whitelist (and method routing)
//! 2. token
//! 3. timestamp freshness (not for the handshake)
//! 4. generation (not for the handshake)
//! 5. body is empty or UTF-8 JSON
//! 6. signature (not for the handshake)
//!
//! Steps 1-4 only need the request head and run before the body is read.
//! Steps 2-4 run under the session lock; step 6 is keyed by the token
//! captured there.

use std::sync::Arc;

use axum::body::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthErrorKind, BridgeError, BridgeResult, RequestErrorKind};
use crate::protocol::{
    parse_generation, parse_timestamp_millis, AuthenticatedRequest, Credential, RequestHead,
    TIMESTAMP_HEADER,
};

use super::clock::Clock;
use super::session::SessionStore;
use super::signature::{self, constant_time_eq};
use super::whitelist::{PathWhitelist, Route};

/// Outcome of the header checks, carried into the body checks.
#[derive(Debug, Clone)]
pub struct HeadVerdict {
    pub request_id: Uuid,
    pub route: Route,
    pub credential: Credential,
    pub session_generation: u64,
    pub timestamp_ms: Option<u64>,
    pub generation: Option<u64>,
}

/// Validates requests against the session and the whitelist.
pub struct RequestAuthenticator {
    session: Arc<SessionStore>,
    whitelist: Arc<PathWhitelist>,
    clock: Arc<dyn Clock>,
    freshness_window_ms: u64,
}

impl RequestAuthenticator {
    pub fn new(
        session: Arc<SessionStore>,
        whitelist: Arc<PathWhitelist>,
        clock: Arc<dyn Clock>,
        freshness_window_ms: u64,
    ) -> Self {
        Self {
            session,
            whitelist,
            clock,
            freshness_window_ms,
        }
    }

    pub fn whitelist(&self) -> &PathWhitelist {
        &self.whitelist
    }

    /// Step 1 only. Used for the public health route.
    pub fn route(&self, head: &RequestHead) -> BridgeResult<Route> {
        self.whitelist.resolve(&head.method, &head.path)
    }

    /// Steps 1-4: whitelist, token, timestamp and generation.
    ///
    /// Steps 2-4 run inside one session critical section, so the verdict's
    /// credential and generation belong to the same session state. The
    /// handshake skips the timestamp and generation checks.
    ///
    /// # Arguments
    ///
    /// * `request_id` - Id assigned to the request by the listener
    /// * `head` - Method, path and authentication headers
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is not whitelisted or the verb does not match its route
    /// - The token is missing or not current
    /// - The timestamp is missing, malformed or outside the freshness window
    /// - A generation header is malformed or differs from the session's
    pub fn check_head(&self, request_id: Uuid, head: &RequestHead) -> BridgeResult<HeadVerdict> {
        let route = self.route(head)?;
        let exempt = route.is_handshake();

        self.session.with_session(|session| {
            let presented = head.headers.token.as_deref().unwrap_or("");
            if presented.is_empty() || !constant_time_eq(presented, &session.token) {
                return Err(BridgeError::Auth {
                    kind: AuthErrorKind::Unauthorized,
                });
            }

            let (timestamp_ms, generation) = if exempt {
                (None, None)
            } else {
                let timestamp_ms = self.check_freshness(head)?;
                let generation = match head.headers.generation.as_deref() {
                    Some(raw) => {
                        let received = parse_generation(raw)?;
                        if received != session.generation {
                            return Err(BridgeError::Auth {
                                kind: AuthErrorKind::GenerationDrift {
                                    expected: session.generation,
                                    received,
                                },
                            });
                        }
                        Some(received)
                    }
                    None => None,
                };
                (Some(timestamp_ms), generation)
            };

            Ok(HeadVerdict {
                request_id,
                route,
                credential: Credential::new(session.token.clone()),
                session_generation: session.generation,
                timestamp_ms,
                generation,
            })
        })
    }

    fn check_freshness(&self, head: &RequestHead) -> BridgeResult<u64> {
        let raw = head
            .headers
            .timestamp
            .as_deref()
            .ok_or(BridgeError::Request {
                kind: RequestErrorKind::MissingHeader {
                    header: TIMESTAMP_HEADER,
                },
            })?;
        let timestamp_ms = parse_timestamp_millis(raw)?;

        let skew_ms = self.clock.now_millis().abs_diff(timestamp_ms);
        if skew_ms > self.freshness_window_ms {
            return Err(BridgeError::Auth {
                kind: AuthErrorKind::RequestExpired {
                    skew_ms,
                    window_ms: self.freshness_window_ms,
                },
            });
        }
        Ok(timestamp_ms)
    }

    /// Steps 5 and 6, on a body already read within the size limit.
    ///
    /// # Arguments
    ///
    /// * `head` - The head `verdict` was produced from
    /// * `verdict` - Result of [`check_head`](Self::check_head)
    /// * `body` - Raw request body
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The body is not UTF-8, or is non-empty and not JSON
    /// - The signature is missing or does not match (not for the handshake)
    pub fn check_body(
        &self,
        head: &RequestHead,
        verdict: HeadVerdict,
        body: Bytes,
    ) -> BridgeResult<AuthenticatedRequest> {
        let text = std::str::from_utf8(&body)
            .map_err(|e| BridgeError::invalid_body(format!("body is not UTF-8: {}", e)))?;

        if !body.is_empty() {
            serde_json::from_str::<serde::de::IgnoredAny>(text)
                .map_err(|e| BridgeError::invalid_body(format!("body is not JSON: {}", e)))?;
        }

        if !verdict.route.is_handshake() {
            let candidate = head.headers.signature.as_deref().unwrap_or("");
            // check_head guarantees the timestamp header is present here
            let timestamp = head.headers.timestamp.as_deref().unwrap_or("");
            let canonical =
                signature::canonical_string(timestamp, head.method.as_str(), &head.path, text);

            if candidate.is_empty()
                || !signature::verify(verdict.credential.expose(), &canonical, candidate)
            {
                return Err(BridgeError::Auth {
                    kind: AuthErrorKind::InvalidSignature,
                });
            }
        }

        debug!(
            request_id = %verdict.request_id,
            path = %head.path,
            generation = verdict.session_generation,
            "Request authenticated"
        );

        Ok(AuthenticatedRequest {
            request_id: verdict.request_id,
            method: head.method.clone(),
            path: head.path.clone(),
            body,
            timestamp_ms: verdict.timestamp_ms,
            generation: verdict.generation,
            session_generation: verdict.session_generation,
            credential: verdict.credential,
        })
    }

    /// The full pipeline on a fully buffered request.
    pub fn authenticate(
        &self,
        request_id: Uuid,
        head: &RequestHead,
        body: Bytes,
    ) -> BridgeResult<AuthenticatedRequest> {
        let verdict = self.check_head(request_id, head)?;
        self.check_body(head, verdict, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::protocol::AuthHeaders;
    use axum::http::Method;

    const BOOTSTRAP: &str = "VIBE_BRIDGE_BOOTSTRAP_SECRET";
    const NOW_MS: u64 = 1_700_000_010_000;

    struct Fixture {
        session: Arc<SessionStore>,
        clock: Arc<ManualClock>,
        authenticator: RequestAuthenticator,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(SessionStore::new(BOOTSTRAP));
        let clock = Arc::new(ManualClock::new(NOW_MS));
        let authenticator = RequestAuthenticator::new(
            Arc::clone(&session),
            Arc::new(PathWhitelist::with_defaults()),
            clock.clone(),
            5_000,
        );
        Fixture {
            session,
            clock,
            authenticator,
        }
    }

    fn signed(
        token: &str,
        path: &str,
        timestamp: &str,
        generation: Option<u64>,
        body: &str,
    ) -> (RequestHead, Bytes) {
        let canonical = signature::canonical_string(timestamp, "POST", path, body);
        let headers = AuthHeaders {
            token: Some(token.to_string()),
            timestamp: Some(timestamp.to_string()),
            generation: generation.map(|g| g.to_string()),
            signature: Some(signature::sign(token, &canonical)),
        };
        (
            RequestHead::new(Method::POST, path, headers),
            Bytes::from(body.to_string()),
        )
    }

    fn fresh() -> String {
        (NOW_MS / 1000).to_string()
    }

    fn error_code(result: BridgeResult<AuthenticatedRequest>) -> &'static str {
        match result {
            Ok(_) => "OK",
            Err(e) => e.code(),
        }
    }

    #[test]
    fn test_valid_request_with_bootstrap() {
        let f = fixture();
        let (head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), Some(0), r#"{"x":1}"#);
        let request = f.authenticator.authenticate(Uuid::new_v4(), &head, body).unwrap();

        assert_eq!(request.path, "/transform/set");
        assert_eq!(request.session_generation, 0);
        assert_eq!(request.generation, Some(0));
        assert_eq!(request.timestamp_ms, Some(1_700_000_010_000));
    }

    #[test]
    fn test_wrong_token_is_unauthorized() {
        let f = fixture();
        let (head, body) = signed("guess", "/transform/set", &fresh(), None, "{}");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let f = fixture();
        let (mut head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "{}");
        head.headers.token = None;
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_whitelist_checked_before_token() {
        let f = fixture();
        let (head, body) = signed("guess", "/admin/shutdown", &fresh(), None, "{}");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "FORBIDDEN"
        );
    }

    #[test]
    fn test_bootstrap_rejected_after_provisioning() {
        let f = fixture();
        f.session.rotate(Some("T1"));
        let (head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "{}");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_missing_and_malformed_timestamp() {
        let f = fixture();
        let (mut head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "{}");
        head.headers.timestamp = None;
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body.clone())),
            "BAD_REQUEST"
        );

        head.headers.timestamp = Some("yesterday".to_string());
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "BAD_REQUEST"
        );
    }

    #[test]
    fn test_freshness_window_boundaries() {
        let f = fixture();
        let cases = [
            ("1700000006", "OK"),            // 4.0 s stale
            ("1700000005.1", "OK"),          // 4.9 s stale
            ("1700000005", "OK"),            // exactly 5.0 s
            ("1700000004.9", "REQUEST_EXPIRED"), // 5.1 s stale
            ("1700000004", "REQUEST_EXPIRED"),   // 6.0 s stale
            ("1700000014.9", "OK"),          // 4.9 s ahead
            ("1700000015.1", "REQUEST_EXPIRED"), // 5.1 s ahead
        ];

        for (timestamp, expected) in cases {
            let (head, body) = signed(BOOTSTRAP, "/transform/set", timestamp, None, "{}");
            assert_eq!(
                error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
                expected,
                "timestamp {}",
                timestamp
            );
        }
    }

    #[test]
    fn test_replay_after_window_closes() {
        let f = fixture();
        let (head, body) = signed(BOOTSTRAP, "/object/lock", &fresh(), None, r#"{"id":"a"}"#);
        assert!(f
            .authenticator
            .authenticate(Uuid::new_v4(), &head, body.clone())
            .is_ok());

        f.clock.advance(std::time::Duration::from_millis(5_001));
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "REQUEST_EXPIRED"
        );
    }

    #[test]
    fn test_generation_drift() {
        let f = fixture();
        f.session.rotate(Some("T1"));

        let (head, body) = signed("T1", "/transform/set", &fresh(), Some(0), "{}");
        let result = f.authenticator.authenticate(Uuid::new_v4(), &head, body);
        match result {
            Err(BridgeError::Auth {
                kind: AuthErrorKind::GenerationDrift { expected, received },
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(received, 0);
            }
            other => panic!("expected generation drift, got {:?}", other),
        }

        let (head, body) = signed("T1", "/transform/set", &fresh(), Some(1), "{}");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "OK"
        );
    }

    #[test]
    fn test_absent_generation_tolerated() {
        let f = fixture();
        f.session.rotate(Some("T1"));
        let (head, body) = signed("T1", "/transform/set", &fresh(), None, "{}");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "OK"
        );
    }

    #[test]
    fn test_malformed_generation_is_bad_request() {
        let f = fixture();
        let (mut head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "{}");
        head.headers.generation = Some("zero".to_string());
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "BAD_REQUEST"
        );
    }

    #[test]
    fn test_tampered_body_fails_signature() {
        let f = fixture();
        let (head, _) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, r#"{"x":1}"#);
        let tampered = Bytes::from_static(br#"{"x":2}"#);
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, tampered)),
            "INVALID_SIGNATURE"
        );
    }

    #[test]
    fn test_missing_signature() {
        let f = fixture();
        let (mut head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "{}");
        head.headers.signature = None;
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "INVALID_SIGNATURE"
        );
    }

    #[test]
    fn test_body_must_be_json() {
        let f = fixture();
        let (head, body) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "not json");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "BAD_REQUEST"
        );

        let (head, _) = signed(BOOTSTRAP, "/transform/set", &fresh(), None, "");
        let invalid_utf8 = Bytes::from_static(&[0xff, 0xfe]);
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, invalid_utf8)),
            "BAD_REQUEST"
        );
    }

    #[test]
    fn test_empty_body_is_signed_as_empty() {
        let f = fixture();
        let (head, body) = signed(BOOTSTRAP, "/panic", &fresh(), None, "");
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, body)),
            "OK"
        );
    }

    #[test]
    fn test_handshake_skips_timestamp_generation_and_signature() {
        let f = fixture();
        f.session.rotate(None);
        let headers = AuthHeaders {
            token: Some(BOOTSTRAP.to_string()),
            timestamp: Some("1".to_string()),
            generation: Some("99".to_string()),
            signature: Some("bogus".to_string()),
        };
        let head = RequestHead::new(Method::POST, "/handshake", headers);
        let request = f
            .authenticator
            .authenticate(Uuid::new_v4(), &head, Bytes::from_static(b"{}"))
            .unwrap();
        assert!(request.timestamp_ms.is_none());
        assert_eq!(request.session_generation, 1);
        assert_eq!(request.credential.expose(), BOOTSTRAP);
    }

    #[test]
    fn test_handshake_still_requires_token() {
        let f = fixture();
        let headers = AuthHeaders {
            token: Some("guess".to_string()),
            ..Default::default()
        };
        let head = RequestHead::new(Method::POST, "/handshake", headers);
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, Bytes::new())),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_check_order_token_before_timestamp() {
        let f = fixture();
        let headers = AuthHeaders {
            token: Some("guess".to_string()),
            ..Default::default()
        };
        let head = RequestHead::new(Method::POST, "/transform/set", headers);
        assert_eq!(
            error_code(f.authenticator.authenticate(Uuid::new_v4(), &head, Bytes::new())),
            "UNAUTHORIZED"
        );
    }
}
