//! Authentication headers and their parsing rules.

use axum::http::HeaderMap;

use crate::error::{BridgeError, RequestErrorKind};

pub const TOKEN_HEADER: &str = "x-vibe-token";
pub const TIMESTAMP_HEADER: &str = "x-vibe-timestamp";
pub const GENERATION_HEADER: &str = "x-vibe-generation";
pub const SIGNATURE_HEADER: &str = "x-vibe-signature";

/// Digits allowed after the decimal point of a timestamp.
const MAX_FRACTION_DIGITS: usize = 9;

/// The `X-Vibe-*` headers of one request, as sent.
#[derive(Clone, Default)]
pub struct AuthHeaders {
    pub token: Option<String>,
    pub timestamp: Option<String>,
    pub generation: Option<String>,
    pub signature: Option<String>,
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timestamp", &self.timestamp)
            .field("generation", &self.generation)
            .field("signature", &self.signature.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AuthHeaders {
    /// Extract the bridge headers from an HTTP header map.
    ///
    /// Values that are not valid UTF-8 are kept lossily so they fail the
    /// format checks instead of looking absent.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        };

        Self {
            token: get(TOKEN_HEADER),
            timestamp: get(TIMESTAMP_HEADER),
            generation: get(GENERATION_HEADER),
            signature: get(SIGNATURE_HEADER),
        }
    }
}

fn invalid_header(header: &'static str, message: impl Into<String>) -> BridgeError {
    BridgeError::Request {
        kind: RequestErrorKind::InvalidHeader {
            header,
            message: message.into(),
        },
    }
}

/// Parse an `X-Vibe-Timestamp` value into Unix milliseconds.
///
/// Accepts whole seconds (`1700000000`) or seconds with a decimal fraction
/// (`1700000000.25`). Digits beyond the millisecond are truncated.
pub fn parse_timestamp_millis(raw: &str) -> Result<u64, BridgeError> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (raw, None),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_header(TIMESTAMP_HEADER, "expected decimal seconds"));
    }

    let mut millis = 0u64;
    if let Some(fraction) = fraction {
        if fraction.is_empty()
            || fraction.len() > MAX_FRACTION_DIGITS
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid_header(TIMESTAMP_HEADER, "malformed fractional part"));
        }
        for (i, digit) in fraction.bytes().take(3).enumerate() {
            millis += u64::from(digit - b'0') * 10u64.pow(2 - i as u32);
        }
    }

    whole
        .parse::<u64>()
        .ok()
        .and_then(|seconds| seconds.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(|| invalid_header(TIMESTAMP_HEADER, "timestamp out of range"))
}

/// Parse an `X-Vibe-Generation` value.
pub fn parse_generation(raw: &str) -> Result<u64, BridgeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_header(GENERATION_HEADER, "expected an unsigned integer"));
    }
    raw.parse::<u64>()
        .map_err(|e| invalid_header(GENERATION_HEADER, e.to_string()))
}
