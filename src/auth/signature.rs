//! HMAC-SHA256 request signing and verification.
//!
//! A request is signed over its canonical string:
//!
//! ```text
//! {timestamp}|{method}|{path}|{body}
//! ```
//!
//! keyed by the session token. The digest travels as lower-case hex in the
//! `X-Vibe-Signature` header.

use ring::hmac;
use subtle::ConstantTimeEq;

/// Field separator of the canonical string.
pub const CANONICAL_SEPARATOR: char = '|';

/// Build the canonical string a request signature covers.
pub fn canonical_string(timestamp: &str, method: &str, path: &str, body: &str) -> String {
    let mut canonical =
        String::with_capacity(timestamp.len() + method.len() + path.len() + body.len() + 3);
    canonical.push_str(timestamp);
    canonical.push(CANONICAL_SEPARATOR);
    canonical.push_str(method);
    canonical.push(CANONICAL_SEPARATOR);
    canonical.push_str(path);
    canonical.push(CANONICAL_SEPARATOR);
    canonical.push_str(body);
    canonical
}

/// Sign `canonical` with `key`, returning the lower-case hex digest.
pub fn sign(key: &str, canonical: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    let tag = hmac::sign(&key, canonical.as_bytes());
    hex::encode(tag.as_ref())
}

/// Check `candidate` against the signature of `canonical` under `key`.
///
/// The comparison runs in constant time. A candidate that is not valid hex
/// fails verification.
pub fn verify(key: &str, canonical: &str, candidate: &str) -> bool {
    let Ok(candidate) = hex::decode(candidate.trim()) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    hmac::verify(&key, canonical.as_bytes(), &candidate).is_ok()
}

/// Constant-time string equality.
///
/// Both inputs are padded to the same length with different fill bytes, so
/// the running time does not depend on where the first difference is.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string_layout() {
        let canonical = canonical_string("1700000000", "POST", "/transform/set", r#"{"x":1}"#);
        assert_eq!(canonical, r#"1700000000|POST|/transform/set|{"x":1}"#);

        let empty = canonical_string("1700000000.5", "GET", "/metrics", "");
        assert_eq!(empty, "1700000000.5|GET|/metrics|");
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let digest = sign("Jefe", "what do ya want for nothing?");
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_then_verify() {
        let canonical = canonical_string("1700000000", "POST", "/object/lock", "{}");
        let digest = sign("T1", &canonical);

        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(verify("T1", &canonical, &digest));
    }

    #[test]
    fn test_wrong_key_fails() {
        let canonical = canonical_string("1700000000", "POST", "/object/lock", "{}");
        let digest = sign("T1", &canonical);
        assert!(!verify("T2", &canonical, &digest));
    }

    #[test]
    fn test_tampered_body_fails() {
        let original = canonical_string("1700000000", "POST", "/transform/set", r#"{"x":1}"#);
        let tampered = canonical_string("1700000000", "POST", "/transform/set", r#"{"x":2}"#);
        let digest = sign("T1", &original);
        assert!(!verify("T1", &tampered, &digest));
    }

    #[test]
    fn test_non_hex_candidate_fails() {
        let canonical = canonical_string("1", "POST", "/panic", "");
        assert!(!verify("T1", &canonical, "not-hex-at-all"));
        assert!(!verify("T1", &canonical, ""));
        assert!(!verify("T1", &canonical, "abc"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "Secret"));
        assert!(!constant_time_eq("secret", "secre"));
        assert!(!constant_time_eq("", "x"));
        assert!(constant_time_eq("", ""));
    }
}
