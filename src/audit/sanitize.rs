//! Body sanitization for audit logging.
//!
//! Redacts credentials and shortens bulky payload fields before a request
//! body is written to the audit log.

use serde_json::{Map, Value};

/// Keys whose values are redacted (substring match, case-insensitive).
const SENSITIVE_KEYS: &[&str] = &[
    "token",
    "secret",
    "signature",
    "password",
    "credential",
    "api_key",
    "auth",
];

/// Maximum length for string values before truncation.
const MAX_STRING_LENGTH: usize = 1024;

/// Maximum number of array elements kept under a bulky key.
const MAX_ARRAY_ITEMS: usize = 64;

/// Keys whose values are truncated when large.
const TRUNCATABLE_KEYS: &[&str] = &["vertices", "triangles", "mesh", "data", "payload", "script"];

/// Sanitize a raw request body for the audit log.
///
/// Returns `None` for an empty body. A body that is not JSON is recorded by
/// size only.
pub fn sanitize_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Some(sanitize_params(&value)),
        Err(_) => Some(Value::String(format!("[UNPARSED - {} bytes]", body.len()))),
    }
}

/// Sanitize parsed parameters.
///
/// Redacts sensitive keys, truncates large strings and arrays under bulky
/// keys, and recurses into nested objects and arrays.
pub fn sanitize_params(params: &Value) -> Value {
    sanitize_value(params, false)
}

fn sanitize_value(value: &Value, is_truncatable: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                let is_sensitive = SENSITIVE_KEYS.iter().any(|&s| key_lower.contains(s));
                let should_truncate = TRUNCATABLE_KEYS.iter().any(|&s| key_lower.contains(s));

                if is_sensitive {
                    sanitized.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize_value(val, should_truncate));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) if is_truncatable && arr.len() > MAX_ARRAY_ITEMS => {
            Value::String(format!("[TRUNCATED - {} items]", arr.len()))
        }
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| sanitize_value(v, is_truncatable))
                .collect(),
        ),
        Value::String(s) if is_truncatable && s.len() > MAX_STRING_LENGTH => {
            Value::String(format!("[TRUNCATED - {} bytes]", s.len()))
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_token_redacted() {
        let sanitized = sanitize_params(&json!({
            "new_token": "T1",
            "challenge": "abc",
            "version": "1.0"
        }));
        assert_eq!(sanitized["new_token"], "[REDACTED]");
        assert_eq!(sanitized["challenge"], "abc");
        assert_eq!(sanitized["version"], "1.0");
    }

    #[test]
    fn test_nested_and_case_insensitive() {
        let sanitized = sanitize_params(&json!({
            "object": {
                "id": "cube",
                "Auth_Header": "Bearer xyz",
                "meta": [{"SECRET": "s"}]
            }
        }));
        assert_eq!(sanitized["object"]["id"], "cube");
        assert_eq!(sanitized["object"]["Auth_Header"], "[REDACTED]");
        assert_eq!(sanitized["object"]["meta"][0]["SECRET"], "[REDACTED]");
    }

    #[test]
    fn test_large_mesh_arrays_truncated() {
        let vertices: Vec<f64> = (0..300).map(f64::from).collect();
        let sanitized = sanitize_params(&json!({
            "id": "cube",
            "vertices": vertices,
            "pos": [1, 2, 3]
        }));
        assert_eq!(sanitized["vertices"], "[TRUNCATED - 300 items]");
        assert_eq!(sanitized["pos"], json!([1, 2, 3]));
    }

    #[test]
    fn test_large_strings_truncated() {
        let script = "x".repeat(2000);
        let sanitized = sanitize_params(&json!({"script": script, "name": "short"}));
        assert_eq!(sanitized["script"], "[TRUNCATED - 2000 bytes]");
        assert_eq!(sanitized["name"], "short");
    }

    #[test]
    fn test_small_values_preserved() {
        let params = json!({"id": "cube", "mesh": {"vertices": [0, 1, 2]}});
        assert_eq!(sanitize_params(&params), params);
    }

    #[test]
    fn test_sanitize_body() {
        assert!(sanitize_body(b"").is_none());
        assert_eq!(
            sanitize_body(br#"{"new_token":"T2"}"#).unwrap()["new_token"],
            "[REDACTED]"
        );
        assert_eq!(
            sanitize_body(b"not json").unwrap(),
            json!("[UNPARSED - 8 bytes]")
        );
    }
}
