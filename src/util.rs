//! Shared helpers for the activation server.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`,
/// and extracts the `user-agent` header for the activation log.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if the
/// header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Hash a secret for storage and comparison (admin tokens). SHA-256 with an
/// application salt, lowercase hex.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"cspline-activation-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_request_info_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        headers.insert("user-agent", HeaderValue::from_static("installer/2.1"));

        let (ip, ua) = extract_request_info(&headers);
        assert_eq!(ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(ua.as_deref(), Some("installer/2.1"));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_hash_secret_is_stable() {
        assert_eq!(hash_secret("token"), hash_secret("token"));
        assert_ne!(hash_secret("token"), hash_secret("other"));
    }
}
