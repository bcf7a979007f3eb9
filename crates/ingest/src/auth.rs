//! Request authentication
//!
//! Two modes: open (dev) and a shared API key accepted from either the
//! `X-API-Key` header or an `Authorization: Bearer` token. Comparison is
//! constant time.

use axum::http::HeaderMap;

use sb_config::{AuthConfig, AuthMode};

use crate::error::ApiError;

/// Authorize one request.
pub fn authorize(headers: &HeaderMap, auth: &AuthConfig) -> Result<(), ApiError> {
    if auth.mode == AuthMode::Open {
        return Ok(());
    }

    let Some(provided) = extract_api_key(headers) else {
        return Err(ApiError::Unauthorized);
    };

    if constant_time_eq(provided.as_bytes(), auth.api_key.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Pull the credential out of the request headers.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Length-safe constant-time byte comparison.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
pub(crate) use constant_time_eq as constant_time_eq_for_tests;
