//! Authentication tests

use axum::http::{HeaderMap, HeaderValue};

use sb_config::{AuthConfig, AuthMode};

use crate::auth::{authorize, constant_time_eq_for_tests as constant_time_eq};
use crate::error::ApiError;

fn api_key_auth() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::ApiKey,
        api_key: "s3cret-key".to_string(),
    }
}

fn open_auth() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::Open,
        api_key: String::new(),
    }
}

#[test]
fn test_open_mode_allows_everything() {
    assert!(authorize(&HeaderMap::new(), &open_auth()).is_ok());
}

#[test]
fn test_missing_key_is_unauthorized() {
    let err = authorize(&HeaderMap::new(), &api_key_auth()).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
fn test_wrong_key_is_forbidden() {
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_static("wrong"));
    let err = authorize(&headers, &api_key_auth()).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));
}

#[test]
fn test_header_key_accepted() {
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_static("s3cret-key"));
    assert!(authorize(&headers, &api_key_auth()).is_ok());
}

#[test]
fn test_bearer_token_accepted() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_static("Bearer s3cret-key"),
    );
    assert!(authorize(&headers, &api_key_auth()).is_ok());
}

#[test]
fn test_empty_header_is_missing() {
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_static("  "));
    let err = authorize(&headers, &api_key_auth()).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq(b"abc", b"abc"));
    assert!(!constant_time_eq(b"abc", b"abd"));
    assert!(!constant_time_eq(b"abc", b"abcd"));
    assert!(constant_time_eq(b"", b""));
}
