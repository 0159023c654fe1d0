//! Axum route handlers.

use axum::http::HeaderMap;

pub mod auth;
pub mod images;

/// Header that scopes "last uploaded image" state to one client
pub const SESSION_HEADER: &str = "x-session-id";

/// The caller's session key, if it sent a non-empty one
pub fn session_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
