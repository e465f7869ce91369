// src/api/auth.rs — Bearer token guard for the review endpoints

use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use crate::api::{types::ErrorResponse, ApiState};

/// Reject the request unless it carries the configured review token.
/// Open when no token is configured.
pub fn check_auth(
    state: &ApiState,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if token_matches(state.token.as_deref(), headers) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "review token required".into(),
            }),
        ))
    }
}

fn token_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    bearer_token(headers).is_some_and(|given| constant_time_eq(given.as_bytes(), expected.as_bytes()))
}

/// Token from `Authorization: Bearer <token>`. The scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
