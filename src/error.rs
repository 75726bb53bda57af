/*
 * Responsibility
 * - Classified error shared by the provider and the middleware
 * - IntoResponse impl (HTTP status / JSON error body)
 * - No raw jsonwebtoken error ever crosses a public boundary
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub const ORIGIN_SIGN: &str = "sign";
pub const ORIGIN_VERIFY: &str = "verify";
pub const ORIGIN_DECODE: &str = "decode";
pub const ORIGIN_AUTH: &str = "auth";

/// Uniform failure value for every token operation.
///
/// - 401: temporal problems (expired / not yet valid / no token
///   presented). The caller can recover by obtaining a fresh token.
/// - 500: configuration problems (no secret) and structural or
///   cryptographic problems (bad signature, malformed token, algorithm
///   mismatch). Retrying with the same token will not help.
///
/// `origin` names the operation that failed ("sign", "verify", "decode",
/// "auth") so logs can tell failure sites apart without parsing
/// message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{origin}: {message}")]
pub struct AuthError {
    pub message: String,
    pub status: StatusCode,
    pub origin: &'static str,
}

impl AuthError {
    pub fn new(message: impl Into<String>, status: StatusCode, origin: &'static str) -> Self {
        Self {
            message: message.into(),
            status,
            origin,
        }
    }

    pub fn unauthorized(message: impl Into<String>, origin: &'static str) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED, origin)
    }

    pub fn internal(message: impl Into<String>, origin: &'static str) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR, origin)
    }

    /// Fixed message on purpose; there is no underlying cause to preserve.
    pub fn missing_secret(origin: &'static str) -> Self {
        Self::internal("secret or key is not configured", origin)
    }

    pub fn is_temporal(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    origin: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponseBody {
            error: ErrorBody {
                origin: self.origin,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pick_the_right_status() {
        let e = AuthError::unauthorized("nope", ORIGIN_AUTH);
        assert_eq!(e.status, StatusCode::UNAUTHORIZED);
        assert!(e.is_temporal());

        let e = AuthError::missing_secret(ORIGIN_SIGN);
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.origin, ORIGIN_SIGN);
        assert!(!e.is_temporal());
    }

    #[test]
    fn into_response_keeps_the_status() {
        let resp =
            AuthError::unauthorized("Authorization token missing", ORIGIN_AUTH).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
