use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{AuthError, ORIGIN_AUTH};
use crate::payload::Payload;

/// Handler-side access to the verified token payload.
/// The bearer middleware must have inserted it into request extensions;
/// absence means the route is not behind authentication (or the
/// middleware was not applied) and rejects with 401.
pub struct AuthPayload(pub Payload);

impl<S> FromRequestParts<S> for AuthPayload
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Payload>()
            .cloned()
            .map(AuthPayload)
            .ok_or_else(|| AuthError::unauthorized("authentication context missing", ORIGIN_AUTH))
    }
}
