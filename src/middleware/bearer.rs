//! Bearer token verification → verified payload into request extensions.
//!
//! The middleware never panics or throws past its boundary: every
//! rejection travels as an `AuthError` response through the pipeline's
//! error path, so an outer error-formatting layer sees one uniform
//! shape.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};
use tracing::warn;

use crate::error::{AuthError, ORIGIN_AUTH};
use crate::provider::VerifyOptions;
use crate::state::AppState;

/// Pull the bearer token out of the Authorization header.
///
/// The header must consist of exactly two space-separated parts with a
/// literal `Bearer` scheme; anything else (missing header, wrong or
/// wrongly-cased scheme, one part, three parts) yields `None`. No
/// trimming or normalization happens here.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Put the default auth middleware in front of `router`.
///
/// Verification runs with the provider's default options only.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, require_auth))
}

/// Customizable form: identical behavior, but verification runs with
/// `options` merged over the provider defaults (call-site fields win).
pub fn apply_with_options(
    router: Router<AppState>,
    state: AppState,
    options: VerifyOptions,
) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(
        (state, options),
        require_auth_with_options,
    ))
}

async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate(&state, None, req, next).await
}

async fn require_auth_with_options(
    State((state, options)): State<(AppState, VerifyOptions)>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate(&state, Some(&options), req, next).await
}

async fn authenticate(
    state: &AppState,
    options: Option<&VerifyOptions>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(token) = extract_token(req.headers()) else {
        warn!("request without a usable Authorization header");
        return Err(AuthError::unauthorized(
            "Authorization token missing",
            ORIGIN_AUTH,
        ));
    };

    let payload = match state.auth.verify(token, options) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "access token verification failed");
            return Err(err);
        }
    };

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(payload);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::AuthPayload;
    use crate::payload::Payload;
    use crate::provider::{Secret, SignOptions, TokenProvider};
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn header_map(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn extract_token_accepts_only_a_two_part_bearer_header() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
        assert_eq!(extract_token(&header_map("Token abc")), None);
        assert_eq!(extract_token(&header_map("Bearer")), None);
        assert_eq!(extract_token(&header_map("Bearer a b")), None);
        assert_eq!(extract_token(&header_map("bearer abc")), None);
        assert_eq!(extract_token(&header_map("Bearer abc")), Some("abc"));
    }

    fn test_state() -> AppState {
        let mut provider = TokenProvider::new();
        provider.set_secret(Secret::Text("middleware-test-secret-0123456789".to_string()));
        AppState::new(Arc::new(provider), 600)
    }

    async fn whoami(AuthPayload(payload): AuthPayload) -> String {
        payload.subject().unwrap_or("anonymous").to_string()
    }

    fn protected_router(state: AppState) -> Router {
        apply(Router::new().route("/whoami", get(whoami)), state.clone()).with_state(state)
    }

    fn sign(state: &AppState, opts: Option<&SignOptions>) -> String {
        let payload = Payload::from_value(json!({"sub": "user-1"})).unwrap();
        state.auth.sign(&payload, opts).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(path: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn valid_token_reaches_the_handler_with_its_payload() {
        let state = test_state();
        let token = sign(&state, None);
        let response = protected_router(state)
            .oneshot(request("/whoami", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "user-1");
    }

    #[tokio::test]
    async fn missing_header_short_circuits_with_the_fixed_message() {
        let response = protected_router(test_state())
            .oneshot(request("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_string(response).await;
        assert!(body.contains("Authorization token missing"));
    }

    #[tokio::test]
    async fn malformed_scheme_counts_as_missing() {
        let state = test_state();
        let token = sign(&state, None);
        let response = protected_router(state)
            .oneshot(request("/whoami", Some(&format!("Token {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Authorization token missing"));
    }

    #[tokio::test]
    async fn expired_token_is_forwarded_as_401() {
        let state = test_state();
        let opts = SignOptions {
            expires_in: Some(-100),
            ..SignOptions::default()
        };
        let token = sign(&state, Some(&opts));
        let response = protected_router(state)
            .oneshot(request("/whoami", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("expired"));
    }

    #[tokio::test]
    async fn customizable_options_restrict_the_algorithm() {
        use jsonwebtoken::Algorithm;

        let state = test_state();
        let opts = SignOptions {
            algorithm: Some(Algorithm::HS384),
            ..SignOptions::default()
        };
        let token = sign(&state, Some(&opts));

        let restricted = VerifyOptions {
            algorithms: Some(vec![Algorithm::HS256]),
            ..VerifyOptions::default()
        };
        let router = apply_with_options(
            Router::new().route("/whoami", get(whoami)),
            state.clone(),
            restricted,
        )
        .with_state(state);

        let response = router
            .oneshot(request("/whoami", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        // algorithm mismatch is structural, not temporal
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn extractor_rejects_routes_without_the_middleware() {
        let state = test_state();
        let router = Router::new()
            .route("/whoami", get(whoami))
            .with_state(state);

        let response = router.oneshot(request("/whoami", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
