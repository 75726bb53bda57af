/*
 * Responsibility
 * - Config読み込み → TokenProvider 生成 → Router 組み立て
 * - Middleware の適用 (bearer auth)
 * - axum::serve() で起動
 */
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AuthError;
use crate::extractors::AuthPayload;
use crate::middleware::bearer;
use crate::payload::Payload;
use crate::provider::{Secret, SignOptions, TokenProvider, VerifyOptions};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,tokengate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run() -> Result<(), AuthError> {
    init_tracing();
    let config = Config::from_env()?;

    tracing::info!(
        "starting demo API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| AuthError::internal(e.to_string(), "serve"))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AuthError::internal(e.to_string(), "serve"))?;

    Ok(())
}

/// All provider configuration happens here, before the provider is
/// shared behind an Arc and traffic starts.
fn build_state(config: &Config) -> AppState {
    let mut provider = TokenProvider::new();
    provider.set_secret(Secret::Text(config.secret.clone()));
    provider.set_default_sign_options(SignOptions {
        expires_in: Some(config.token_ttl_seconds),
        issuer: config.issuer.clone(),
        audience: config.audience.clone(),
        ..SignOptions::default()
    });
    provider.set_default_verify_options(VerifyOptions {
        issuer: config.issuer.clone(),
        audience: config.audience.clone(),
        leeway: Some(config.leeway_seconds),
        ..VerifyOptions::default()
    });

    AppState::new(Arc::new(provider), config.token_ttl_seconds)
}

#[derive(Deserialize)]
struct TokenRequest {
    subject: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
}

async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let mut claims = Map::new();
    claims.insert("sub".to_string(), Value::String(req.subject));
    claims.insert("jti".to_string(), Value::String(Uuid::new_v4().to_string()));

    let access_token = state
        .auth
        .sign_async(&Payload::Claims(claims), None)
        .await?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.token_ttl_seconds,
    }))
}

async fn me(AuthPayload(payload): AuthPayload) -> Json<Payload> {
    Json(payload)
}

async fn health() -> &'static str {
    "ok"
}

fn build_router(state: AppState) -> Router {
    let protected = bearer::apply(Router::new().route("/me", get(me)), state.clone());

    Router::new()
        .route("/health", get(health))
        .route("/token", post(issue_token))
        .nest("/api/v1", protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
